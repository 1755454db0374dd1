//! Wire protocol: inbound client requests and outbound server events.
//!
//! Requests arrive as JSON objects tagged with an `action` field; events
//! leave tagged with an `event` field. SDP and ICE payloads are carried as
//! opaque JSON values and relayed untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An inbound protocol action from a connected client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ClientRequest {
    /// Chat message to the sender's current room.
    Message { text: String },
    /// Toggle a media resource flag (`screen`, `video`, `audio`).
    Toggle { resource: String },
    /// Create a room; the sender becomes owner and first member.
    Create {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        password: Option<String>,
    },
    /// Join an existing room.
    Join {
        room_id: String,
        #[serde(default)]
        password: String,
    },
    /// Leave the current room.
    Leave,
    /// Remove a member from the sender's room (owner only).
    Kick { user_id: String },
    /// Ban a client from the sender's room (owner only).
    Ban { user_id: String },
    /// Lift a ban (owner only).
    Unban { user_id: String },
    /// Relay an SDP offer over a call.
    Offer { call_id: String, sdp: Value },
    /// Relay an SDP answer over a call.
    Answer { call_id: String, sdp: Value },
    /// Relay an ICE candidate over a call.
    Candidate { call_id: String, ice: Value },
}

/// An outbound event delivered to one client or broadcast to a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum OutboundEvent {
    /// Room created; sent to the creator.
    Created { room_id: String },
    /// Join succeeded; sent to the joiner.
    Joined { room_id: String },
    /// Leave completed; sent to the leaver.
    Left { room_id: String },
    /// Sent to a client that was kicked out of a room.
    Kicked { room_id: String },
    /// Sent to a client that was banned from a room.
    Banned { room_id: String },

    /// Broadcast: a client joined the room.
    RJoined { user_id: String },
    /// Broadcast: a client left the room.
    RLeft { user_id: String },
    /// Broadcast: a client was kicked.
    RKicked { user_id: String },
    /// Broadcast: a client was banned.
    RBanned { user_id: String },
    /// Broadcast: a ban was lifted.
    RUnbanned { user_id: String },
    /// Broadcast: room ownership transferred.
    ROwner { user_id: String },
    /// Broadcast: chat message.
    RMessage { user_id: String, text: String },
    /// Broadcast: a member toggled a media resource.
    RResource {
        user_id: String,
        resource: String,
        status: bool,
    },

    /// Join rejected: already a member.
    #[serde(rename = "join_alreadyin")]
    JoinAlreadyIn,
    /// Join rejected: wrong password.
    #[serde(rename = "join_wrongpass")]
    JoinWrongPass,
    /// Join rejected: room at capacity.
    JoinFull,
    /// Join rejected: sender is banned.
    JoinBanned,
    /// Kick rejected: sender is not the owner.
    #[serde(rename = "kick_noprivileges")]
    KickNoPrivileges,
    /// Kick rejected: target is not a member.
    #[serde(rename = "kick_notin")]
    KickNotIn,
    /// Ban rejected: sender is not the owner.
    #[serde(rename = "ban_noprivileges")]
    BanNoPrivileges,
    /// Ban rejected: target is already banned.
    BanAlready,
    /// Unban rejected: sender is not the owner.
    #[serde(rename = "unban_noprivileges")]
    UnbanNoPrivileges,
    /// Unban rejected: target is not banned.
    #[serde(rename = "unban_notbanned")]
    UnbanNotBanned,

    /// A call channel now exists; sent to the established member, which is
    /// expected to respond with an offer.
    Call { call_id: String },
    /// SDP offer relayed to the call's answerer.
    Offer { call_id: String, sdp: Value },
    /// SDP answer relayed to the call's offerer.
    Answer { call_id: String, sdp: Value },
    /// ICE candidate relayed to the other participant.
    Candidate {
        call_id: String,
        user_id: String,
        ice: Value,
    },
    /// Call torn down; sent to both participants exactly once.
    Hangup { call_id: String },
}
