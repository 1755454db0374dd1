//! A signaling channel between exactly two clients of one room.
//!
//! Calls are created by the owning room when a client joins (one per
//! existing member, pairing it with the newcomer) and torn down the moment
//! either participant leaves the room for any reason. The participant
//! ordering is fixed at creation: the established member is the offerer,
//! the newcomer the answerer, which is what makes the SDP offer flow from
//! the established side. Candidates are symmetric.

use crate::core::client::ClientRef;
use crate::wire::OutboundEvent;

/// One signaling channel between two fixed participants.
#[derive(Debug)]
pub struct Call {
    id: String,
    offerer: ClientRef,
    answerer: ClientRef,
}

impl Call {
    /// Create a call. `offerer` is the pre-existing room member, `answerer`
    /// the client that just joined; the id is the deterministic composite
    /// of room and participant ids in that order.
    #[must_use]
    pub fn new(room_id: &str, offerer: ClientRef, answerer: ClientRef) -> Self {
        let id = format!("{room_id}{}{}", offerer.id(), answerer.id());
        Self {
            id,
            offerer,
            answerer,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the given client is one of the two participants.
    #[must_use]
    pub fn contains(&self, client_id: &str) -> bool {
        self.offerer.id() == client_id || self.answerer.id() == client_id
    }

    /// Tell the offerer the channel exists so it can start the exchange.
    pub fn announce(&self) {
        self.offerer.send(OutboundEvent::Call {
            call_id: self.id.clone(),
        });
    }

    /// Relay an SDP offer to the answerer. Only the offerer may send one;
    /// anything else is rejected without side effects.
    pub fn offer(&self, sender_id: &str, sdp: serde_json::Value) -> bool {
        if self.offerer.id() != sender_id {
            return false;
        }
        self.answerer.send(OutboundEvent::Offer {
            call_id: self.id.clone(),
            sdp,
        });
        true
    }

    /// Relay an SDP answer to the offerer. Only the answerer may send one.
    pub fn answer(&self, sender_id: &str, sdp: serde_json::Value) -> bool {
        if self.answerer.id() != sender_id {
            return false;
        }
        self.offerer.send(OutboundEvent::Answer {
            call_id: self.id.clone(),
            sdp,
        });
        true
    }

    /// Relay an ICE candidate to the other participant. Either side may
    /// send; the event carries the sender's id.
    pub fn candidate(&self, sender_id: &str, ice: serde_json::Value) -> bool {
        let recipient = if self.offerer.id() == sender_id {
            &self.answerer
        } else if self.answerer.id() == sender_id {
            &self.offerer
        } else {
            return false;
        };
        recipient.send(OutboundEvent::Candidate {
            call_id: self.id.clone(),
            user_id: sender_id.to_owned(),
            ice,
        });
        true
    }

    /// Notify both participants that the call is over. Consumes the call:
    /// a hung-up call is never reused.
    pub fn hangup(self) {
        let event = OutboundEvent::Hangup {
            call_id: self.id.clone(),
        };
        self.offerer.send(event.clone());
        self.answerer.send(event);
    }
}
