//! `SignalingActor` - singleton owner of all client and room state.
//!
//! The actor is the only task that touches the registries, so every
//! request is applied atomically with respect to every other: state is
//! mutated first, then notification events are queued on the affected
//! clients' outbound channels. Outbound delivery is fire-and-forget; a
//! closed channel is logged and otherwise ignored, and the eventual
//! `Disconnect` cleans the client up.
//!
//! # Graceful Shutdown
//!
//! Cancelling the root `CancellationToken` stops the message loop.
//! Connected sockets are torn down by the transport layer observing the
//! same token.

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::messages::{ControllerStatus, DisconnectReason, SignalingMessage};
use crate::core::client::{Client, ClientId, Resource};
use crate::core::password::PasswordHasher;
use crate::core::registry::Registry;
use crate::core::room::{LeaveOutcome, Room};
use crate::errors::{ActorError, RoomError};
use crate::observability::{
    record_disconnect, record_join_rejected, record_signal_relayed, set_clients_connected,
    set_rooms_active,
};
use crate::wire::{ClientRequest, OutboundEvent};

/// Channel buffer size for the signaling mailbox.
const SIGNALING_CHANNEL_BUFFER: usize = 1000;

/// Tunables for room creation and admission.
#[derive(Debug, Clone, Copy)]
pub struct SignalingSettings {
    /// Random bytes per generated room id (hex-encoded to twice as many
    /// characters).
    pub room_id_bytes: usize,
    /// Member capacity per room.
    pub max_clients: usize,
}

/// Handle to the `SignalingActor`.
///
/// Cloneable; the transport layer holds one per connection task.
#[derive(Clone)]
pub struct SignalingActorHandle {
    sender: mpsc::Sender<SignalingMessage>,
    cancel_token: CancellationToken,
}

impl SignalingActorHandle {
    /// Spawn the actor task and return a handle to it.
    #[must_use]
    pub fn new(settings: SignalingSettings, hasher: PasswordHasher) -> Self {
        let (sender, receiver) = mpsc::channel(SIGNALING_CHANNEL_BUFFER);
        let cancel_token = CancellationToken::new();

        let actor = SignalingActor::new(receiver, cancel_token.clone(), settings, hasher);
        tokio::spawn(actor.run());

        Self {
            sender,
            cancel_token,
        }
    }

    /// Register a newly connected client and hand its outbound channel to
    /// the actor.
    pub async fn connect(
        &self,
        client_id: ClientId,
        outbound: mpsc::UnboundedSender<OutboundEvent>,
    ) -> Result<(), ActorError> {
        self.sender
            .send(SignalingMessage::Connect {
                client_id,
                outbound,
            })
            .await
            .map_err(|e| ActorError::MailboxSend(e.to_string()))
    }

    /// Report a closed transport session.
    pub async fn disconnect(
        &self,
        client_id: ClientId,
        reason: DisconnectReason,
    ) -> Result<(), ActorError> {
        self.sender
            .send(SignalingMessage::Disconnect { client_id, reason })
            .await
            .map_err(|e| ActorError::MailboxSend(e.to_string()))
    }

    /// Submit a decoded client request.
    pub async fn request(
        &self,
        client_id: ClientId,
        request: ClientRequest,
    ) -> Result<(), ActorError> {
        self.sender
            .send(SignalingMessage::Request { client_id, request })
            .await
            .map_err(|e| ActorError::MailboxSend(e.to_string()))
    }

    /// Fetch current client and room counts.
    ///
    /// Because the actor processes its mailbox in order, awaiting this
    /// also guarantees every previously submitted message has been
    /// applied.
    pub async fn status(&self) -> Result<ControllerStatus, ActorError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SignalingMessage::Status { respond_to: tx })
            .await
            .map_err(|e| ActorError::MailboxSend(e.to_string()))?;
        rx.await
            .map_err(|e| ActorError::ResponseClosed(e.to_string()))
    }

    /// Stop the actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Token for tasks that must stop with the actor.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }
}

/// The `SignalingActor` implementation. Owns all mutable state.
pub struct SignalingActor {
    receiver: mpsc::Receiver<SignalingMessage>,
    cancel_token: CancellationToken,
    settings: SignalingSettings,
    hasher: PasswordHasher,
    clients: Registry<Client>,
    rooms: Registry<Room>,
}

impl SignalingActor {
    fn new(
        receiver: mpsc::Receiver<SignalingMessage>,
        cancel_token: CancellationToken,
        settings: SignalingSettings,
        hasher: PasswordHasher,
    ) -> Self {
        Self {
            receiver,
            cancel_token,
            settings,
            hasher,
            clients: Registry::new(),
            rooms: Registry::new(),
        }
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "ps.actor.signaling")]
    async fn run(mut self) {
        info!(target: "ps.actor.signaling", "SignalingActor started");

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "ps.actor.signaling",
                        "SignalingActor received cancellation signal"
                    );
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => self.handle_message(message),
                        None => {
                            info!(
                                target: "ps.actor.signaling",
                                "SignalingActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "ps.actor.signaling",
            clients = self.clients.len(),
            rooms = self.rooms.len(),
            "SignalingActor stopped"
        );
    }

    fn handle_message(&mut self, message: SignalingMessage) {
        match message {
            SignalingMessage::Connect {
                client_id,
                outbound,
            } => self.handle_connect(client_id, outbound),

            SignalingMessage::Disconnect { client_id, reason } => {
                self.handle_disconnect(&client_id, reason);
            }

            SignalingMessage::Request { client_id, request } => {
                self.handle_request(&client_id, request);
            }

            SignalingMessage::Status { respond_to } => {
                let _ = respond_to.send(ControllerStatus {
                    clients: self.clients.len(),
                    rooms: self.rooms.len(),
                });
            }
        }
    }

    fn handle_connect(
        &mut self,
        client_id: ClientId,
        outbound: mpsc::UnboundedSender<OutboundEvent>,
    ) {
        if !self.clients.add(Client::new(client_id.clone(), outbound)) {
            warn!(
                target: "ps.actor.signaling",
                client_id = %client_id,
                "Duplicate connect for client id, ignoring"
            );
            return;
        }
        set_clients_connected(self.clients.len());
        debug!(
            target: "ps.actor.signaling",
            client_id = %client_id,
            clients = self.clients.len(),
            "Client connected"
        );
    }

    fn handle_disconnect(&mut self, client_id: &str, reason: DisconnectReason) {
        self.leave_current_room(client_id);
        if self.clients.remove(client_id).is_none() {
            debug!(
                target: "ps.actor.signaling",
                client_id = %client_id,
                "Disconnect for unknown client"
            );
            return;
        }
        record_disconnect(reason.as_str());
        set_clients_connected(self.clients.len());
        debug!(
            target: "ps.actor.signaling",
            client_id = %client_id,
            reason = reason.as_str(),
            clients = self.clients.len(),
            "Client disconnected"
        );
    }

    fn handle_request(&mut self, client_id: &str, request: ClientRequest) {
        if !self.clients.contains(client_id) {
            warn!(
                target: "ps.actor.signaling",
                client_id = %client_id,
                "Request from unregistered client, dropping"
            );
            return;
        }

        match request {
            ClientRequest::Create { name, password } => {
                self.handle_create(client_id, name, password);
            }
            ClientRequest::Join { room_id, password } => {
                self.handle_join(client_id, &room_id, &password);
            }
            ClientRequest::Leave => self.handle_leave(client_id),
            ClientRequest::Kick { user_id } => self.handle_kick(client_id, &user_id),
            ClientRequest::Ban { user_id } => self.handle_ban(client_id, &user_id),
            ClientRequest::Unban { user_id } => self.handle_unban(client_id, &user_id),
            ClientRequest::Message { text } => self.handle_room_message(client_id, text),
            ClientRequest::Toggle { resource } => self.handle_toggle(client_id, &resource),
            ClientRequest::Offer { call_id, sdp } => {
                self.handle_relay(client_id, &call_id, RelayKind::Offer, sdp);
            }
            ClientRequest::Answer { call_id, sdp } => {
                self.handle_relay(client_id, &call_id, RelayKind::Answer, sdp);
            }
            ClientRequest::Candidate { call_id, ice } => {
                self.handle_relay(client_id, &call_id, RelayKind::Candidate, ice);
            }
        }
    }

    fn handle_create(&mut self, client_id: &str, name: Option<String>, password: Option<String>) {
        // Membership is exclusive; creating a room implies leaving the
        // current one.
        self.leave_current_room(client_id);

        let digest = password
            .filter(|p| !p.is_empty())
            .map(|p| self.hasher.digest(&p));
        let room_id = self.rooms.generate_id(self.settings.room_id_bytes);

        let room = {
            let Some(client) = self.clients.get_mut(client_id) else {
                return;
            };
            Room::new(
                room_id.clone(),
                name,
                digest,
                client,
                self.settings.max_clients,
            )
        };
        self.rooms.add(room);
        set_rooms_active(self.rooms.len());

        info!(
            target: "ps.actor.signaling",
            client_id = %client_id,
            room_id = %room_id,
            rooms = self.rooms.len(),
            "Room created"
        );
        self.send_to(client_id, OutboundEvent::Created { room_id });
    }

    fn handle_join(&mut self, client_id: &str, room_id: &str, password: &str) {
        if !self.rooms.contains(room_id) {
            warn!(
                target: "ps.actor.signaling",
                client_id = %client_id,
                room_id = %room_id,
                "Join for unknown room, dropping"
            );
            return;
        }

        // Switching rooms leaves the old one first. Re-joining the current
        // room is left to the membership check so the client gets told.
        let current = self.client_room(client_id);
        if current.is_some() && current.as_deref() != Some(room_id) {
            self.leave_current_room(client_id);
        }

        let result = {
            let Some(room) = self.rooms.get_mut(room_id) else {
                return;
            };
            let Some(client) = self.clients.get_mut(client_id) else {
                return;
            };
            room.join(client, password, &self.hasher)
        };

        match result {
            Ok(()) => {
                self.send_to(
                    client_id,
                    OutboundEvent::Joined {
                        room_id: room_id.to_owned(),
                    },
                );
                if let Some(room) = self.rooms.get(room_id) {
                    room.broadcast(OutboundEvent::RJoined {
                        user_id: client_id.to_owned(),
                    });
                }
                debug!(
                    target: "ps.actor.signaling",
                    client_id = %client_id,
                    room_id = %room_id,
                    "Client joined room"
                );
            }
            Err(err) => {
                let (event, reason) = match err {
                    RoomError::AlreadyMember => (OutboundEvent::JoinAlreadyIn, "already_member"),
                    RoomError::WrongPassword => (OutboundEvent::JoinWrongPass, "wrong_password"),
                    RoomError::RoomFull => (OutboundEvent::JoinFull, "room_full"),
                    RoomError::Banned => (OutboundEvent::JoinBanned, "banned"),
                    _ => return,
                };
                record_join_rejected(reason);
                debug!(
                    target: "ps.actor.signaling",
                    client_id = %client_id,
                    room_id = %room_id,
                    reason = reason,
                    "Join rejected"
                );
                self.send_to(client_id, event);
            }
        }
    }

    fn handle_leave(&mut self, client_id: &str) {
        match self.leave_current_room(client_id) {
            Some(room_id) => {
                self.send_to(client_id, OutboundEvent::Left { room_id });
            }
            None => {
                debug!(
                    target: "ps.actor.signaling",
                    client_id = %client_id,
                    "Leave while not in a room, ignoring"
                );
            }
        }
    }

    fn handle_kick(&mut self, actor_id: &str, target_id: &str) {
        let Some(room_id) = self.client_room(actor_id) else {
            debug!(
                target: "ps.actor.signaling",
                client_id = %actor_id,
                "Kick while not in a room, ignoring"
            );
            return;
        };
        let target_ref = self.clients.get(target_id).map(Client::to_ref);

        let result = {
            let Some(room) = self.rooms.get_mut(&room_id) else {
                return;
            };
            match self.clients.get_mut(target_id) {
                Some(target) => room.kick(actor_id, target),
                // Unknown ids fail the same checks a stranger would.
                None if !room.is_owner(actor_id) => Err(RoomError::NotOwner),
                None => Err(RoomError::NotMember),
            }
        };

        match result {
            Ok(outcome) => {
                if let Some(target) = target_ref {
                    target.send(OutboundEvent::Kicked {
                        room_id: room_id.clone(),
                    });
                }
                if let Some(room) = self.rooms.get(&room_id) {
                    room.broadcast(OutboundEvent::RKicked {
                        user_id: target_id.to_owned(),
                    });
                }
                info!(
                    target: "ps.actor.signaling",
                    room_id = %room_id,
                    client_id = %actor_id,
                    target_id = %target_id,
                    "Client kicked"
                );
                self.apply_departure(&room_id, outcome);
            }
            Err(RoomError::NotOwner) => self.send_to(actor_id, OutboundEvent::KickNoPrivileges),
            Err(RoomError::NotMember) => self.send_to(actor_id, OutboundEvent::KickNotIn),
            Err(_) => {}
        }
    }

    fn handle_ban(&mut self, actor_id: &str, target_id: &str) {
        let Some(room_id) = self.client_room(actor_id) else {
            debug!(
                target: "ps.actor.signaling",
                client_id = %actor_id,
                "Ban while not in a room, ignoring"
            );
            return;
        };
        let target_ref = self.clients.get(target_id).map(Client::to_ref);

        let result = {
            let Some(room) = self.rooms.get_mut(&room_id) else {
                return;
            };
            match self.clients.get_mut(target_id) {
                Some(target) => room.ban(actor_id, target),
                None if !room.is_owner(actor_id) => Err(RoomError::NotOwner),
                None => {
                    warn!(
                        target: "ps.actor.signaling",
                        client_id = %actor_id,
                        target_id = %target_id,
                        "Ban for unknown client, dropping"
                    );
                    return;
                }
            }
        };

        match result {
            Ok(outcome) => {
                // The target is told about every successful ban, member or
                // not.
                if let Some(target) = target_ref {
                    target.send(OutboundEvent::Banned {
                        room_id: room_id.clone(),
                    });
                }
                if let Some(room) = self.rooms.get(&room_id) {
                    room.broadcast(OutboundEvent::RBanned {
                        user_id: target_id.to_owned(),
                    });
                }
                info!(
                    target: "ps.actor.signaling",
                    room_id = %room_id,
                    client_id = %actor_id,
                    target_id = %target_id,
                    ejected = outcome.is_some(),
                    "Client banned"
                );
                if let Some(outcome) = outcome {
                    self.apply_departure(&room_id, outcome);
                }
            }
            Err(RoomError::NotOwner) => self.send_to(actor_id, OutboundEvent::BanNoPrivileges),
            Err(RoomError::AlreadyBanned) => self.send_to(actor_id, OutboundEvent::BanAlready),
            Err(_) => {}
        }
    }

    fn handle_unban(&mut self, actor_id: &str, target_id: &str) {
        let Some(room_id) = self.client_room(actor_id) else {
            debug!(
                target: "ps.actor.signaling",
                client_id = %actor_id,
                "Unban while not in a room, ignoring"
            );
            return;
        };

        let result = match self.rooms.get_mut(&room_id) {
            Some(room) => room.unban(actor_id, target_id),
            None => return,
        };

        match result {
            Ok(()) => {
                if let Some(room) = self.rooms.get(&room_id) {
                    room.broadcast(OutboundEvent::RUnbanned {
                        user_id: target_id.to_owned(),
                    });
                }
                info!(
                    target: "ps.actor.signaling",
                    room_id = %room_id,
                    client_id = %actor_id,
                    target_id = %target_id,
                    "Client unbanned"
                );
            }
            Err(RoomError::NotOwner) => self.send_to(actor_id, OutboundEvent::UnbanNoPrivileges),
            Err(RoomError::NotBanned) => self.send_to(actor_id, OutboundEvent::UnbanNotBanned),
            Err(_) => {}
        }
    }

    fn handle_room_message(&mut self, client_id: &str, text: String) {
        if text.is_empty() {
            return;
        }
        let Some(room) = self.current_room(client_id) else {
            debug!(
                target: "ps.actor.signaling",
                client_id = %client_id,
                "Message while not in a room, ignoring"
            );
            return;
        };
        room.broadcast(OutboundEvent::RMessage {
            user_id: client_id.to_owned(),
            text,
        });
    }

    fn handle_toggle(&mut self, client_id: &str, resource_name: &str) {
        let Some(resource) = Resource::from_name(resource_name) else {
            warn!(
                target: "ps.actor.signaling",
                client_id = %client_id,
                resource = %resource_name,
                "Toggle for unknown resource, dropping"
            );
            return;
        };

        // Flags only change while the sender is in a room; a toggle from
        // the lobby must not leave inverted state behind.
        if self.client_room(client_id).is_none() {
            debug!(
                target: "ps.actor.signaling",
                client_id = %client_id,
                resource = %resource_name,
                "Toggle while not in a room, ignoring"
            );
            return;
        }

        let status = match self.clients.get_mut(client_id) {
            Some(client) => client.toggle_resource(resource),
            None => return,
        };

        if let Some(room) = self.current_room(client_id) {
            room.broadcast(OutboundEvent::RResource {
                user_id: client_id.to_owned(),
                resource: resource.as_str().to_owned(),
                status,
            });
        }
    }

    fn handle_relay(
        &mut self,
        client_id: &str,
        call_id: &str,
        kind: RelayKind,
        payload: serde_json::Value,
    ) {
        let Some(room) = self.current_room(client_id) else {
            debug!(
                target: "ps.actor.signaling",
                client_id = %client_id,
                call_id = %call_id,
                kind = kind.as_str(),
                "Relay while not in a room, ignoring"
            );
            return;
        };

        let relayed = match kind {
            RelayKind::Offer => room.offer(client_id, call_id, payload),
            RelayKind::Answer => room.answer(client_id, call_id, payload),
            RelayKind::Candidate => room.candidate(client_id, call_id, payload),
        };

        if relayed {
            record_signal_relayed(kind.as_str());
        } else {
            warn!(
                target: "ps.actor.signaling",
                client_id = %client_id,
                call_id = %call_id,
                kind = kind.as_str(),
                "Relay rejected: unknown call or wrong role"
            );
        }
    }

    /// Remove the client from whatever room it is in and settle the
    /// aftermath. Returns the left room's id, or None if the client was
    /// not in one.
    fn leave_current_room(&mut self, client_id: &str) -> Option<String> {
        let room_id = self.client_room(client_id)?;

        let outcome = {
            let room = self.rooms.get_mut(&room_id)?;
            let client = self.clients.get_mut(client_id)?;
            room.leave(client)
        };

        // Removal precedes the broadcast, so the departed client is not a
        // recipient.
        if let Some(room) = self.rooms.get(&room_id) {
            room.broadcast(OutboundEvent::RLeft {
                user_id: client_id.to_owned(),
            });
        }
        self.apply_departure(&room_id, outcome);
        Some(room_id)
    }

    /// React to a member removal: announce ownership changes, drop
    /// emptied rooms.
    fn apply_departure(&mut self, room_id: &str, outcome: LeaveOutcome) {
        match outcome {
            LeaveOutcome::StillActive => {}
            LeaveOutcome::OwnerChanged(user_id) => {
                info!(
                    target: "ps.actor.signaling",
                    room_id = %room_id,
                    owner_id = %user_id,
                    "Room ownership changed"
                );
                if let Some(room) = self.rooms.get(room_id) {
                    room.broadcast(OutboundEvent::ROwner { user_id });
                }
            }
            LeaveOutcome::Destroyed => {
                self.rooms.remove(room_id);
                set_rooms_active(self.rooms.len());
                info!(
                    target: "ps.actor.signaling",
                    room_id = %room_id,
                    rooms = self.rooms.len(),
                    "Room destroyed"
                );
            }
        }
    }

    fn client_room(&self, client_id: &str) -> Option<String> {
        self.clients
            .get(client_id)
            .and_then(|c| c.room().map(ToOwned::to_owned))
    }

    fn current_room(&self, client_id: &str) -> Option<&Room> {
        let room_id = self.clients.get(client_id)?.room()?;
        self.rooms.get(room_id)
    }

    fn send_to(&self, client_id: &str, event: OutboundEvent) {
        if let Some(client) = self.clients.get(client_id) {
            client.send(event);
        }
    }
}

/// Which leg of the SDP/ICE exchange a relay request belongs to.
#[derive(Debug, Clone, Copy)]
enum RelayKind {
    Offer,
    Answer,
    Candidate,
}

impl RelayKind {
    const fn as_str(self) -> &'static str {
        match self {
            RelayKind::Offer => "offer",
            RelayKind::Answer => "answer",
            RelayKind::Candidate => "candidate",
        }
    }
}
