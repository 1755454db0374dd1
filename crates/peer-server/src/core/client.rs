//! Per-connection client state.
//!
//! A [`Client`] is created when the transport layer accepts a connection
//! and lives in the client registry until disconnect. It owns the only
//! sending end of the connection's outbound event channel, an optional
//! reference to its current room, and the toggled media-resource flags.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::debug;

use crate::core::registry::Keyed;
use crate::wire::OutboundEvent;

/// Opaque unique client identifier, assigned at connect time.
pub type ClientId = String;

/// Media resources a client can advertise to its room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Screen,
    Video,
    Audio,
}

impl Resource {
    /// Parse a wire-level resource name. Unknown names yield `None` and the
    /// toggle request is dropped.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "screen" => Some(Resource::Screen),
            "video" => Some(Resource::Video),
            "audio" => Some(Resource::Audio),
            _ => None,
        }
    }

    /// Wire-level name of this resource.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Resource::Screen => "screen",
            Resource::Video => "video",
            Resource::Audio => "audio",
        }
    }
}

/// Fire-and-forget delivery capability for one client's outbound events.
///
/// Sends never block state mutation: events are queued on an unbounded
/// channel drained by the transport layer. A closed channel (connection
/// already gone) drops the event with a debug log, by the same reasoning
/// that makes disconnected senders a no-op everywhere else.
#[derive(Clone, Debug)]
pub struct OutboundSink {
    client_id: ClientId,
    sender: mpsc::UnboundedSender<OutboundEvent>,
}

impl OutboundSink {
    #[must_use]
    pub fn new(client_id: ClientId, sender: mpsc::UnboundedSender<OutboundEvent>) -> Self {
        Self { client_id, sender }
    }

    /// Queue an event for delivery to this client.
    pub fn send(&self, event: OutboundEvent) {
        if self.sender.send(event).is_err() {
            debug!(
                target: "ps.outbound",
                client_id = %self.client_id,
                "outbound channel closed, dropping event"
            );
        }
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

/// Cheap cloneable reference to a connected client: its id plus outbound
/// sink. Rooms and calls hold these instead of borrowing the registry.
#[derive(Clone, Debug)]
pub struct ClientRef {
    id: ClientId,
    outbound: OutboundSink,
}

impl ClientRef {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn send(&self, event: OutboundEvent) {
        self.outbound.send(event);
    }
}

/// State for one connected client.
#[derive(Debug)]
pub struct Client {
    id: ClientId,
    outbound: OutboundSink,
    room: Option<String>,
    resources: HashMap<Resource, bool>,
}

impl Client {
    /// Create a client with all resource flags off and no room.
    #[must_use]
    pub fn new(id: ClientId, sender: mpsc::UnboundedSender<OutboundEvent>) -> Self {
        let outbound = OutboundSink::new(id.clone(), sender);
        Self {
            id,
            outbound,
            room: None,
            resources: HashMap::from([
                (Resource::Screen, false),
                (Resource::Video, false),
                (Resource::Audio, false),
            ]),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Id of the room this client is currently in, if any.
    #[must_use]
    pub fn room(&self) -> Option<&str> {
        self.room.as_deref()
    }

    /// Update the room back-reference. Membership changes go through the
    /// room operations, which keep this in sync with the member set.
    pub fn set_room(&mut self, room: Option<String>) {
        self.room = room;
    }

    /// Queue an event for delivery to this client.
    pub fn send(&self, event: OutboundEvent) {
        self.outbound.send(event);
    }

    /// Flip a resource flag and return the new state.
    pub fn toggle_resource(&mut self, resource: Resource) -> bool {
        let state = self.resources.entry(resource).or_insert(false);
        *state = !*state;
        *state
    }

    /// Current state of a resource flag.
    #[must_use]
    pub fn resource(&self, resource: Resource) -> bool {
        self.resources.get(&resource).copied().unwrap_or(false)
    }

    /// Lightweight reference for rooms and calls to hold.
    #[must_use]
    pub fn to_ref(&self) -> ClientRef {
        ClientRef {
            id: self.id.clone(),
            outbound: self.outbound.clone(),
        }
    }
}

impl Keyed for Client {
    fn key(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn test_client(id: &str) -> (Client, mpsc::UnboundedReceiver<OutboundEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Client::new(id.to_string(), tx), rx)
    }

    #[test]
    fn test_resources_start_off() {
        let (client, _rx) = test_client("c1");
        assert!(!client.resource(Resource::Screen));
        assert!(!client.resource(Resource::Video));
        assert!(!client.resource(Resource::Audio));
    }

    #[test]
    fn test_toggle_resource_flips_state() {
        let (mut client, _rx) = test_client("c1");
        assert!(client.toggle_resource(Resource::Video));
        assert!(client.resource(Resource::Video));
        assert!(!client.toggle_resource(Resource::Video));
        assert!(!client.resource(Resource::Video));
    }

    #[test]
    fn test_resource_name_parsing() {
        assert_eq!(Resource::from_name("screen"), Some(Resource::Screen));
        assert_eq!(Resource::from_name("video"), Some(Resource::Video));
        assert_eq!(Resource::from_name("audio"), Some(Resource::Audio));
        assert_eq!(Resource::from_name("midi"), None);
    }

    #[test]
    fn test_send_queues_event() {
        let (client, mut rx) = test_client("c1");
        client.send(OutboundEvent::JoinFull);
        assert_eq!(rx.try_recv().unwrap(), OutboundEvent::JoinFull);
    }

    #[test]
    fn test_send_after_receiver_dropped_is_a_noop() {
        let (client, rx) = test_client("c1");
        drop(rx);
        // Must not panic or error; the event is silently dropped.
        client.send(OutboundEvent::JoinFull);
    }

    #[test]
    fn test_room_reference_starts_empty() {
        let (mut client, _rx) = test_client("c1");
        assert_eq!(client.room(), None);
        client.set_room(Some("r1".to_string()));
        assert_eq!(client.room(), Some("r1"));
        client.set_room(None);
        assert_eq!(client.room(), None);
    }
}
