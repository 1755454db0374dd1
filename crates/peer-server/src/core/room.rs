//! Room state machine: membership, access control and the call mesh.
//!
//! A room is *active* while it has members and is destroyed the moment the
//! last member leaves; the owning registry entry is removed by the caller
//! when an operation reports [`LeaveOutcome::Destroyed`]. Invariants held
//! by every operation here:
//!
//! - the owner is always a member while the member set is non-empty;
//! - every unordered pair of distinct members has exactly one call;
//! - a client's room back-reference agrees with the member set.
//!
//! Departure outcomes are returned to the caller rather than reported
//! through any shared controller state, so the controller decides what to
//! broadcast and when to drop the registry entry.

use std::collections::{HashMap, HashSet};

use ring::rand::{SecureRandom, SystemRandom};

use crate::core::call::Call;
use crate::core::client::{Client, ClientId, ClientRef};
use crate::core::password::{PasswordDigest, PasswordHasher};
use crate::core::registry::{Keyed, Registry};
use crate::errors::RoomError;
use crate::wire::OutboundEvent;

/// Unique room token: hex encoding of random bytes.
pub type RoomId = String;

/// Result of removing a member, however initiated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// Members remain and the owner is unchanged.
    StillActive,
    /// The departing member was the owner; ownership moved to the earliest
    /// still-present member by join order.
    OwnerChanged(ClientId),
    /// The last member left; the caller must drop the room.
    Destroyed,
}

/// A named, optionally password-protected group of clients.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    name: Option<String>,
    password: Option<PasswordDigest>,
    owner: ClientId,
    /// Members in join order; owner succession takes the front.
    members: Vec<ClientRef>,
    banned: HashSet<ClientId>,
    calls: HashMap<String, Call>,
    max_clients: usize,
}

impl Room {
    /// Create a room with its first member, who becomes owner. Creation
    /// cannot fail; the creator's room reference is updated here.
    #[must_use]
    pub fn new(
        id: RoomId,
        name: Option<String>,
        password: Option<PasswordDigest>,
        creator: &mut Client,
        max_clients: usize,
    ) -> Self {
        creator.set_room(Some(id.clone()));
        Self {
            id,
            name,
            password,
            owner: creator.id().to_owned(),
            members: vec![creator.to_ref()],
            banned: HashSet::new(),
            calls: HashMap::new(),
            max_clients,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn is_owner(&self, client_id: &str) -> bool {
        self.owner == client_id
    }

    #[must_use]
    pub fn is_member(&self, client_id: &str) -> bool {
        self.members.iter().any(|m| m.id() == client_id)
    }

    #[must_use]
    pub fn is_banned(&self, client_id: &str) -> bool {
        self.banned.contains(client_id)
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.members.len() >= self.max_clients
    }

    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Number of active calls; a full mesh over `n` members has
    /// `n * (n - 1) / 2`.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    /// Whether exactly one call exists between the two given members.
    #[must_use]
    pub fn has_call_between(&self, a: &str, b: &str) -> bool {
        self.calls
            .values()
            .filter(|c| c.contains(a) && c.contains(b))
            .count()
            == 1
    }

    fn authorize(&self, password: &str, hasher: &PasswordHasher) -> bool {
        match &self.password {
            None => true,
            Some(digest) => hasher.verify(digest, password),
        }
    }

    /// Admit a client. Checks run in a fixed order so the caller can give
    /// the most useful rejection: membership, then password, then
    /// capacity, then ban. On success one call is created pairing the
    /// newcomer with each existing member, and the newcomer's room
    /// reference is set.
    pub fn join(
        &mut self,
        client: &mut Client,
        password: &str,
        hasher: &PasswordHasher,
    ) -> Result<(), RoomError> {
        if self.is_member(client.id()) {
            return Err(RoomError::AlreadyMember);
        }
        if !self.authorize(password, hasher) {
            return Err(RoomError::WrongPassword);
        }
        if self.is_full() {
            return Err(RoomError::RoomFull);
        }
        if self.is_banned(client.id()) {
            return Err(RoomError::Banned);
        }

        self.create_calls(client);
        self.members.push(client.to_ref());
        client.set_room(Some(self.id.clone()));
        Ok(())
    }

    /// Pair the newcomer with every existing member. Calls are registered
    /// before the offerers are told about them, so no announcement ever
    /// references unregistered state.
    fn create_calls(&mut self, newcomer: &Client) {
        let mut created = Vec::with_capacity(self.members.len());
        for member in &self.members {
            let call = Call::new(&self.id, member.clone(), newcomer.to_ref());
            created.push(call.id().to_owned());
            self.calls.insert(call.id().to_owned(), call);
        }
        for call_id in created {
            if let Some(call) = self.calls.get(&call_id) {
                call.announce();
            }
        }
    }

    /// Remove a member: tear down its calls, clear its room reference and
    /// settle ownership. The caller reacts to the outcome (ownership
    /// broadcast, registry removal).
    pub fn leave(&mut self, client: &mut Client) -> LeaveOutcome {
        self.members.retain(|m| m.id() != client.id());
        self.hangup_calls(client.id());
        client.set_room(None);

        if self.members.is_empty() {
            return LeaveOutcome::Destroyed;
        }
        if self.owner == client.id() {
            // Earliest still-present member by join order succeeds.
            let successor = match self.members.first() {
                Some(member) => member.id().to_owned(),
                None => return LeaveOutcome::Destroyed,
            };
            self.owner = successor.clone();
            return LeaveOutcome::OwnerChanged(successor);
        }
        LeaveOutcome::StillActive
    }

    /// Remove a member on the owner's behalf. Does not touch the ban list,
    /// so a kicked client may immediately rejoin.
    pub fn kick(&mut self, actor_id: &str, target: &mut Client) -> Result<LeaveOutcome, RoomError> {
        if !self.is_owner(actor_id) {
            return Err(RoomError::NotOwner);
        }
        if !self.is_member(target.id()) {
            return Err(RoomError::NotMember);
        }
        Ok(self.leave(target))
    }

    /// Ban a client's id, ejecting it first if currently a member. Bans
    /// are independent of membership: the target may be absent
    /// (pre-emptive ban) or present (ban-and-eject). The ban-status check
    /// applies to the target, never the actor.
    pub fn ban(
        &mut self,
        actor_id: &str,
        target: &mut Client,
    ) -> Result<Option<LeaveOutcome>, RoomError> {
        if !self.is_owner(actor_id) {
            return Err(RoomError::NotOwner);
        }
        if self.is_banned(target.id()) {
            return Err(RoomError::AlreadyBanned);
        }

        self.banned.insert(target.id().to_owned());
        if self.is_member(target.id()) {
            Ok(Some(self.leave(target)))
        } else {
            Ok(None)
        }
    }

    /// Lift a ban.
    pub fn unban(&mut self, actor_id: &str, target_id: &str) -> Result<(), RoomError> {
        if !self.is_owner(actor_id) {
            return Err(RoomError::NotOwner);
        }
        if !self.banned.remove(target_id) {
            return Err(RoomError::NotBanned);
        }
        Ok(())
    }

    /// Relay an SDP offer over one of this room's calls. Returns false if
    /// the call is unknown or the sender is not its offerer.
    pub fn offer(&self, sender_id: &str, call_id: &str, sdp: serde_json::Value) -> bool {
        self.calls
            .get(call_id)
            .is_some_and(|call| call.offer(sender_id, sdp))
    }

    /// Relay an SDP answer. Returns false if unknown call or wrong role.
    pub fn answer(&self, sender_id: &str, call_id: &str, sdp: serde_json::Value) -> bool {
        self.calls
            .get(call_id)
            .is_some_and(|call| call.answer(sender_id, sdp))
    }

    /// Relay an ICE candidate. Returns false if unknown call or the sender
    /// is not a participant.
    pub fn candidate(&self, sender_id: &str, call_id: &str, ice: serde_json::Value) -> bool {
        self.calls
            .get(call_id)
            .is_some_and(|call| call.candidate(sender_id, ice))
    }

    /// Deliver an event to every current member.
    pub fn broadcast(&self, event: OutboundEvent) {
        for member in &self.members {
            member.send(event.clone());
        }
    }

    /// Tear down every call involving the given client, notifying both
    /// participants of each. Calls are unregistered before the hangup is
    /// queued.
    fn hangup_calls(&mut self, client_id: &str) {
        let affected: Vec<String> = self
            .calls
            .values()
            .filter(|call| call.contains(client_id))
            .map(|call| call.id().to_owned())
            .collect();
        for call_id in affected {
            if let Some(call) = self.calls.remove(&call_id) {
                call.hangup();
            }
        }
    }
}

impl Keyed for Room {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Registry<Room> {
    /// Generate a random hex id of `bytes` random bytes that does not
    /// collide with any active room.
    #[must_use]
    pub fn generate_id(&self, bytes: usize) -> RoomId {
        loop {
            let id = random_hex(bytes);
            if !self.contains(&id) {
                return id;
            }
        }
    }
}

// CSPRNG fill only fails when the OS entropy source itself is broken.
#[allow(clippy::expect_used)]
fn random_hex(bytes: usize) -> String {
    let rng = SystemRandom::new();
    let mut buf = vec![0u8; bytes];
    rng.fill(&mut buf).expect("CSPRNG fill cannot fail");
    hex::encode(buf)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(vec![9u8; 32])
    }

    fn client(id: &str) -> (Client, UnboundedReceiver<OutboundEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Client::new(id.to_string(), tx), rx)
    }

    fn open_room(creator: &mut Client) -> Room {
        Room::new("room1".to_string(), None, None, creator, 40)
    }

    /// Full mesh: every pair of distinct members has exactly one call.
    fn assert_mesh(room: &Room, member_ids: &[&str]) {
        let n = member_ids.len();
        assert_eq!(room.call_count(), n * (n - 1) / 2);
        for (i, a) in member_ids.iter().enumerate() {
            for b in member_ids.iter().skip(i + 1) {
                assert!(room.has_call_between(a, b), "missing call {a}<->{b}");
            }
        }
    }

    #[test]
    fn test_creator_is_owner_and_first_member() {
        let (mut alice, _rx) = client("alice");
        let room = open_room(&mut alice);
        assert!(room.is_owner("alice"));
        assert!(room.is_member("alice"));
        assert_eq!(alice.room(), Some("room1"));
        assert_eq!(room.member_count(), 1);
        assert_eq!(room.call_count(), 0);
    }

    #[test]
    fn test_join_builds_full_mesh() {
        let (mut alice, _rx_a) = client("alice");
        let (mut bob, _rx_b) = client("bob");
        let (mut carol, _rx_c) = client("carol");
        let mut room = open_room(&mut alice);

        room.join(&mut bob, "", &hasher()).unwrap();
        assert_mesh(&room, &["alice", "bob"]);

        room.join(&mut carol, "", &hasher()).unwrap();
        assert_mesh(&room, &["alice", "bob", "carol"]);
        assert_eq!(carol.room(), Some("room1"));
    }

    #[test]
    fn test_join_announces_calls_to_established_members() {
        let (mut alice, mut rx_a) = client("alice");
        let (mut bob, mut rx_b) = client("bob");
        let mut room = open_room(&mut alice);

        room.join(&mut bob, "", &hasher()).unwrap();

        // The established member is told to start the exchange; the
        // newcomer waits for the offer.
        assert!(matches!(
            rx_a.try_recv().unwrap(),
            OutboundEvent::Call { .. }
        ));
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_join_rejection_is_idempotent() {
        let (mut alice, _rx_a) = client("alice");
        let (mut bob, _rx_b) = client("bob");
        let mut room = open_room(&mut alice);
        room.join(&mut bob, "", &hasher()).unwrap();

        for _ in 0..2 {
            assert_eq!(
                room.join(&mut bob, "", &hasher()),
                Err(RoomError::AlreadyMember)
            );
            assert_eq!(room.member_count(), 2);
            assert_eq!(room.call_count(), 1);
        }
    }

    #[test]
    fn test_join_with_wrong_password_is_rejected() {
        let h = hasher();
        let (mut alice, _rx_a) = client("alice");
        let (mut bob, _rx_b) = client("bob");
        let mut room = Room::new(
            "room1".to_string(),
            None,
            Some(h.digest("secret")),
            &mut alice,
            40,
        );

        assert_eq!(room.join(&mut bob, "wrong", &h), Err(RoomError::WrongPassword));
        assert_eq!(bob.room(), None);
        room.join(&mut bob, "secret", &h).unwrap();
        assert!(room.is_member("bob"));
    }

    #[test]
    fn test_join_full_room_changes_nothing() {
        let (mut alice, _rx_a) = client("alice");
        let (mut bob, _rx_b) = client("bob");
        let (mut carol, _rx_c) = client("carol");
        let mut room = Room::new("room1".to_string(), None, None, &mut alice, 2);

        room.join(&mut bob, "", &hasher()).unwrap();
        assert_eq!(room.join(&mut carol, "", &hasher()), Err(RoomError::RoomFull));
        assert_eq!(room.member_count(), 2);
        assert_eq!(room.call_count(), 1);
        assert_eq!(carol.room(), None);
    }

    #[test]
    fn test_banned_client_cannot_rejoin() {
        let (mut alice, _rx_a) = client("alice");
        let (mut bob, _rx_b) = client("bob");
        let mut room = open_room(&mut alice);
        room.join(&mut bob, "", &hasher()).unwrap();

        room.ban("alice", &mut bob).unwrap();
        assert_eq!(room.join(&mut bob, "", &hasher()), Err(RoomError::Banned));
        assert_eq!(bob.room(), None);
    }

    #[test]
    fn test_leave_tears_down_member_calls_only() {
        let (mut alice, _rx_a) = client("alice");
        let (mut bob, mut rx_b) = client("bob");
        let (mut carol, _rx_c) = client("carol");
        let mut room = open_room(&mut alice);
        room.join(&mut bob, "", &hasher()).unwrap();
        room.join(&mut carol, "", &hasher()).unwrap();

        let outcome = room.leave(&mut bob);
        assert_eq!(outcome, LeaveOutcome::StillActive);
        assert_mesh(&room, &["alice", "carol"]);
        assert_eq!(bob.room(), None);

        // Bob was notified of both hangups.
        let mut hangups = 0;
        while let Ok(event) = rx_b.try_recv() {
            if matches!(event, OutboundEvent::Hangup { .. }) {
                hangups += 1;
            }
        }
        assert_eq!(hangups, 2);
    }

    #[test]
    fn test_owner_departure_promotes_earliest_member() {
        let (mut alice, _rx_a) = client("alice");
        let (mut bob, _rx_b) = client("bob");
        let (mut carol, _rx_c) = client("carol");
        let mut room = open_room(&mut alice);
        room.join(&mut bob, "", &hasher()).unwrap();
        room.join(&mut carol, "", &hasher()).unwrap();

        let outcome = room.leave(&mut alice);
        assert_eq!(outcome, LeaveOutcome::OwnerChanged("bob".to_string()));
        assert!(room.is_owner("bob"));
        assert!(room.is_member("bob"));
    }

    #[test]
    fn test_last_member_leaving_destroys_room() {
        let (mut alice, _rx_a) = client("alice");
        let mut room = open_room(&mut alice);
        assert_eq!(room.leave(&mut alice), LeaveOutcome::Destroyed);
        assert_eq!(room.member_count(), 0);
    }

    #[test]
    fn test_owner_in_members_whenever_nonempty() {
        let (mut alice, _rx_a) = client("alice");
        let (mut bob, _rx_b) = client("bob");
        let (mut carol, _rx_c) = client("carol");
        let mut room = open_room(&mut alice);
        room.join(&mut bob, "", &hasher()).unwrap();
        room.join(&mut carol, "", &hasher()).unwrap();

        for departing in [&mut alice, &mut carol] {
            room.leave(departing);
            if room.member_count() > 0 {
                assert!(room.is_member(room.owner().to_owned().as_str()));
            }
        }
    }

    #[test]
    fn test_kick_requires_ownership() {
        let (mut alice, _rx_a) = client("alice");
        let (mut bob, _rx_b) = client("bob");
        let mut room = open_room(&mut alice);
        room.join(&mut bob, "", &hasher()).unwrap();

        assert_eq!(room.kick("bob", &mut alice), Err(RoomError::NotOwner));
        assert!(room.is_member("alice"));
        assert_eq!(room.member_count(), 2);
    }

    #[test]
    fn test_kick_does_not_ban() {
        let (mut alice, _rx_a) = client("alice");
        let (mut bob, _rx_b) = client("bob");
        let mut room = open_room(&mut alice);
        room.join(&mut bob, "", &hasher()).unwrap();

        room.kick("alice", &mut bob).unwrap();
        assert!(!room.is_member("bob"));
        assert!(!room.is_banned("bob"));

        // A kicked client may rejoin immediately.
        room.join(&mut bob, "", &hasher()).unwrap();
        assert!(room.is_member("bob"));
    }

    #[test]
    fn test_kick_of_non_member_is_rejected() {
        let (mut alice, _rx_a) = client("alice");
        let (mut mallory, _rx_m) = client("mallory");
        let mut room = open_room(&mut alice);
        assert_eq!(room.kick("alice", &mut mallory), Err(RoomError::NotMember));
    }

    #[test]
    fn test_ban_ejects_current_member() {
        let (mut alice, _rx_a) = client("alice");
        let (mut bob, mut rx_b) = client("bob");
        let mut room = open_room(&mut alice);
        room.join(&mut bob, "", &hasher()).unwrap();

        let outcome = room.ban("alice", &mut bob).unwrap();
        assert_eq!(outcome, Some(LeaveOutcome::StillActive));
        assert!(!room.is_member("bob"));
        assert!(room.is_banned("bob"));
        assert_eq!(room.call_count(), 0);
        assert_eq!(bob.room(), None);

        let mut saw_hangup = false;
        while let Ok(event) = rx_b.try_recv() {
            saw_hangup |= matches!(event, OutboundEvent::Hangup { .. });
        }
        assert!(saw_hangup);
    }

    #[test]
    fn test_preemptive_ban_of_absent_client() {
        let (mut alice, _rx_a) = client("alice");
        let (mut bob, _rx_b) = client("bob");
        let mut room = open_room(&mut alice);

        let outcome = room.ban("alice", &mut bob).unwrap();
        assert_eq!(outcome, None);
        assert!(room.is_banned("bob"));
        assert_eq!(room.join(&mut bob, "", &hasher()), Err(RoomError::Banned));
    }

    #[test]
    fn test_ban_checks_target_not_actor() {
        let (mut alice, _rx_a) = client("alice");
        let (mut bob, _rx_b) = client("bob");
        let (mut carol, _rx_c) = client("carol");
        let mut room = open_room(&mut alice);
        room.join(&mut bob, "", &hasher()).unwrap();
        room.join(&mut carol, "", &hasher()).unwrap();

        room.ban("alice", &mut bob).unwrap();
        // Banning a second, unbanned target still works even with an
        // existing ban on the books.
        room.ban("alice", &mut carol).unwrap();
        assert!(room.is_banned("carol"));

        assert_eq!(room.ban("alice", &mut bob), Err(RoomError::AlreadyBanned));
    }

    #[test]
    fn test_ban_unban_round_trip() {
        let (mut alice, _rx_a) = client("alice");
        let (mut bob, _rx_b) = client("bob");
        let mut room = open_room(&mut alice);
        room.join(&mut bob, "", &hasher()).unwrap();

        room.ban("alice", &mut bob).unwrap();
        room.unban("alice", "bob").unwrap();
        assert!(!room.is_banned("bob"));
        // No residual membership effect beyond the ejection itself.
        assert!(!room.is_member("bob"));
        room.join(&mut bob, "", &hasher()).unwrap();
        assert!(room.is_member("bob"));
    }

    #[test]
    fn test_unban_of_unbanned_target_is_rejected() {
        let (mut alice, _rx_a) = client("alice");
        let mut room = open_room(&mut alice);
        assert_eq!(room.unban("alice", "bob"), Err(RoomError::NotBanned));
    }

    #[test]
    fn test_unban_requires_ownership() {
        let (mut alice, _rx_a) = client("alice");
        let (mut bob, _rx_b) = client("bob");
        let mut room = open_room(&mut alice);
        room.join(&mut bob, "", &hasher()).unwrap();
        room.ban("alice", &mut bob).unwrap();

        assert_eq!(room.unban("bob", "bob"), Err(RoomError::NotOwner));
        assert!(room.is_banned("bob"));
    }

    #[test]
    fn test_relay_rejects_unknown_call_id() {
        let (mut alice, _rx_a) = client("alice");
        let room = open_room(&mut alice);
        assert!(!room.offer("alice", "nope", serde_json::json!({})));
        assert!(!room.answer("alice", "nope", serde_json::json!({})));
        assert!(!room.candidate("alice", "nope", serde_json::json!({})));
    }

    #[test]
    fn test_broadcast_reaches_every_member() {
        let (mut alice, mut rx_a) = client("alice");
        let (mut bob, mut rx_b) = client("bob");
        let mut room = open_room(&mut alice);
        room.join(&mut bob, "", &hasher()).unwrap();

        room.broadcast(OutboundEvent::RMessage {
            user_id: "alice".to_string(),
            text: "hi".to_string(),
        });

        for rx in [&mut rx_a, &mut rx_b] {
            let mut saw = false;
            while let Ok(event) = rx.try_recv() {
                saw |= matches!(event, OutboundEvent::RMessage { .. });
            }
            assert!(saw);
        }
    }

    #[test]
    fn test_generated_ids_are_hex_and_collision_free() {
        let registry: Registry<Room> = Registry::new();
        let id = registry.generate_id(32);
        assert_eq!(id.len(), 64);
        assert!(hex::decode(&id).is_ok());
        assert_ne!(id, registry.generate_id(32));
    }
}
