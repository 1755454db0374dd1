//! Error types for the signaling relay.
//!
//! [`RoomError`] covers the full taxonomy of rejected domain operations.
//! Every variant is raised by exactly one room operation and converted 1:1
//! into an outbound failure event at the controller boundary; none is ever
//! fatal to the process. Call-relay authorization failures have no error
//! type at all: the protocol defines no user-visible rejection for them,
//! so they surface as log-only warnings.

use thiserror::Error;

/// A rejected room operation.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RoomError {
    /// The joining client is already a member (raised by `join`).
    #[error("client is already a member of this room")]
    AlreadyMember,

    /// Password verification failed (raised by `join`).
    #[error("wrong room password")]
    WrongPassword,

    /// The room is at its member capacity (raised by `join`).
    #[error("room is full")]
    RoomFull,

    /// The joining client's id is on the ban list (raised by `join`).
    #[error("client is banned from this room")]
    Banned,

    /// The acting client is not the room owner (raised by `kick`, `ban`,
    /// `unban`).
    #[error("client is not the room owner")]
    NotOwner,

    /// The kick target is not a member (raised by `kick`).
    #[error("target client is not in the room")]
    NotMember,

    /// The ban target is already banned (raised by `ban`).
    #[error("target client is already banned")]
    AlreadyBanned,

    /// The unban target is not banned (raised by `unban`).
    #[error("target client is not banned")]
    NotBanned,
}

/// Failures of the actor plumbing itself.
///
/// These indicate the signaling actor has shut down, never a domain
/// rejection.
#[derive(Debug, Error)]
pub enum ActorError {
    /// The actor mailbox is closed.
    #[error("mailbox send failed: {0}")]
    MailboxSend(String),

    /// The actor dropped the response channel before answering.
    #[error("response channel closed: {0}")]
    ResponseClosed(String),
}
