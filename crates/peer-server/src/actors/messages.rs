//! Messages accepted by the signaling actor.

use tokio::sync::{mpsc, oneshot};

use crate::core::client::ClientId;
use crate::wire::{ClientRequest, OutboundEvent};

/// Mailbox messages for [`crate::actors::controller::SignalingActor`].
#[derive(Debug)]
pub enum SignalingMessage {
    /// A transport session opened; the actor takes ownership of the
    /// client's outbound channel.
    Connect {
        client_id: ClientId,
        outbound: mpsc::UnboundedSender<OutboundEvent>,
    },

    /// A transport session closed, cleanly or otherwise. The actor removes
    /// the client from any room exactly as if it had asked to leave.
    Disconnect {
        client_id: ClientId,
        reason: DisconnectReason,
    },

    /// A decoded request from a connected client.
    Request {
        client_id: ClientId,
        request: ClientRequest,
    },

    /// Point-in-time counters, used by tests and readiness probes.
    Status {
        respond_to: oneshot::Sender<ControllerStatus>,
    },
}

/// Why a transport session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The peer sent a close frame.
    ClientClosed,
    /// The socket errored or went away without a close frame.
    TransportError,
}

impl DisconnectReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientClosed => "client_closed",
            Self::TransportError => "transport_error",
        }
    }
}

/// Snapshot of actor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerStatus {
    pub clients: usize,
    pub rooms: usize,
}
