//! Actor system for the signaling relay.
//!
//! A single `SignalingActor` owns every client and room. Transport tasks
//! talk to it through a cloneable [`controller::SignalingActorHandle`];
//! replies flow back over per-client unbounded channels held inside the
//! actor state.

pub mod controller;
pub mod messages;

pub use controller::{SignalingActor, SignalingActorHandle, SignalingSettings};
pub use messages::{ControllerStatus, DisconnectReason, SignalingMessage};
