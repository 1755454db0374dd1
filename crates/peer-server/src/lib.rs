//! Peer Server Library
//!
//! This library provides the core functionality for the Peer Server - a
//! stateful WebSocket signaling relay for browser WebRTC peers:
//!
//! - Room lifecycle: creation, membership, ownership succession
//! - Access control: passwords, kicks, bans and unbans
//! - Full-mesh call brokering: one call per member pair, SDP and ICE relay
//! - Graceful shutdown via a root cancellation token
//!
//! # Architecture
//!
//! A single actor owns all mutable state:
//!
//! ```text
//! SignalingActor (singleton)
//! ├── Registry<Client>   connected clients and their outbound channels
//! └── Registry<Room>     rooms, each owning its members' calls
//! ```
//!
//! Transport tasks (one per WebSocket) decode requests and forward them
//! through the actor handle; events flow back over per-client unbounded
//! channels, so the actor never blocks on a slow socket.
//!
//! # Modules
//!
//! - [`actors`] - The signaling actor and its mailbox protocol
//! - [`core`] - Domain state: clients, rooms, calls, password digests
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error types for domain rejections and actor plumbing
//! - [`observability`] - Health probes and Prometheus metrics
//! - [`transport`] - The WebSocket endpoint
//! - [`wire`] - JSON request and event formats

pub mod actors;
pub mod config;
pub mod core;
pub mod errors;
pub mod observability;
pub mod transport;
pub mod wire;
