//! Client-facing transport: the WebSocket endpoint.

pub mod ws;

pub use ws::ws_router;
