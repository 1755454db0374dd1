//! Domain state owned by the signaling actor: clients, rooms and calls.

pub mod call;
pub mod client;
pub mod password;
pub mod registry;
pub mod room;
