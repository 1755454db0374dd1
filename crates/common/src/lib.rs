//! Shared utilities for the peer-server workspace.
//!
//! Currently this crate carries only the secret-handling wrappers used by
//! configuration and the room password hasher. It exists as a separate
//! workspace member so that future shared types (wire schemas, test
//! fixtures) have a home that does not depend on the service crate.

pub mod secret;
