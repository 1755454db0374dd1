//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports from the [`secrecy`] crate. Use these for every sensitive
//! value in the workspace: the room password secret, password plaintexts
//! in flight, and any future credential material.
//!
//! `SecretString` and `SecretBox<T>` implement `Debug` with redaction, so
//! a struct that derives `Debug` while holding one of these cannot leak
//! the value through `{:?}` or a tracing field. Values are zeroized on
//! drop. Reading the inner value requires an explicit
//! [`ExposeSecret::expose_secret`] call at the use site.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct JoinRequest {
//!     room_id: String,
//!     password: SecretString,
//! }
//!
//! let req = JoinRequest {
//!     room_id: "ab12".to_string(),
//!     password: SecretString::from("hunter2"),
//! };
//!
//! // Redacted: the plaintext never reaches the log line.
//! let line = format!("{req:?}");
//! assert!(!line.contains("hunter2"));
//!
//! let plaintext: &str = req.password.expose_secret();
//! assert_eq!(plaintext, "hunter2");
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
