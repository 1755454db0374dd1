//! Keyed room-password hashing.
//!
//! Digests are `HMAC-SHA256(server_secret, plaintext)`, hex-encoded. The
//! secret is held only by the server process, so a leaked room id and
//! digest do not allow offline password recovery. Verification goes
//! through [`ring::hmac::verify`], which recomputes the tag and compares
//! in constant time with respect to the candidate password.

use ring::hmac;

/// An opaque room password digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordDigest(String);

impl PasswordDigest {
    /// Hex representation, for diagnostics only.
    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

/// Keyed password hashing capability.
pub struct PasswordHasher {
    secret: Vec<u8>,
}

impl PasswordHasher {
    /// Create a hasher from the server-held secret.
    ///
    /// # Panics
    ///
    /// Panics if the secret is shorter than 32 bytes. Startup validates the
    /// configured secret before this point.
    #[must_use]
    pub fn new(secret: Vec<u8>) -> Self {
        assert!(secret.len() >= 32, "password secret must be at least 32 bytes");
        Self { secret }
    }

    /// Compute the digest of a plaintext password.
    #[must_use]
    pub fn digest(&self, plaintext: &str) -> PasswordDigest {
        let key = hmac::Key::new(hmac::HMAC_SHA256, &self.secret);
        let tag = hmac::sign(&key, plaintext.as_bytes());
        PasswordDigest(hex::encode(tag.as_ref()))
    }

    /// Check a candidate password against a stored digest, in constant
    /// time with respect to where the mismatch occurs.
    #[must_use]
    pub fn verify(&self, digest: &PasswordDigest, candidate: &str) -> bool {
        let key = hmac::Key::new(hmac::HMAC_SHA256, &self.secret);
        let Ok(expected) = hex::decode(&digest.0) else {
            return false;
        };
        hmac::verify(&key, candidate.as_bytes(), &expected).is_ok()
    }
}
