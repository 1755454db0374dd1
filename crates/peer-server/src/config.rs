//! Peer server configuration.
//!
//! Configuration is loaded from environment variables. All sensitive
//! fields are redacted in Debug output.

use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default bind address for the WebSocket, health and metrics endpoints.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:9000";

/// Default number of random bytes per generated room id.
pub const DEFAULT_ROOM_ID_BYTES: usize = 32;

/// Default member capacity per room.
pub const DEFAULT_ROOM_MAX_CLIENTS: usize = 40;

/// Peer server configuration.
///
/// Loaded from environment variables with sensible defaults. The room
/// secret is the only required variable.
#[derive(Clone)]
pub struct Config {
    /// HMAC key for room password digests (base64-encoded, decodes to at
    /// least 32 bytes). Protected by `SecretString` to prevent
    /// accidental logging.
    pub room_secret: SecretString,

    /// Listener bind address (default: "0.0.0.0:9000").
    pub bind_address: String,

    /// Random bytes per generated room id (default: 32).
    pub room_id_bytes: usize,

    /// Member capacity per room (default: 40).
    pub room_max_clients: usize,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("room_secret", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("room_id_bytes", &self.room_id_bytes)
            .field("room_max_clients", &self.room_max_clients)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let room_secret = SecretString::from(
            vars.get("PS_ROOM_SECRET")
                .ok_or_else(|| ConfigError::MissingEnvVar("PS_ROOM_SECRET".to_string()))?
                .clone(),
        );

        let bind_address = vars
            .get("PS_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let room_id_bytes = parse_var(vars, "PS_ROOM_ID_BYTES", DEFAULT_ROOM_ID_BYTES)?;
        if room_id_bytes == 0 {
            return Err(ConfigError::InvalidValue(
                "PS_ROOM_ID_BYTES must be at least 1".to_string(),
            ));
        }

        let room_max_clients = parse_var(vars, "PS_ROOM_MAX_CLIENTS", DEFAULT_ROOM_MAX_CLIENTS)?;
        if room_max_clients == 0 {
            return Err(ConfigError::InvalidValue(
                "PS_ROOM_MAX_CLIENTS must be at least 1".to_string(),
            ));
        }

        Ok(Config {
            room_secret,
            bind_address,
            room_id_bytes,
            room_max_clients,
        })
    }
}

/// Parse a numeric variable, defaulting when absent. A set-but-unparsable
/// value is a startup error, not a silent fallback.
fn parse_var(
    vars: &HashMap<String, String>,
    name: &str,
    default: usize,
) -> Result<usize, ConfigError> {
    match vars.get(name) {
        Some(raw) => raw.parse().map_err(|_| {
            ConfigError::InvalidValue(format!("{name} must be an unsigned integer, got {raw:?}"))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::secret::ExposeSecret;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([(
            "PS_ROOM_SECRET".to_string(),
            "dGVzdC1zZWNyZXQtdGhhdC1pcy1sb25nLWVub3VnaC0xMjM0NTY=".to_string(),
        )])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(
            config.room_secret.expose_secret(),
            "dGVzdC1zZWNyZXQtdGhhdC1pcy1sb25nLWVub3VnaC0xMjM0NTY="
        );
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.room_id_bytes, DEFAULT_ROOM_ID_BYTES);
        assert_eq!(config.room_max_clients, DEFAULT_ROOM_MAX_CLIENTS);
    }

    #[test]
    fn test_from_vars_missing_secret() {
        let result = Config::from_vars(&HashMap::new());
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(var)) if var == "PS_ROOM_SECRET"));
    }

    #[test]
    fn test_from_vars_overrides() {
        let mut vars = base_vars();
        vars.insert("PS_BIND_ADDRESS".to_string(), "127.0.0.1:9999".to_string());
        vars.insert("PS_ROOM_ID_BYTES".to_string(), "16".to_string());
        vars.insert("PS_ROOM_MAX_CLIENTS".to_string(), "8".to_string());

        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:9999");
        assert_eq!(config.room_id_bytes, 16);
        assert_eq!(config.room_max_clients, 8);
    }

    #[test]
    fn test_from_vars_rejects_non_numeric_values() {
        for (name, value) in [
            ("PS_ROOM_ID_BYTES", "thirty-two"),
            ("PS_ROOM_MAX_CLIENTS", "40x"),
        ] {
            let mut vars = base_vars();
            vars.insert(name.to_string(), value.to_string());
            assert!(
                matches!(
                    Config::from_vars(&vars),
                    Err(ConfigError::InvalidValue(msg)) if msg.contains(name)
                ),
                "{name}={value} should fail startup"
            );
        }
    }

    #[test]
    fn test_from_vars_rejects_zero_capacity() {
        let mut vars = base_vars();
        vars.insert("PS_ROOM_MAX_CLIENTS".to_string(), "0".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = Config::from_vars(&base_vars()).unwrap();
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("dGVzdC1zZWNyZXQ"));
    }
}
