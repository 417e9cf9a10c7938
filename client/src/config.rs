use std::fmt;

use rustcord_crypto::kdf::{DEFAULT_PASSPHRASE, DEFAULT_SALT, MIN_ITERATIONS};
use rustcord_crypto::{CryptoError, KeyDeriver};
use thiserror::Error;

pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:8081";

pub const ENV_ENDPOINT: &str = "RUSTCORD_ENDPOINT";
pub const ENV_PASSPHRASE: &str = "RUSTCORD_PASSPHRASE";
pub const ENV_SALT: &str = "RUSTCORD_SALT";
pub const ENV_ITERATIONS: &str = "RUSTCORD_ITERATIONS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid endpoint {0:?}: expected a ws:// or wss:// url")]
    InvalidEndpoint(String),

    #[error("invalid iteration count: {0}")]
    InvalidIterations(String),
}

/// Connection and key-derivation settings for one client.
#[derive(Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    pub passphrase: String,
    pub salt: String,
    pub iterations: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            passphrase: DEFAULT_PASSPHRASE.to_string(),
            salt: String::from_utf8_lossy(DEFAULT_SALT).into_owned(),
            iterations: MIN_ITERATIONS,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint)
            .field("passphrase", &"[REDACTED]")
            .field("salt", &self.salt)
            .field("iterations", &self.iterations)
            .finish()
    }
}

impl ClientConfig {
    /// Load settings from the process environment, after reading `.env` if
    /// one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenv::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from `lookup`, falling back to defaults for anything
    /// unset or empty.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(endpoint) = get(ENV_ENDPOINT) {
            config.endpoint = endpoint.trim().to_string();
        }
        if let Some(passphrase) = get(ENV_PASSPHRASE) {
            config.passphrase = passphrase;
        }
        if let Some(salt) = get(ENV_SALT) {
            config.salt = salt;
        }
        if let Some(raw) = get(ENV_ITERATIONS) {
            config.iterations = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidIterations(format!("{raw:?} is not a number")))?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.endpoint.starts_with("ws://") || self.endpoint.starts_with("wss://")) {
            return Err(ConfigError::InvalidEndpoint(self.endpoint.clone()));
        }
        if self.iterations < MIN_ITERATIONS {
            return Err(ConfigError::InvalidIterations(format!(
                "{} is below the minimum of {MIN_ITERATIONS}",
                self.iterations
            )));
        }
        Ok(())
    }

    pub fn key_deriver(&self) -> Result<KeyDeriver, CryptoError> {
        KeyDeriver::new(self.salt.as_bytes(), self.iterations)
    }
}
