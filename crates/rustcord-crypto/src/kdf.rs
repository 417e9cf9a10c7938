use std::fmt;

use hmac::Hmac;
use sha2::Sha256;
use zeroize::ZeroizeOnDrop;

use crate::error::CryptoError;

/// Length of the derived AES-256 key in bytes.
pub const KEY_LEN: usize = 32;

/// Lowest PBKDF2 iteration count a [`KeyDeriver`] will accept.
pub const MIN_ITERATIONS: u32 = 100_000;

/// Salt shared out-of-band with the chat server.
pub const DEFAULT_SALT: &[u8] = b"rustchatserver2024_aes_secure";

/// Passphrase the chat server derives its own key from.
pub const DEFAULT_PASSPHRASE: &str = "rustchatserver2024_aes_secure";

/// Session key for AES-256-CBC frame encryption.
///
/// Derived once per authenticated session and never transmitted. The key
/// bytes are wiped when the value is dropped, which is how logout discards it.
#[derive(ZeroizeOnDrop)]
pub struct SymmetricKey {
    key: [u8; KEY_LEN],
}

impl SymmetricKey {
    /// Restore a key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Get the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}

/// PBKDF2-HMAC-SHA256 key deriver with a fixed salt and iteration count.
///
/// Derivation is deterministic: the same passphrase always yields the same
/// key, so both ends of the connection agree without exchanging anything.
#[derive(Debug, Clone)]
pub struct KeyDeriver {
    salt: Vec<u8>,
    iterations: u32,
}

impl Default for KeyDeriver {
    fn default() -> Self {
        Self {
            salt: DEFAULT_SALT.to_vec(),
            iterations: MIN_ITERATIONS,
        }
    }
}

impl KeyDeriver {
    /// Build a deriver with a custom salt and iteration count.
    ///
    /// Rejects iteration counts below [`MIN_ITERATIONS`].
    pub fn new(salt: impl Into<Vec<u8>>, iterations: u32) -> Result<Self, CryptoError> {
        if iterations < MIN_ITERATIONS {
            return Err(CryptoError::KeyDerivation(format!(
                "{iterations} iterations is below the minimum of {MIN_ITERATIONS}"
            )));
        }
        Ok(Self {
            salt: salt.into(),
            iterations,
        })
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Derive the 256-bit session key from `passphrase`.
    pub fn derive(&self, passphrase: &str) -> Result<SymmetricKey, CryptoError> {
        let key = pbkdf2_sha256(passphrase.as_bytes(), &self.salt, self.iterations)?;
        tracing::debug!(iterations = self.iterations, "derived session key");
        Ok(key)
    }
}

fn pbkdf2_sha256(password: &[u8], salt: &[u8], rounds: u32) -> Result<SymmetricKey, CryptoError> {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password, salt, rounds, &mut key)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(SymmetricKey { key })
}
