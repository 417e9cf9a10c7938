use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot establish secure session: {0}")]
    KeyDerivation(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("session is not open")]
    NotOpen,
}

impl From<rustcord_protocol::ProtocolError> for SessionError {
    fn from(e: rustcord_protocol::ProtocolError) -> Self {
        Self::Protocol(e.to_string())
    }
}

impl From<rustcord_crypto::CryptoError> for SessionError {
    fn from(e: rustcord_crypto::CryptoError) -> Self {
        match e {
            rustcord_crypto::CryptoError::KeyDerivation(msg) => Self::KeyDerivation(msg),
            other => Self::Crypto(other.to_string()),
        }
    }
}
