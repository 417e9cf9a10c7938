use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("crypto error: {0}")]
    CryptoError(String),
}

impl From<rustcord_crypto::CryptoError> for ProtocolError {
    fn from(e: rustcord_crypto::CryptoError) -> Self {
        Self::CryptoError(e.to_string())
    }
}
