pub mod error;
pub mod frame;
pub mod kdf;

pub use error::CryptoError;
pub use frame::{decrypt_frame, encrypt_frame};
pub use kdf::{KeyDeriver, SymmetricKey};
