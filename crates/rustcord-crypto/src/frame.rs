use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;

use crate::error::CryptoError;
use crate::kdf::SymmetricKey;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Length of the IV prefix on every frame.
pub const IV_LEN: usize = 16;

const BLOCK_LEN: usize = 16;

/// Encrypt `plaintext` into a base64 wire frame.
///
/// Wire layout before base64: `[16-byte IV || AES-256-CBC ciphertext]`.
/// A fresh random IV is drawn on every call.
///
/// There is no authentication tag: frames are confidential but not
/// tamper-evident.
pub fn encrypt_frame(plaintext: &str, key: &SymmetricKey) -> Result<String, CryptoError> {
    let sealed = seal(plaintext.as_bytes(), key)?;
    Ok(BASE64.encode(sealed))
}

/// Decrypt a base64 wire frame produced by [`encrypt_frame`].
///
/// A wrong key is indistinguishable from a corrupted frame: both surface as
/// a padding or UTF-8 failure.
pub fn decrypt_frame(frame: &str, key: &SymmetricKey) -> Result<String, CryptoError> {
    let data = BASE64
        .decode(frame)
        .map_err(|e| CryptoError::DecryptionError(format!("invalid base64: {e}")))?;
    let plaintext = open(&data, key)?;
    String::from_utf8(plaintext)
        .map_err(|e| CryptoError::DecryptionError(format!("plaintext is not UTF-8: {e}")))
}

/// Encrypt raw bytes, returning `[IV || ciphertext]`.
pub fn seal(plaintext: &[u8], key: &SymmetricKey) -> Result<Vec<u8>, CryptoError> {
    let mut iv = [0u8; IV_LEN];
    rand::rngs::OsRng.fill_bytes(&mut iv);
    seal_with_iv(plaintext, key, &iv)
}

fn seal_with_iv(
    plaintext: &[u8],
    key: &SymmetricKey,
    iv: &[u8; IV_LEN],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256CbcEnc::new_from_slices(key.as_bytes(), iv)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    // Prepend IV to ciphertext
    let mut output = Vec::with_capacity(IV_LEN + ciphertext.len());
    output.extend_from_slice(iv);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// Decrypt `[IV || ciphertext]` bytes produced by [`seal`].
pub fn open(data: &[u8], key: &SymmetricKey) -> Result<Vec<u8>, CryptoError> {
    if data.len() < IV_LEN {
        return Err(CryptoError::DecryptionError(format!(
            "frame is {} bytes, shorter than the {IV_LEN}-byte IV",
            data.len()
        )));
    }

    let (iv, ciphertext) = data.split_at(IV_LEN);
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(CryptoError::DecryptionError(format!(
            "ciphertext length {} is not a positive multiple of {BLOCK_LEN}",
            ciphertext.len()
        )));
    }

    let cipher = Aes256CbcDec::new_from_slices(key.as_bytes(), iv)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|e| CryptoError::DecryptionError(e.to_string()))
}
