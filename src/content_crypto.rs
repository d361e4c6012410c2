//! Authenticated encryption for user-entered text
//!
//! AES-256-GCM with a random 96-bit nonce prefixed to the ciphertext.
//! Every sensitive field goes through here before it reaches the store.

use aes_gcm::{aead::Aead, Aes256Gcm, KeyInit};
use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use rand::RngCore;

use crate::errors::{EatLockError, EatLockResult};

/// Size of the AES-GCM nonce prefixed to every ciphertext.
pub const NONCE_LEN: usize = 12;

/// Encrypt plaintext bytes, returning `nonce || ciphertext+tag`.
pub fn encrypt(plaintext: &[u8], key: &[u8; 32]) -> EatLockResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| EatLockError::crypto(format!("invalid encryption key: {e}")))?;

    let mut nonce = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(&nonce.into(), plaintext)
        .map_err(|_| EatLockError::encryption("encrypt"))?;

    let mut out = nonce.to_vec();
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt `nonce || ciphertext+tag` produced by [`encrypt`].
///
/// Fails if the input is too short to carry a nonce or if the
/// authentication tag does not verify.
pub fn decrypt(data: &[u8], key: &[u8; 32]) -> EatLockResult<Vec<u8>> {
    if data.len() < NONCE_LEN {
        return Err(EatLockError::encryption("decrypt: input shorter than nonce"));
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| EatLockError::crypto(format!("invalid encryption key: {e}")))?;

    let (nonce, ciphertext) = data.split_at(NONCE_LEN);
    cipher
        .decrypt(nonce.into(), ciphertext)
        .map_err(|_| EatLockError::encryption("decrypt"))
}

/// Encrypt a UTF-8 string.
pub fn encrypt_str(plaintext: &str, key: &[u8; 32]) -> EatLockResult<Vec<u8>> {
    encrypt(plaintext.as_bytes(), key)
}

/// Decrypt back into a UTF-8 string.
pub fn decrypt_str(data: &[u8], key: &[u8; 32]) -> EatLockResult<String> {
    let plaintext = decrypt(data, key)?;
    String::from_utf8(plaintext)
        .map_err(|_| EatLockError::encryption("decrypt: invalid utf-8 plaintext"))
}

/// Decode a base64-encoded 256-bit key.
pub fn decode_base64_key(encoded_key: &str) -> EatLockResult<[u8; 32]> {
    let decoded = B64
        .decode(encoded_key.trim())
        .map_err(|_| EatLockError::crypto("key is not valid base64"))?;
    if decoded.len() != 32 {
        return Err(EatLockError::crypto(format!(
            "invalid key length: expected 32 bytes, got {}",
            decoded.len()
        )));
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&decoded);
    Ok(key)
}
