//! Bulk payload AES-256-GCM encryption/decryption
//!
//! Framed output (binary):
//! ```text
//! [12 bytes: random nonce][N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//!
//! The nonce is fresh and random per encryption and is never reused with
//! the same key; it travels in the clear ahead of the ciphertext.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

use crate::error::CryptoError;
use crate::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};

/// Encrypt a payload with AES-256-GCM under a fresh random nonce.
///
/// Returns `[12-byte nonce][ciphertext][16-byte tag]`.
pub fn encrypt_payload(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(key.into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::Format("payload encryption failed".into()))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Decrypt a framed payload produced by [`encrypt_payload`].
///
/// Fails with [`CryptoError::Authentication`] on a bad tag, wrong key, or
/// truncated input; never returns unauthenticated plaintext.
pub fn decrypt_payload(key: &[u8; KEY_SIZE], framed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if framed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::Authentication);
    }

    let (nonce_bytes, ciphertext) = framed.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);
    let cipher = Aes256Gcm::new(key.into());

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::Authentication)
}

/// XOR "encryption" kept from an early demo of the original system.
///
/// Provides no integrity protection and leaks plaintext structure. No
/// production path selects it; it exists so the design-policy tests can
/// state explicitly that unauthenticated modes stay out of the pipeline.
#[deprecated(note = "demonstration only: unauthenticated, never use in production paths")]
pub fn xor_demo(key: &[u8], data: &[u8]) -> Vec<u8> {
    data.iter()
        .enumerate()
        .map(|(i, b)| b ^ key[i % key.len()])
        .collect()
}
