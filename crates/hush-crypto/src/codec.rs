//! Message encryption using AES-256-GCM.
//!
//! Messages are encrypted under the thread key, never the vault key. The
//! 96-bit nonce is drawn from the OS CSPRNG inside [`encrypt`] on every call,
//! so nonce freshness is enforced by construction — there is no API through
//! which a caller could supply (and accidentally reuse) a nonce.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};

use crate::{error::DecryptError, thread::ThreadKey};

/// AES-GCM nonce length in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag length in bytes (128 bits).
pub const AES_GCM_TAG_LEN: usize = 16;

/// An encrypted message as stored and relayed: ciphertext plus IV.
///
/// The authentication tag is appended to the ciphertext. Same plaintext under
/// the same key yields a different blob on every call. Opaque to the server;
/// never mutated after production.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBlob {
    /// Ciphertext including the 16-byte GCM tag.
    pub ciphertext: Vec<u8>,
    /// The 12-byte nonce used for this encryption.
    pub iv: [u8; NONCE_LEN],
}

impl EncryptedBlob {
    /// Plaintext length (ciphertext length minus authentication tag).
    pub fn plaintext_len(&self) -> usize {
        self.ciphertext.len().saturating_sub(AES_GCM_TAG_LEN)
    }
}

/// Encrypt a plaintext under a thread key with a fresh random nonce.
///
/// Never logs or retains plaintext or key material.
pub fn encrypt(thread_key: &ThreadKey, plaintext: &[u8]) -> EncryptedBlob {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(thread_key.as_bytes()));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let Ok(ciphertext) = cipher.encrypt(&nonce, plaintext) else {
        unreachable!("AES-GCM encryption cannot fail with valid key and nonce");
    };

    EncryptedBlob { ciphertext, iv: nonce.into() }
}

/// Decrypt a blob under a thread key.
///
/// Fails closed: a wrong key, a tampered ciphertext, a tampered IV, and a
/// truncated blob all return the same [`DecryptError`] value, with identical
/// shape and message. Callers render every failure as "message unreadable"
/// and nothing more.
///
/// # Errors
///
/// Returns [`DecryptError`] on any failure, with no further detail.
pub fn decrypt(thread_key: &ThreadKey, blob: &EncryptedBlob) -> Result<Vec<u8>, DecryptError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(thread_key.as_bytes()));
    let nonce = Nonce::from_slice(&blob.iv);

    cipher.decrypt(nonce, blob.ciphertext.as_slice()).map_err(|_| DecryptError)
}
