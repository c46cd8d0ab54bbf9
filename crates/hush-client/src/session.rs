//! Vault session and identity.

use std::collections::HashMap;

use hush_crypto::{
    EncryptedBlob, ThreadId, ThreadKey, VaultKey, decrypt, derive_vault_key, encrypt,
    normalize_words, thread_id, thread_key,
};
use hush_proto::{ClientFrame, decode_blob, encode_blob};
use thiserror::Error;
use uuid::Uuid;
use zeroize::Zeroize;

/// Errors from session operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Structurally malformed derivation input (bad salt shape).
    #[error(transparent)]
    Derivation(#[from] hush_crypto::DerivationError),

    /// A thread with oneself is undefined; pick a peer.
    #[error("cannot open a thread with your own identity")]
    SelfThread,

    /// A received message could not be read with the current key.
    ///
    /// One variant for every cause — wrong key, tampered blob, malformed
    /// wire encoding. Rendered identically regardless of root cause.
    #[error("message unreadable")]
    Unreadable,
}

/// A self-asserted participant identifier.
///
/// UUID-shaped and generated client-side. The server never validates it,
/// never sees it in the clear, and enforces no uniqueness; it is exchanged
/// out-of-band between people who intend to talk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    /// Generate a fresh random identity.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Adopt an identifier chosen elsewhere (e.g. restored from the
    /// client's local profile).
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    /// The identifier string as shared out-of-band.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An unlocked vault.
///
/// Owns the vault key and a per-peer thread key cache for the lifetime of
/// the session. Both zeroize when the session is locked or dropped.
pub struct VaultSession {
    identity: Identity,
    vault_key: VaultKey,
    thread_keys: HashMap<String, ThreadKey>,
}

impl VaultSession {
    /// Unlock the vault with the 12 words and the deployment's KDF salt.
    ///
    /// Runs the full-cost Argon2id derivation, so this takes hundreds of
    /// milliseconds by design. Wrong words succeed here and simply produce a
    /// session that cannot read anything — unlocking is not an oracle.
    ///
    /// # Errors
    ///
    /// Only [`SessionError::Derivation`] for a malformed salt.
    pub fn unlock(
        identity: Identity,
        words: &str,
        kdf_salt: &[u8],
    ) -> Result<Self, SessionError> {
        let mut normalized = normalize_words(words);
        let vault_key = derive_vault_key(&normalized, kdf_salt)?;
        normalized.zeroize();

        Ok(Self { identity, vault_key, thread_keys: HashMap::new() })
    }

    /// This session's identity.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The thread identifier shared with a peer.
    ///
    /// # Errors
    ///
    /// [`SessionError::SelfThread`] if `peer` is this session's own identity.
    pub fn thread_with(&self, peer: &str) -> Result<ThreadId, SessionError> {
        if peer == self.identity.as_str() {
            return Err(SessionError::SelfThread);
        }
        Ok(thread_id(self.identity.as_str(), peer))
    }

    /// Encrypt a message for a peer.
    ///
    /// # Errors
    ///
    /// [`SessionError::SelfThread`] if `peer` is this session's own identity.
    pub fn encrypt_to(
        &mut self,
        peer: &str,
        plaintext: &[u8],
    ) -> Result<(ThreadId, EncryptedBlob), SessionError> {
        let id = self.thread_with(peer)?;
        let key = self.key_for(peer);
        Ok((id, encrypt(key, plaintext)))
    }

    /// Decrypt a message received on a peer's thread.
    ///
    /// # Errors
    ///
    /// [`SessionError::SelfThread`] for a self-peer;
    /// [`SessionError::Unreadable`] for everything that fails after that.
    pub fn decrypt_from(
        &mut self,
        peer: &str,
        blob: &EncryptedBlob,
    ) -> Result<Vec<u8>, SessionError> {
        if peer == self.identity.as_str() {
            return Err(SessionError::SelfThread);
        }
        let key = self.key_for(peer);
        decrypt(key, blob).map_err(|_| SessionError::Unreadable)
    }

    /// Encrypt a message and package it as a relay frame.
    ///
    /// # Errors
    ///
    /// [`SessionError::SelfThread`] if `peer` is this session's own identity.
    pub fn seal(&mut self, peer: &str, plaintext: &[u8]) -> Result<ClientFrame, SessionError> {
        let (id, blob) = self.encrypt_to(peer, plaintext)?;
        let (ciphertext, iv) = encode_blob(&blob.ciphertext, &blob.iv);
        Ok(ClientFrame::Message { thread_id: id.to_hex(), ciphertext, iv })
    }

    /// Decode and decrypt a wire blob received on a peer's thread.
    ///
    /// Malformed base64, a wrong-length IV, and a failed decryption all
    /// collapse into [`SessionError::Unreadable`] — the renderer shows one
    /// "unreadable message" state and nothing more specific.
    ///
    /// # Errors
    ///
    /// [`SessionError::SelfThread`] or [`SessionError::Unreadable`].
    pub fn open(
        &mut self,
        peer: &str,
        ciphertext_b64: &str,
        iv_b64: &str,
    ) -> Result<Vec<u8>, SessionError> {
        let (ciphertext, iv) =
            decode_blob(ciphertext_b64, iv_b64).map_err(|_| SessionError::Unreadable)?;
        self.decrypt_from(peer, &EncryptedBlob { ciphertext, iv })
    }

    /// End the session, zeroizing the vault key and every cached thread key.
    ///
    /// Dropping the session has the same effect; `lock` exists so callers
    /// can end a session at a deliberate point rather than at scope end.
    pub fn lock(mut self) {
        self.thread_keys.clear();
        // vault_key zeroizes on drop
    }

    fn key_for(&mut self, peer: &str) -> &ThreadKey {
        let vault_key = &self.vault_key;
        let own_id = self.identity.as_str();
        self.thread_keys
            .entry(peer.to_string())
            .or_insert_with(|| thread_key(vault_key, own_id, peer))
    }
}

impl std::fmt::Debug for VaultSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSession")
            .field("identity", &self.identity)
            .field("cached_threads", &self.thread_keys.len())
            .finish_non_exhaustive()
    }
}
