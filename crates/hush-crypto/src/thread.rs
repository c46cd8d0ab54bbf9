//! Thread identifiers and per-thread key derivation.
//!
//! A thread is a pairwise conversation. Both the identifier and the key are
//! deterministic functions of the *unordered* participant pair: the two ids
//! are sorted by lexicographic byte order before hashing, so either side
//! computes identical values independently, with no coordination and no
//! server round trip.
//!
//! The server stores ciphertext against the [`ThreadId`] digest and cannot
//! invert it to recover the participants.
//!
//! # Precondition
//!
//! `id_a == id_b` (a self-thread) is undefined by design. Callers reject it
//! before reaching this module; see `hush-client`.

use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::vault::VaultKey;

/// HKDF info string binding thread keys to this protocol version.
///
/// Changing this constant re-keys every thread in every vault.
pub const THREAD_KEY_INFO: &[u8] = b"hush/thread-key/v1";

/// Delimiter between the sorted participant ids in the pair digest.
const PAIR_DELIMITER: &str = ":";

/// Opaque, order-independent identifier for a pairwise thread.
///
/// SHA-256 of the two participant ids sorted lexicographically and joined
/// with `":"`. Rendered as 64 lowercase hex characters on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId([u8; 32]);

impl ThreadId {
    /// Borrow the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering (64 chars), the wire and storage form.
    pub fn to_hex(&self) -> String {
        use std::fmt::Write as _;

        let mut out = String::with_capacity(64);
        for byte in self.0 {
            let _ = write!(out, "{byte:02x}");
        }
        out
    }

    /// Parse the 64-char hex wire form.
    ///
    /// Returns `None` for anything that is not exactly 64 hex characters.
    /// This is a shape check only — any well-formed digest is accepted, since
    /// the server cannot (and must not) validate which pair it names.
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 64 {
            return None;
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in hex.as_bytes().chunks_exact(2).enumerate() {
            let hi = (chunk[0] as char).to_digit(16)?;
            let lo = (chunk[1] as char).to_digit(16)?;
            bytes[i] = ((hi << 4) | lo) as u8;
        }
        Some(Self(bytes))
    }
}

impl std::fmt::Debug for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ThreadId({})", self.to_hex())
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A 256-bit per-thread encryption key.
///
/// Unique per unordered participant pair; compromising one thread key exposes
/// no other thread. Zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ThreadKey([u8; 32]);

impl ThreadKey {
    /// Borrow the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for ThreadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ThreadKey(..)")
    }
}

/// SHA-256 over the sorted, delimiter-joined pair.
///
/// Shared by [`thread_id`] (used directly) and [`thread_key`] (used as the
/// HKDF salt), producing a consistent (id, key) binding.
fn pair_digest(id_a: &str, id_b: &str) -> [u8; 32] {
    let (first, second) = if id_a.as_bytes() <= id_b.as_bytes() {
        (id_a, id_b)
    } else {
        (id_b, id_a)
    };

    let mut hasher = Sha256::new();
    hasher.update(first.as_bytes());
    hasher.update(PAIR_DELIMITER.as_bytes());
    hasher.update(second.as_bytes());
    hasher.finalize().into()
}

/// Compute the thread identifier for a participant pair.
///
/// Symmetric: `thread_id(a, b) == thread_id(b, a)`.
pub fn thread_id(id_a: &str, id_b: &str) -> ThreadId {
    ThreadId(pair_digest(id_a, id_b))
}

/// Derive the thread key for a participant pair from the vault key.
///
/// Single-step HKDF-SHA256 extract-then-expand: IKM is the vault key, the
/// salt is the pair digest, the info string is [`THREAD_KEY_INFO`], output is
/// exactly 32 bytes. Symmetric in the two ids, deterministic for a given
/// vault key.
pub fn thread_key(vault_key: &VaultKey, id_a: &str, id_b: &str) -> ThreadKey {
    let salt = pair_digest(id_a, id_b);
    let hkdf = Hkdf::<Sha256>::new(Some(&salt), vault_key.as_bytes());

    let mut key = [0u8; 32];
    let Ok(()) = hkdf.expand(THREAD_KEY_INFO, &mut key) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };

    ThreadKey(key)
}
