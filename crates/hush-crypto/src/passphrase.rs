//! Passphrase normalization and the server-side auth hash.
//!
//! The normalized passphrase feeds two independent one-way functions: the
//! Argon2id vault key (client side, [`crate::derive_vault_key`]) and the
//! SHA-256 auth hash (server side, this module). The server path holds no
//! decryption power.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Canonicalize a passphrase before any cryptographic use.
///
/// Lowercases, trims, and joins the words with single spaces, so that any two
/// entries of the same 12 words produce byte-identical input to both hash
/// paths.
///
/// Deterministic: identical passphrase always yields the identical string.
pub fn normalize_words(words: &str) -> String {
    words.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// SHA-256 digest of the normalized passphrase.
///
/// This is the value the server stores and compares against. It reveals
/// nothing about the vault key: the key side goes through Argon2id with a
/// salt, this side does not.
pub fn auth_hash(words: &str) -> [u8; 32] {
    let normalized = normalize_words(words);
    let digest = Sha256::digest(normalized.as_bytes());
    digest.into()
}

/// Constant-time comparison of a submitted passphrase against a stored hash.
///
/// The comparison cost does not depend on where the candidate diverges from
/// the stored hash, closing the timing side channel on the auth path.
pub fn auth_hash_matches(submitted_words: &str, stored_hash: &[u8; 32]) -> bool {
    let candidate = auth_hash(submitted_words);
    bool::from(candidate.ct_eq(stored_hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases() {
        assert_eq!(normalize_words("Apple BANANA Cherry"), "apple banana cherry");
    }

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize_words("  apple   banana\tcherry  "), "apple banana cherry");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize_words("  Apple   Banana ");
        assert_eq!(normalize_words(&once), once);
    }

    #[test]
    fn equivalent_entries_hash_identically() {
        let a = auth_hash("apple banana cherry");
        let b = auth_hash("  APPLE  banana   Cherry ");
        assert_eq!(a, b);
    }

    #[test]
    fn different_words_hash_differently() {
        assert_ne!(auth_hash("apple banana"), auth_hash("apple cherry"));
    }

    #[test]
    fn matches_accepts_correct_words() {
        let stored = auth_hash("one two three four five six seven eight nine ten eleven twelve");
        assert!(auth_hash_matches(
            "One Two Three Four Five Six Seven Eight Nine Ten Eleven Twelve",
            &stored
        ));
    }

    #[test]
    fn matches_rejects_wrong_words() {
        let stored = auth_hash("one two three");
        assert!(!auth_hash_matches("one two four", &stored));
    }
}
