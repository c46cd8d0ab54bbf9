//! Error types for the key hierarchy and message codec.

use thiserror::Error;

/// Errors from vault key derivation.
///
/// Only structurally malformed *inputs* are errors. A wrong passphrase is not
/// detectable here and must not be: it derives a key that decrypts nothing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DerivationError {
    /// KDF salt length is outside the supported range.
    ///
    /// The salt is fixed at vault creation; a salt of the wrong shape means
    /// the caller loaded broken configuration, which must surface immediately
    /// rather than silently derive an unrelated key.
    #[error("kdf salt must be {min}..={max} bytes, got {got}")]
    SaltLength {
        /// Minimum accepted salt length in bytes
        min: usize,
        /// Maximum accepted salt length in bytes
        max: usize,
        /// Length of the salt that was provided
        got: usize,
    },
}

/// Opaque decryption failure.
///
/// Deliberately a single unit-like error: wrong key, flipped ciphertext byte,
/// flipped IV byte, and truncated input all produce this exact value. Giving
/// callers (and therefore attackers) any way to distinguish the root cause
/// would constitute a decryption oracle.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("decryption failed")]
pub struct DecryptError;
