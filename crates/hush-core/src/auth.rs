//! Authentication gate.
//!
//! Two states per caller: locked, or unlocked-for-session (a capability
//! token has been issued). The gate holds only the SHA-256 auth hash — it
//! verifies passphrase *knowledge* and can decrypt nothing.
//!
//! Failure bookkeeping is deliberately not here: the HTTP layer forwards
//! failures to the [`crate::DefenseEngine`], matching the split in which the
//! gate is pure verification and the defense engine owns the shared mutable
//! state.

use std::time::Instant;

use hush_crypto::auth_hash_matches;
use thiserror::Error;

use crate::token::{IssuedToken, TokenRegistry};

/// Hash mismatch. Generic by design: the rejection carries nothing about how
/// the submission differed from the stored hash.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("authentication rejected")]
pub struct AuthRejected;

/// Verifies submitted passphrases and issues capability tokens.
pub struct AuthGate {
    stored_hash: [u8; 32],
    tokens: TokenRegistry,
}

impl AuthGate {
    /// Create a gate for a vault's stored auth hash.
    pub fn new(stored_hash: [u8; 32], tokens: TokenRegistry) -> Self {
        Self { stored_hash, tokens }
    }

    /// Authenticate a submitted passphrase.
    ///
    /// Normalizes, hashes, and compares in constant time with respect to the
    /// candidate hash. On a match, issues a short-lived capability token.
    ///
    /// # Errors
    ///
    /// [`AuthRejected`] on mismatch. The caller records the failure with the
    /// defense engine; this method does not.
    pub fn authenticate(
        &mut self,
        submitted_words: &str,
        now: Instant,
    ) -> Result<IssuedToken, AuthRejected> {
        if auth_hash_matches(submitted_words, &self.stored_hash) {
            Ok(self.tokens.issue(now))
        } else {
            Err(AuthRejected)
        }
    }

    /// Check a capability token presented at subscribe time.
    pub fn validate_token(&mut self, token: &str, now: Instant) -> bool {
        self.tokens.validate(token, now)
    }

    /// Invalidate every outstanding session (wipe path).
    pub fn revoke_all_tokens(&mut self) {
        self.tokens.revoke_all();
    }

    /// Drop tokens that expired before `now` (periodic housekeeping).
    pub fn sweep_expired_tokens(&mut self, now: Instant) {
        self.tokens.sweep_expired(now);
    }
}
