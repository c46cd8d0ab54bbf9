//! Capability tokens.
//!
//! A token is proof of passphrase knowledge and grants relay (socket) access
//! only. Holding one implies nothing about decryption capability: tokens are
//! random bytes with no relationship to any key material.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use rand::{RngCore, rngs::OsRng};

/// Raw token length in bytes before hex encoding.
const TOKEN_LEN: usize = 32;

/// A freshly issued capability token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// Hex-encoded token value handed to the client.
    pub token: String,
    /// Time until expiry.
    pub ttl: Duration,
}

/// Registry of live capability tokens.
///
/// Time is injected by the caller so expiry can be tested without sleeping.
/// `revoke_all` exists for the destructive path: after a wipe, every
/// previously issued token is dead and the connection pool drains.
#[derive(Debug)]
pub struct TokenRegistry {
    ttl: Duration,
    /// token → expiry instant
    live: HashMap<String, Instant>,
}

impl TokenRegistry {
    /// Create a registry issuing tokens with the given lifetime.
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, live: HashMap::new() }
    }

    /// Issue a new token valid from `now`.
    pub fn issue(&mut self, now: Instant) -> IssuedToken {
        let mut bytes = [0u8; TOKEN_LEN];
        OsRng.fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        self.live.insert(token.clone(), now + self.ttl);
        IssuedToken { token, ttl: self.ttl }
    }

    /// Check whether a token is live at `now`.
    ///
    /// Expired tokens are removed on the way out; an absent token and an
    /// expired token are indistinguishable to the caller.
    pub fn validate(&mut self, token: &str, now: Instant) -> bool {
        match self.live.get(token) {
            Some(expiry) if *expiry > now => true,
            Some(_) => {
                self.live.remove(token);
                false
            },
            None => false,
        }
    }

    /// Drop every live token.
    pub fn revoke_all(&mut self) {
        self.live.clear();
    }

    /// Remove tokens whose expiry has passed.
    pub fn sweep_expired(&mut self, now: Instant) {
        self.live.retain(|_, expiry| *expiry > now);
    }

    /// Number of live (not yet swept) tokens.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// True if no tokens are live.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
