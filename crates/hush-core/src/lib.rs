//! Hush server core.
//!
//! Sans-IO building blocks for the relay server: every component here is
//! plain state plus methods, with time injected by the caller and no sockets,
//! no database handles, and no async beyond the channel senders the runtime
//! registers for fan-out. The production runtime (`hush-server`) wires these
//! to axum and tokio; tests drive them directly.
//!
//! # Components
//!
//! - [`AuthGate`]: constant-time passphrase check, capability token issuance
//! - [`TokenRegistry`]: short-lived socket-access tokens (no decryption power)
//! - [`DefenseEngine`]: per-origin failure tracking and the four response
//!   modes, including the irreversible ones
//! - [`RelayBroadcaster`]: blind fan-out of opaque ciphertext to thread
//!   subscribers
//! - [`Storage`]: persistence seam for the two opaque tables
//! - [`ServerConfig`]: deployment-time configuration, validated at startup
//!
//! # Zero server knowledge
//!
//! Nothing in this crate can decrypt anything. The auth gate compares a
//! SHA-256 digest; the relay routes on one-way thread identifiers; storage
//! holds ciphertext columns only. The single shared secret-derived key
//! hierarchy lives entirely client-side in `hush-crypto` / `hush-client`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod auth;
mod config;
mod defense;
mod ratelimit;
mod relay;
mod storage;
mod token;

pub use auth::{AuthGate, AuthRejected};
pub use config::{ConfigError, ServerConfig};
pub use defense::{BlockStatus, DefenseEngine, DefenseVerdict, FailureMode, PolicyConfig};
pub use ratelimit::{RateLimitConfig, RateLimiter};
pub use relay::{ConnectionId, RelayBroadcaster, RelayError};
pub use storage::{MemoryStorage, MessageRecord, Storage, StorageError, ThreadRecord};
pub use token::{IssuedToken, TokenRegistry};
