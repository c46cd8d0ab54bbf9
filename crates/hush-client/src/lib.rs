//! Hush client session.
//!
//! The only place key material lives. A [`VaultSession`] derives the vault
//! key at unlock, caches per-peer thread keys for the session, and zeroizes
//! everything on lock or drop. Nothing in this crate serializes a key: there
//! is no path, accidental or deliberate, from key material to disk or wire.
//!
//! The server's capability token is *not* held here — transport access and
//! decryption capability are separate by design, and this crate is the
//! decryption side.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod session;

pub use session::{Identity, SessionError, VaultSession};
