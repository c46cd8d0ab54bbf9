//! Hush Cryptographic Primitives
//!
//! Key hierarchy and message codec for the sealed vault. Pure functions with
//! deterministic outputs; the only nondeterminism is the per-message nonce,
//! which is drawn from the OS CSPRNG inside [`encrypt`] so that nonce
//! freshness holds by construction rather than by caller convention.
//!
//! # Key Lifecycle
//!
//! One shared 12-word passphrase roots all key material. The server never
//! sees anything below the first arrow:
//!
//! ```text
//! 12-word passphrase
//!        │  normalize (lowercase, single-spaced)
//!        ▼
//! Argon2id(passphrase, kdf_salt) → Vault Key (32 bytes, client memory only)
//!        │
//!        ▼
//! HKDF-SHA256(vault key, salt = H(sorted ids)) → Thread Key (per pair)
//!        │
//!        ▼
//! AES-256-GCM → Ciphertext + IV (opaque to the server)
//! ```
//!
//! Independently, the same normalized passphrase feeds a one-way SHA-256
//! [`auth_hash`] used server-side for an equality check. The two paths never
//! exchange key material: knowing the auth hash grants no decryption power.
//!
//! # Security
//!
//! Zero server knowledge:
//! - Thread identifiers are one-way digests of the participant pair; the
//!   server stores ciphertext against them without learning who talks to whom
//! - Vault and thread keys exist only in client memory and are zeroized on
//!   drop
//!
//! Brute-force bound:
//! - Argon2id parameters are fixed (64 MiB, 3 passes, lanes 2) and expensive
//!   by design; they must never drift, be cached across candidates, or be
//!   short-circuited
//!
//! Oracle avoidance:
//! - A wrong passphrase derives a key that simply decrypts nothing; it is not
//!   an error
//! - All decryption failures collapse into one opaque [`DecryptError`]

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod codec;
mod error;
mod passphrase;
mod thread;
mod vault;

pub use codec::{AES_GCM_TAG_LEN, EncryptedBlob, NONCE_LEN, decrypt, encrypt};
pub use error::{DecryptError, DerivationError};
pub use passphrase::{auth_hash, auth_hash_matches, normalize_words};
pub use thread::{THREAD_KEY_INFO, ThreadId, ThreadKey, thread_id, thread_key};
pub use vault::{
    KDF_SALT_MAX_LEN, KDF_SALT_MIN_LEN, VAULT_KEY_LEN, VaultKey, derive_vault_key,
};
