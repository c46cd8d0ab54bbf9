//! Vault key derivation via Argon2id.
//!
//! The single most compatibility-critical code in the system: the parameter
//! set below is fixed for the lifetime of every deployed vault. Any drift
//! silently derives an unrelated key with no error signal, and every existing
//! ciphertext becomes unreadable.

use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::DerivationError;

/// Vault key length in bytes (256 bits).
pub const VAULT_KEY_LEN: usize = 32;

/// Minimum accepted KDF salt length in bytes.
pub const KDF_SALT_MIN_LEN: usize = 16;

/// Maximum accepted KDF salt length in bytes.
pub const KDF_SALT_MAX_LEN: usize = 32;

/// Argon2id memory cost in KiB (64 MiB).
const ARGON2_MEMORY_KIB: u32 = 64 * 1024;

/// Argon2id iteration count.
const ARGON2_ITERATIONS: u32 = 3;

/// Argon2id lane count.
const ARGON2_LANES: u32 = 2;

/// The 256-bit master key derived from the vault passphrase.
///
/// Exists only in the unlocking client's memory for the session. There is no
/// `Serialize` implementation and no accessor that copies the bytes out; the
/// buffer is zeroized when the key is dropped.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct VaultKey([u8; VAULT_KEY_LEN]);

impl VaultKey {
    /// Borrow the raw key bytes.
    ///
    /// Callers must not copy these into any buffer that outlives the session.
    pub fn as_bytes(&self) -> &[u8; VAULT_KEY_LEN] {
        &self.0
    }

    /// Wrap raw key bytes.
    ///
    /// The bytes become key material owned by the returned value; the caller
    /// must not retain another copy. Normal unlocking goes through
    /// [`derive_vault_key`]; this exists for tests and in-memory seams only —
    /// there is deliberately no persistence path.
    pub fn from_bytes(bytes: [u8; VAULT_KEY_LEN]) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material, even at debug level
        f.write_str("VaultKey(..)")
    }
}

/// Derive the vault key from a normalized passphrase and the vault's salt.
///
/// Pure and deterministic: identical inputs always produce byte-identical
/// keys. Intentionally CPU/memory-expensive (hundreds of milliseconds) as a
/// brute-force throttle; the cost must not be amortized or cached across
/// passphrase candidates.
///
/// A malformed or wrong *passphrase* is not an error — it derives a key that
/// cannot decrypt any existing blob, and distinguishing that case here would
/// create an oracle.
///
/// # Errors
///
/// Returns [`DerivationError::SaltLength`] if the salt is outside
/// `KDF_SALT_MIN_LEN..=KDF_SALT_MAX_LEN` bytes.
pub fn derive_vault_key(
    normalized_passphrase: &str,
    kdf_salt: &[u8],
) -> Result<VaultKey, DerivationError> {
    if kdf_salt.len() < KDF_SALT_MIN_LEN || kdf_salt.len() > KDF_SALT_MAX_LEN {
        return Err(DerivationError::SaltLength {
            min: KDF_SALT_MIN_LEN,
            max: KDF_SALT_MAX_LEN,
            got: kdf_salt.len(),
        });
    }

    let Ok(params) =
        Params::new(ARGON2_MEMORY_KIB, ARGON2_ITERATIONS, ARGON2_LANES, Some(VAULT_KEY_LEN))
    else {
        unreachable!("fixed Argon2id parameters are valid");
    };

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; VAULT_KEY_LEN];
    let Ok(()) = argon2.hash_password_into(normalized_passphrase.as_bytes(), kdf_salt, &mut key)
    else {
        unreachable!("salt length validated above; output length is fixed");
    };

    Ok(VaultKey(key))
}
