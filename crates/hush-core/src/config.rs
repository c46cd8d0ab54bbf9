//! Server configuration.
//!
//! Everything here is fixed at process start: the vault's auth hash and KDF
//! salt come from deployment-time vault creation, and the defense policy is
//! chosen once. Nothing is hot-reloadable — in particular the Argon2id salt,
//! where any change means total data loss, and the policy, where a runtime
//! mutation path would be an attack surface.

use std::time::Duration;

use hush_crypto::{KDF_SALT_MAX_LEN, KDF_SALT_MIN_LEN};
use thiserror::Error;

use crate::{defense::PolicyConfig, ratelimit::RateLimitConfig};

/// Default capability token lifetime in minutes.
const DEFAULT_TOKEN_TTL_MINUTES: u64 = 30;

/// Upper bound on any minutes-valued setting (one leap year). Keeps the
/// `minutes * 60` second conversions and every `now + duration` deadline
/// far away from arithmetic overflow.
const MAX_MINUTES: u64 = 366 * 24 * 60;

/// Errors from configuration validation at startup.
///
/// All fatal: a process with broken security configuration must not serve.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `auth_hash` is not 64 hex characters (a SHA-256 digest).
    #[error("auth hash must be 64 hex characters")]
    AuthHashEncoding,

    /// `kdf_salt` is not valid hex.
    #[error("kdf salt must be hex-encoded")]
    KdfSaltEncoding,

    /// `kdf_salt` decodes to an unsupported length.
    #[error("kdf salt must decode to {min}..={max} bytes, got {got}")]
    KdfSaltLength {
        /// Minimum accepted length in bytes
        min: usize,
        /// Maximum accepted length in bytes
        max: usize,
        /// Decoded length provided
        got: usize,
    },

    /// `max_failures` must be at least 1.
    #[error("max failures must be at least 1")]
    MaxFailuresZero,

    /// `block_minutes` must be at least 1 when the mode is `ip_temp`.
    #[error("block minutes must be at least 1 for the ip_temp mode")]
    BlockMinutesZero,

    /// `block_minutes` exceeds the supported maximum.
    #[error("block minutes must be at most {max}")]
    BlockMinutesTooLarge {
        /// Largest accepted value in minutes
        max: u64,
    },

    /// `token_ttl_minutes` is zero or exceeds the supported maximum.
    #[error("token ttl must be 1..={max} minutes")]
    TokenTtlOutOfRange {
        /// Largest accepted value in minutes
        max: u64,
    },

    /// Unrecognized failure mode string.
    #[error("unknown failure mode: {0:?}")]
    UnknownFailureMode(String),
}

/// Validated server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// SHA-256 auth hash of the vault passphrase.
    pub auth_hash: [u8; 32],
    /// KDF salt bytes, served to clients for vault key derivation.
    pub kdf_salt: Vec<u8>,
    /// Capability token lifetime.
    pub token_ttl: Duration,
    /// Relay frame size cap in bytes.
    pub max_frame_bytes: usize,
    /// Defense policy.
    pub policy: PolicyConfig,
    /// Token bucket parameters for the authentication surface.
    pub auth_rate_limit: RateLimitConfig,
}

impl ServerConfig {
    /// Build and validate a configuration from its deployment-time inputs.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`]; callers treat these as fatal at startup.
    pub fn from_parts(
        auth_hash_hex: &str,
        kdf_salt_hex: &str,
        policy: PolicyConfig,
        token_ttl_minutes: Option<u64>,
        max_frame_bytes: usize,
    ) -> Result<Self, ConfigError> {
        let auth_hash = parse_auth_hash(auth_hash_hex)?;
        let kdf_salt = parse_kdf_salt(kdf_salt_hex)?;
        validate_policy(&policy)?;

        let ttl_minutes = token_ttl_minutes.unwrap_or(DEFAULT_TOKEN_TTL_MINUTES);
        if ttl_minutes == 0 || ttl_minutes > MAX_MINUTES {
            return Err(ConfigError::TokenTtlOutOfRange { max: MAX_MINUTES });
        }

        Ok(Self {
            auth_hash,
            kdf_salt,
            token_ttl: Duration::from_secs(ttl_minutes * 60),
            max_frame_bytes,
            policy,
            auth_rate_limit: RateLimitConfig::auth_default(),
        })
    }

    /// Hex form of the salt, as served on the auth surface.
    pub fn kdf_salt_hex(&self) -> String {
        hex::encode(&self.kdf_salt)
    }
}

fn parse_auth_hash(auth_hash_hex: &str) -> Result<[u8; 32], ConfigError> {
    let bytes = hex::decode(auth_hash_hex).map_err(|_| ConfigError::AuthHashEncoding)?;
    bytes.try_into().map_err(|_| ConfigError::AuthHashEncoding)
}

fn parse_kdf_salt(kdf_salt_hex: &str) -> Result<Vec<u8>, ConfigError> {
    let bytes = hex::decode(kdf_salt_hex).map_err(|_| ConfigError::KdfSaltEncoding)?;
    if bytes.len() < KDF_SALT_MIN_LEN || bytes.len() > KDF_SALT_MAX_LEN {
        return Err(ConfigError::KdfSaltLength {
            min: KDF_SALT_MIN_LEN,
            max: KDF_SALT_MAX_LEN,
            got: bytes.len(),
        });
    }
    Ok(bytes)
}

fn validate_policy(policy: &PolicyConfig) -> Result<(), ConfigError> {
    if policy.max_failures == 0 {
        return Err(ConfigError::MaxFailuresZero);
    }
    if matches!(policy.mode, crate::defense::FailureMode::IpTemp) {
        if policy.block_minutes == 0 {
            return Err(ConfigError::BlockMinutesZero);
        }
        if policy.block_minutes > MAX_MINUTES {
            return Err(ConfigError::BlockMinutesTooLarge { max: MAX_MINUTES });
        }
    }
    Ok(())
}
