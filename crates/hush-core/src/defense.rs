//! Defense policy engine.
//!
//! Tracks authentication failures per origin and enforces the deployment's
//! configured response mode. This module owns the only genuinely shared
//! mutable state in the core; the runtime serializes access with a single
//! lock, which also makes the destructive decision race-free.
//!
//! # Transition table
//!
//! | Condition | Verdict |
//! |---|---|
//! | panic mode, any failure | wipe + shutdown |
//! | count < threshold | retry allowed |
//! | threshold crossed, `ip_temp` | origin blocked until expiry, count reset |
//! | threshold crossed, `ip_perm` | origin blocked indefinitely |
//! | threshold crossed, `db_wipe` | wipe, keep serving |
//! | threshold crossed, `db_wipe_shutdown` | wipe, terminate |
//!
//! Destructive verdicts are single-winner: the first failure to cross the
//! threshold trips a one-shot flag and carries the verdict; every concurrent
//! or subsequent failure observes [`DefenseVerdict::AlreadyTripped`] and must
//! not re-execute the action.

use std::{
    collections::HashMap,
    str::FromStr,
    time::{Duration, Instant},
};

use crate::config::ConfigError;

/// Response mode applied when an origin crosses the failure threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Block the origin for a configured number of minutes, then forget it.
    IpTemp,
    /// Block the origin until the process is redeployed.
    IpPerm,
    /// Wipe every persisted ciphertext, reset state, keep serving.
    DbWipe,
    /// Wipe every persisted ciphertext and terminate the process.
    DbWipeShutdown,
}

impl FromStr for FailureMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ip_temp" => Ok(Self::IpTemp),
            "ip_perm" => Ok(Self::IpPerm),
            "db_wipe" => Ok(Self::DbWipe),
            "db_wipe_shutdown" => Ok(Self::DbWipeShutdown),
            other => Err(ConfigError::UnknownFailureMode(other.to_string())),
        }
    }
}

/// Deployment-time defense policy. Immutable once the process starts.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// Failures an origin is allowed before the mode fires. At least 1.
    pub max_failures: u32,
    /// What firing does.
    pub mode: FailureMode,
    /// Temporary block duration in minutes (`ip_temp` only).
    pub block_minutes: u64,
    /// Zero-threshold override: any single failure wipes and terminates.
    pub panic_mode: bool,
}

impl PolicyConfig {
    fn block_duration(&self) -> Duration {
        Duration::from_secs(self.block_minutes * 60)
    }
}

/// Per-origin failure bookkeeping.
///
/// Created on the first failure from an origin, destroyed on success or when
/// the policy fires for that origin.
#[derive(Debug, Clone, Copy)]
struct FailureRecord {
    count: u32,
    first_failure_at: Instant,
}

/// A standing block against an origin.
#[derive(Debug, Clone, Copy)]
enum BlockEntry {
    Until(Instant),
    Permanent,
}

/// Whether an origin may attempt authentication right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    /// Not blocked; the attempt may proceed to verification.
    Clear,
    /// Blocked. The response is content-free either way; `permanent` exists
    /// for logging only.
    Blocked {
        /// True for `ip_perm` blocks.
        permanent: bool,
    },
}

/// Outcome of recording one authentication failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "destructive verdicts must be executed"]
pub enum DefenseVerdict {
    /// Below threshold; allow further attempts.
    Retry {
        /// Attempts left before the mode fires.
        remaining: u32,
    },
    /// Threshold crossed with an IP mode; the engine now blocks the origin.
    OriginBlocked {
        /// True for `ip_perm`.
        permanent: bool,
    },
    /// Threshold crossed with a destructive mode (or panic). The caller must
    /// wipe all persisted ciphertext, and terminate if `shutdown` is set,
    /// before acknowledging the triggering request.
    Wipe {
        /// Terminate the process after the wipe completes.
        shutdown: bool,
    },
    /// A destructive verdict was already issued; the action is running or
    /// done. Do not execute it again.
    AlreadyTripped,
}

/// The failure-policy state machine.
///
/// Not internally synchronized: the runtime wraps the engine in one lock and
/// holds it across each decision, which is what makes a burst of N
/// simultaneous failures produce exactly one `Wipe` verdict.
pub struct DefenseEngine {
    config: PolicyConfig,
    failures: HashMap<String, FailureRecord>,
    blocked: HashMap<String, BlockEntry>,
    /// One-shot destructive trip. Set before the verdict is returned so no
    /// concurrent decision can win twice.
    tripped: bool,
}

impl DefenseEngine {
    /// Create an engine for a validated policy.
    pub fn new(config: PolicyConfig) -> Self {
        Self { config, failures: HashMap::new(), blocked: HashMap::new(), tripped: false }
    }

    /// The policy this engine enforces.
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Check whether an origin is currently blocked.
    ///
    /// Lapsed temporary blocks are removed here, so an origin that waited out
    /// its block window authenticates with a clean slate.
    pub fn check_blocked(&mut self, origin: &str, now: Instant) -> BlockStatus {
        match self.blocked.get(origin) {
            None => BlockStatus::Clear,
            Some(BlockEntry::Permanent) => BlockStatus::Blocked { permanent: true },
            Some(BlockEntry::Until(expiry)) => {
                if *expiry > now {
                    BlockStatus::Blocked { permanent: false }
                } else {
                    self.blocked.remove(origin);
                    BlockStatus::Clear
                }
            },
        }
    }

    /// Record an authentication failure from an origin and decide the
    /// response.
    pub fn on_failure(&mut self, origin: &str, now: Instant) -> DefenseVerdict {
        if self.tripped {
            return DefenseVerdict::AlreadyTripped;
        }

        if self.config.panic_mode {
            self.tripped = true;
            tracing::error!(origin, "panic mode: authentication failure triggers wipe");
            return DefenseVerdict::Wipe { shutdown: true };
        }

        let record = self
            .failures
            .entry(origin.to_string())
            .or_insert(FailureRecord { count: 0, first_failure_at: now });
        record.count += 1;
        let count = record.count;

        if count < self.config.max_failures {
            let remaining = self.config.max_failures - count;
            tracing::warn!(origin, remaining, "authentication failure");
            return DefenseVerdict::Retry { remaining };
        }

        // Threshold crossed: the origin's record is consumed by the action
        self.failures.remove(origin);

        match self.config.mode {
            FailureMode::IpTemp => {
                let until = now + self.config.block_duration();
                self.blocked.insert(origin.to_string(), BlockEntry::Until(until));
                tracing::warn!(origin, minutes = self.config.block_minutes, "origin blocked");
                DefenseVerdict::OriginBlocked { permanent: false }
            },
            FailureMode::IpPerm => {
                self.blocked.insert(origin.to_string(), BlockEntry::Permanent);
                tracing::warn!(origin, "origin blocked permanently");
                DefenseVerdict::OriginBlocked { permanent: true }
            },
            FailureMode::DbWipe => {
                self.tripped = true;
                tracing::error!(origin, "failure threshold crossed: wiping database");
                DefenseVerdict::Wipe { shutdown: false }
            },
            FailureMode::DbWipeShutdown => {
                self.tripped = true;
                tracing::error!(origin, "failure threshold crossed: wiping database and shutting down");
                DefenseVerdict::Wipe { shutdown: true }
            },
        }
    }

    /// Clear an origin's failure record after a successful authentication.
    pub fn on_success(&mut self, origin: &str) {
        self.failures.remove(origin);
    }

    /// Current failure count for an origin (0 if none recorded).
    pub fn failure_count(&self, origin: &str) -> u32 {
        self.failures.get(origin).map_or(0, |r| r.count)
    }

    /// When the origin's current failure streak began, if one is recorded.
    pub fn first_failure_at(&self, origin: &str) -> Option<Instant> {
        self.failures.get(origin).map(|r| r.first_failure_at)
    }

    /// Reset all state after a completed `db_wipe` (the continue-serving
    /// mode). Post-wipe, the process accepts fresh authentication attempts
    /// with no memory of pre-wipe origins.
    pub fn reset_after_wipe(&mut self) {
        self.failures.clear();
        self.blocked.clear();
        self.tripped = false;
    }
}
