//! Shared runtime state and the destructive-action executor.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use hush_core::{
    AuthGate, ConnectionId, DefenseEngine, MemoryStorage, RateLimiter, RelayBroadcaster,
    ServerConfig, Storage, TokenRegistry,
};
use tokio::sync::{Mutex, watch};

/// State shared by every handler. Cheap to clone; all clones share one
/// [`Shared`].
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Shared>,
}

struct Shared {
    config: ServerConfig,
    /// Token issuance and validation. Tokio mutex: held across handler logic
    /// in async context, never across the wipe.
    gate: Mutex<AuthGate>,
    /// The single lock serializing defense decisions. One guard per decision
    /// is what makes destructive verdicts single-winner.
    defense: Mutex<DefenseEngine>,
    /// Per-origin request throttle on the auth surface. Separate from the
    /// defense engine: this bounds volume before a passphrase is even looked
    /// at, right or wrong.
    auth_limiter: Mutex<RateLimiter>,
    relay: RelayBroadcaster<MemoryStorage>,
    /// Set for the duration of a wipe (and permanently in shutdown mode).
    /// Handlers check it first and turn new work away while it is up.
    wiping: AtomicBool,
    next_conn_id: AtomicU64,
    shutdown: watch::Sender<bool>,
}

impl AppState {
    /// Build runtime state from a validated configuration.
    pub fn new(config: ServerConfig) -> Self {
        let gate = AuthGate::new(config.auth_hash, TokenRegistry::new(config.token_ttl));
        let defense = DefenseEngine::new(config.policy.clone());
        let auth_limiter = RateLimiter::new(config.auth_rate_limit);
        let (shutdown, _) = watch::channel(false);

        Self {
            inner: Arc::new(Shared {
                config,
                gate: Mutex::new(gate),
                defense: Mutex::new(defense),
                auth_limiter: Mutex::new(auth_limiter),
                relay: RelayBroadcaster::new(MemoryStorage::new()),
                wiping: AtomicBool::new(false),
                next_conn_id: AtomicU64::new(1),
                shutdown,
            }),
        }
    }

    /// The process configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// The authentication gate.
    pub fn gate(&self) -> &Mutex<AuthGate> {
        &self.inner.gate
    }

    /// The defense engine lock.
    pub fn defense(&self) -> &Mutex<DefenseEngine> {
        &self.inner.defense
    }

    /// The auth-surface rate limiter.
    pub fn auth_limiter(&self) -> &Mutex<RateLimiter> {
        &self.inner.auth_limiter
    }

    /// The relay hub.
    pub fn relay(&self) -> &RelayBroadcaster<MemoryStorage> {
        &self.inner.relay
    }

    /// Whether a wipe is in progress (or the process is draining to exit).
    pub fn is_wiping(&self) -> bool {
        self.inner.wiping.load(Ordering::SeqCst)
    }

    /// Assign an id to a freshly accepted relay connection.
    pub fn next_connection_id(&self) -> ConnectionId {
        self.inner.next_conn_id.fetch_add(1, Ordering::Relaxed)
    }

    /// A receiver that resolves when the process should terminate.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.inner.shutdown.subscribe()
    }

    /// Execute a `Wipe` verdict to completion.
    ///
    /// Order matters: the gate flag goes up first so no new connection or
    /// authentication lands mid-wipe, then both tables are destroyed in one
    /// atomic storage operation, then every capability token and relay
    /// connection dies. Only after all of that does the caller acknowledge
    /// the request that tripped the policy.
    ///
    /// With `shutdown` set the gate flag stays up and the runtime is signaled
    /// to exit; otherwise the engine is reset and the process serves on with
    /// no memory of pre-wipe state.
    pub async fn execute_wipe(&self, shutdown: bool) {
        self.inner.wiping.store(true, Ordering::SeqCst);
        tracing::error!(shutdown, "executing defense wipe");

        if let Err(error) = self.inner.relay.storage().wipe_all() {
            // The store is compromised-by-assumption at this point; log and
            // continue tearing sessions down.
            tracing::error!(%error, "storage wipe failed");
        }

        self.inner.gate.lock().await.revoke_all_tokens();
        self.inner.relay.disconnect_all();

        if shutdown {
            tracing::error!("terminating after wipe");
            let _ = self.inner.shutdown.send(true);
        } else {
            self.inner.defense.lock().await.reset_after_wipe();
            self.inner.wiping.store(false, Ordering::SeqCst);
            tracing::info!("wipe complete, serving with fresh state");
        }
    }
}

/// Current wall-clock time in unix milliseconds, for persistence timestamps.
pub fn now_unix_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_millis() as u64)
}
