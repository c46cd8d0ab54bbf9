//! hush-server binary: configuration, logging, and the serve loop.

use std::{net::SocketAddr, process::ExitCode};

use clap::Parser;
use hush_core::{ConfigError, FailureMode, PolicyConfig, ServerConfig};
use hush_server::{AppState, router};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Sealed relay server for end-to-end encrypted threads.
///
/// Secrets and policy come from the environment so they never appear in
/// process listings; only operational knobs are ordinary flags.
#[derive(Parser, Debug)]
#[command(name = "hush-server", version)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8787")]
    bind: SocketAddr,

    /// Log filter, tracing `EnvFilter` syntax.
    #[arg(long, env = "HUSH_LOG", default_value = "info")]
    log: String,

    /// Hex-encoded SHA-256 auth hash of the vault passphrase.
    #[arg(long, env = "HUSH_AUTH_HASH")]
    auth_hash: String,

    /// Hex-encoded KDF salt (decodes to 16..=32 bytes).
    #[arg(long, env = "HUSH_KDF_SALT")]
    kdf_salt: String,

    /// Failed attempts an origin may accumulate before the mode fires.
    #[arg(long, env = "HUSH_MAX_AUTH_FAILURES", default_value_t = 5)]
    max_auth_failures: u32,

    /// Threshold response: ip_temp, ip_perm, db_wipe, or db_wipe_shutdown.
    #[arg(long, env = "HUSH_FAILURE_MODE", default_value = "ip_temp")]
    failure_mode: String,

    /// Temporary block duration in minutes (ip_temp only).
    #[arg(long, env = "HUSH_IP_BLOCK_MINUTES", default_value_t = 60)]
    ip_block_minutes: u64,

    /// Treat any single failure as threshold crossed: wipe and terminate.
    #[arg(long, env = "HUSH_PANIC_MODE", default_value_t = false)]
    panic_mode: bool,

    /// Capability token lifetime in minutes.
    #[arg(long, env = "HUSH_TOKEN_TTL_MINUTES")]
    token_ttl_minutes: Option<u64>,

    /// Relay frame size cap in bytes.
    #[arg(long, env = "HUSH_MAX_FRAME_BYTES", default_value_t = hush_proto::DEFAULT_MAX_FRAME_BYTES)]
    max_frame_bytes: usize,
}

/// Fatal startup and serve errors.
#[derive(Error, Debug)]
enum ServerError {
    /// Configuration rejected at startup.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Bind or serve failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&args.log).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(args).await {
        Ok(code) => code,
        Err(error) => {
            tracing::error!(%error, "fatal");
            ExitCode::FAILURE
        },
    }
}

async fn run(args: Args) -> Result<ExitCode, ServerError> {
    let mode: FailureMode = args.failure_mode.parse()?;
    let policy = PolicyConfig {
        max_failures: args.max_auth_failures,
        mode,
        block_minutes: args.ip_block_minutes,
        panic_mode: args.panic_mode,
    };
    let config = ServerConfig::from_parts(
        &args.auth_hash,
        &args.kdf_salt,
        policy,
        args.token_ttl_minutes,
        args.max_frame_bytes,
    )?;

    if args.panic_mode {
        tracing::warn!("panic mode armed: any authentication failure wipes and terminates");
    }

    let state = AppState::new(config);
    let mut shutdown = state.shutdown_signal();
    let wiped = state.shutdown_signal();

    // Expired tokens are also dropped lazily on validation; the sweep keeps
    // the registry from accumulating entries nobody presents again. Rate
    // limit buckets idle for an hour are forgotten the same way.
    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            tick.tick().await;
            let now = std::time::Instant::now();
            sweeper.gate().lock().await.sweep_expired_tokens(now);
            sweeper
                .auth_limiter()
                .lock()
                .await
                .sweep_idle(std::time::Duration::from_secs(3600), now);
        }
    });

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    tracing::info!(addr = %args.bind, mode = ?mode, "listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = shutdown.changed() => {},
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("ctrl-c received, shutting down");
                },
            }
        })
        .await?;

    // A wipe-triggered shutdown reports failure status, matching the
    // deployment expectation that supervisors do not blindly restart it.
    if *wiped.borrow() {
        tracing::error!("terminated by defense policy");
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}
