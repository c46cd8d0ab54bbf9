//! Hush production server.
//!
//! Wires the sans-IO core (`hush-core`) to real transport: axum for the
//! authentication endpoint and the WebSocket relay channel, tokio for the
//! runtime, system time and OS entropy for the rest.
//!
//! # What the server knows
//!
//! The auth hash, the (public) KDF salt, thread digests, and ciphertext.
//! Nothing else: no identities, no social graph, no keys, no plaintext. The
//! handlers in this crate are routing and bookkeeping around content they
//! cannot read.
//!
//! # Destructive path
//!
//! When the defense engine returns a wipe verdict, [`AppState::execute_wipe`]
//! runs it to completion before the triggering request is answered: a gate
//! flag turns away new work, both tables are cleared atomically, every
//! capability token dies, and every relay connection drops. In shutdown mode
//! the runtime then exits with status 1.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod api;
mod state;
mod ws;

use axum::{
    Router,
    routing::{any, get, post},
};
pub use state::AppState;

/// Build the service router over shared state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth", post(api::authenticate))
        .route("/auth/salt", get(api::get_salt))
        .route("/health", get(api::health))
        .route("/ws", any(ws::upgrade))
        .with_state(state)
}
