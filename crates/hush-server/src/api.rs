//! HTTP surface: `POST /auth`, `GET /auth/salt`, and `GET /health`.

use std::{convert::Infallible, net::SocketAddr, time::Instant};

use axum::{
    Json,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use hush_core::{BlockStatus, DefenseVerdict};
use hush_proto::{AuthRejection, AuthRequest, AuthResponse};

use crate::state::AppState;

/// The request origin used for failure accounting.
///
/// The first `X-Forwarded-For` entry when present (reverse-proxy
/// deployments), else the peer address. Falls back to a fixed marker when
/// neither exists so accounting still happens, just coarsely.
pub struct ClientIp(
    /// Resolved origin string.
    pub String,
);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Infallible> {
        if let Some(forwarded) = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
        {
            let first = forwarded.trim();
            if !first.is_empty() {
                return Ok(Self(first.to_string()));
            }
        }

        let origin = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map_or_else(|| "unknown".to_string(), |info| info.0.ip().to_string());
        Ok(Self(origin))
    }
}

/// `POST /auth`: verify the passphrase and issue a capability token.
///
/// Every failure path answers with the same content-free 401 body; blocked
/// origins get a 403 before any verification runs. A destructive verdict is
/// executed to completion before the triggering request is answered.
pub async fn authenticate(
    State(state): State<AppState>,
    ClientIp(origin): ClientIp,
    Json(request): Json<AuthRequest>,
) -> Response {
    if state.is_wiping() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let now = Instant::now();

    // Volume throttle first: a throttled request costs no verification work
    // and no failure accounting.
    if !state.auth_limiter().lock().await.allow(&origin, now) {
        tracing::warn!(%origin, "authentication attempt over the rate limit");
        return (StatusCode::TOO_MANY_REQUESTS, Json(AuthRejection::rate_limited()))
            .into_response();
    }

    if let BlockStatus::Blocked { permanent } =
        state.defense().lock().await.check_blocked(&origin, now)
    {
        tracing::warn!(%origin, permanent, "authentication attempt from blocked origin");
        return (StatusCode::FORBIDDEN, Json(AuthRejection::blocked())).into_response();
    }

    let outcome = state.gate().lock().await.authenticate(&request.words, now);

    match outcome {
        Ok(issued) => {
            state.defense().lock().await.on_success(&origin);
            tracing::info!(%origin, "authentication succeeded");
            Json(AuthResponse {
                token: issued.token,
                kdf_salt: state.config().kdf_salt_hex(),
                expires_in: issued.ttl.as_secs(),
            })
            .into_response()
        },
        Err(_) => {
            let verdict = state.defense().lock().await.on_failure(&origin, now);
            if let DefenseVerdict::Wipe { shutdown } = verdict {
                state.execute_wipe(shutdown).await;
            }
            (StatusCode::UNAUTHORIZED, Json(AuthRejection::invalid_credentials()))
                .into_response()
        },
    }
}

/// `GET /auth/salt`: the deployment's public KDF salt.
///
/// Served unauthenticated — clients need it before they can derive anything,
/// and it protects against rainbow tables, not against an attacker who reads
/// it.
pub async fn get_salt(State(state): State<AppState>) -> Response {
    if state.is_wiping() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    Json(serde_json::json!({ "kdf_salt": state.config().kdf_salt_hex() })).into_response()
}

/// `GET /health`: process liveness.
///
/// Answers even during a wipe; a wipe is the server working as intended, not
/// an outage, and the body reveals nothing about vault state.
pub async fn health() -> Response {
    Json(serde_json::json!({ "status": "healthy" })).into_response()
}
