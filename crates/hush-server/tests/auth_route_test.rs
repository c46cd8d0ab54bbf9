//! Route-level tests for the authentication surface.
//!
//! Each request goes through the real router with `tower::oneshot`; origins
//! are set with `X-Forwarded-For` the way a reverse proxy would.

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt as _;
use hush_core::{FailureMode, PolicyConfig, RateLimitConfig, ServerConfig, Storage as _};
use hush_crypto::auth_hash;
use hush_server::{AppState, router};
use tower::ServiceExt as _;

const WORDS: &str =
    "ocean ridge lantern maple frost anchor velvet prism cedar humming quartz drift";
const SALT: [u8; 16] = [9u8; 16];

fn app_state(mode: FailureMode, max_failures: u32, panic_mode: bool) -> AppState {
    let mut config = server_config(mode, max_failures, panic_mode);
    // Most tests here exercise the defense engine, not the volume throttle;
    // give them room so the throttle never interferes.
    config.auth_rate_limit = RateLimitConfig { requests_per_minute: 600, burst_size: 100 };
    AppState::new(config)
}

fn server_config(mode: FailureMode, max_failures: u32, panic_mode: bool) -> ServerConfig {
    let policy = PolicyConfig { max_failures, mode, block_minutes: 60, panic_mode };
    ServerConfig::from_parts(
        &hex::encode(auth_hash(WORDS)),
        &hex::encode(SALT),
        policy,
        None,
        hush_proto::DEFAULT_MAX_FRAME_BYTES,
    )
    .unwrap()
}

async fn auth_attempt(
    state: &AppState,
    words: &str,
    origin: &str,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/auth")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", origin)
        .body(Body::from(serde_json::json!({ "words": words }).to_string()))
        .unwrap();

    let response = router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn correct_words_issue_token_and_salt() {
    let state = app_state(FailureMode::IpTemp, 5, false);

    let (status, body) = auth_attempt(&state, WORDS, "10.0.0.1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token"].as_str().unwrap().len(), 64);
    assert_eq!(body["kdf_salt"], hex::encode(SALT));
    assert_eq!(body["expires_in"], 30 * 60);
}

#[tokio::test]
async fn sloppy_whitespace_and_case_still_authenticate() {
    let state = app_state(FailureMode::IpTemp, 5, false);

    let sloppy = format!("  {} ", WORDS.to_uppercase());
    let (status, _) = auth_attempt(&state, &sloppy, "10.0.0.1").await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn wrong_words_get_a_uniform_401() {
    let state = app_state(FailureMode::IpTemp, 5, false);

    let (first_status, first_body) = auth_attempt(&state, "wrong words", "10.0.0.1").await;
    let (second_status, second_body) =
        auth_attempt(&state, "different wrong words", "10.0.0.1").await;

    assert_eq!(first_status, StatusCode::UNAUTHORIZED);
    assert_eq!(second_status, StatusCode::UNAUTHORIZED);
    // Identical body regardless of the attempt's content or count
    assert_eq!(first_body, serde_json::json!({ "error": "invalid_credentials" }));
    assert_eq!(second_body, first_body);
}

#[tokio::test]
async fn blocked_origin_gets_403_even_with_correct_words() {
    let state = app_state(FailureMode::IpTemp, 2, false);

    let _ = auth_attempt(&state, "wrong", "10.0.0.1").await;
    let _ = auth_attempt(&state, "wrong", "10.0.0.1").await;

    let (status, body) = auth_attempt(&state, WORDS, "10.0.0.1").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, serde_json::json!({ "error": "access_denied" }));

    // A different origin is unaffected
    let (status, _) = auth_attempt(&state, WORDS, "10.0.0.2").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn success_resets_the_failure_streak() {
    let state = app_state(FailureMode::IpTemp, 2, false);

    let _ = auth_attempt(&state, "wrong", "10.0.0.1").await;
    let (status, _) = auth_attempt(&state, WORDS, "10.0.0.1").await;
    assert_eq!(status, StatusCode::OK);

    // The streak starts over; one more failure does not block
    let _ = auth_attempt(&state, "wrong", "10.0.0.1").await;
    let (status, _) = auth_attempt(&state, WORDS, "10.0.0.1").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn db_wipe_destroys_data_and_keeps_serving() {
    let state = app_state(FailureMode::DbWipe, 3, false);

    let tid = hush_crypto::thread_id("alice", "bob");
    state.relay().storage().store_message(tid, "ct".into(), "iv".into(), 1).unwrap();
    assert_eq!(state.relay().storage().message_count().unwrap(), 1);

    for _ in 0..3 {
        let (status, _) = auth_attempt(&state, "wrong", "10.0.0.1").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // The wipe completed before the third response was sent
    assert_eq!(state.relay().storage().message_count().unwrap(), 0);

    // Fresh state: correct words authenticate again
    let (status, _) = auth_attempt(&state, WORDS, "10.0.0.1").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn panic_mode_wipes_on_first_failure_and_signals_shutdown() {
    let state = app_state(FailureMode::IpTemp, 5, true);
    // Subscribe before the wipe: watch::Sender::send only stores the value
    // while at least one receiver is alive, mirroring main.rs startup order.
    let _signal = state.shutdown_signal();

    let tid = hush_crypto::thread_id("alice", "bob");
    state.relay().storage().store_message(tid, "ct".into(), "iv".into(), 1).unwrap();

    let (status, _) = auth_attempt(&state, "wrong", "10.0.0.1").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(state.relay().storage().message_count().unwrap(), 0);
    assert!(*state.shutdown_signal().borrow());

    // Draining to exit: nothing new is accepted
    let (status, _) = auth_attempt(&state, WORDS, "10.0.0.1").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn salt_endpoint_serves_the_deployment_salt() {
    let state = app_state(FailureMode::IpTemp, 5, false);

    let request = Request::builder().uri("/auth/salt").body(Body::empty()).unwrap();
    let response = router(state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["kdf_salt"], hex::encode(SALT));
}

#[tokio::test]
async fn auth_burst_beyond_the_limit_gets_429() {
    // Default strict profile: burst of 3, 10 per minute
    let state = AppState::new(server_config(FailureMode::IpTemp, 5, false));

    for _ in 0..3 {
        let (status, _) = auth_attempt(&state, "wrong", "10.0.0.1").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, body) = auth_attempt(&state, WORDS, "10.0.0.1").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body, serde_json::json!({ "error": "rate_limited" }));

    // Another origin still has its full burst
    let (status, _) = auth_attempt(&state, WORDS, "10.0.0.2").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn throttled_requests_do_not_count_as_auth_failures() {
    let state = AppState::new(server_config(FailureMode::DbWipe, 3, false));

    let tid = hush_crypto::thread_id("alice", "bob");
    state.relay().storage().store_message(tid, "ct".into(), "iv".into(), 1).unwrap();

    // Two failures spend two tokens; everything past the burst is throttled
    // before it reaches the gate, so the wipe threshold is never crossed.
    let _ = auth_attempt(&state, "wrong", "10.0.0.1").await;
    let _ = auth_attempt(&state, "wrong", "10.0.0.1").await;
    let (status, _) = auth_attempt(&state, WORDS, "10.0.0.1").await;
    assert_eq!(status, StatusCode::OK);
    for _ in 0..10 {
        let (status, _) = auth_attempt(&state, "wrong", "10.0.0.1").await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }

    assert_eq!(state.relay().storage().message_count().unwrap(), 1);
}

#[tokio::test]
async fn health_endpoint_reports_liveness() {
    let state = app_state(FailureMode::IpTemp, 5, false);

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = router(state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, serde_json::json!({ "status": "healthy" }));
}

#[tokio::test]
async fn health_endpoint_answers_during_shutdown_drain() {
    let state = app_state(FailureMode::DbWipeShutdown, 5, false);
    state.execute_wipe(true).await;

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = router(state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn malformed_auth_body_is_a_client_error() {
    let state = app_state(FailureMode::IpTemp, 5, false);

    let request = Request::builder()
        .method("POST")
        .uri("/auth")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("not json"))
        .unwrap();

    let response = router(state).oneshot(request).await.unwrap();
    assert!(response.status().is_client_error());
}
