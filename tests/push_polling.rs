//! Push poll termination, timeout, and cancellation tests
//!
//! All run on paused tokio time so the poll cadence and time bounds
//! are exercised without real waiting.


use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use mock_api::{MockApi, attempt, build_engine, test_config};
use mfagate_engine::EngineError;
use mfagate_protocol::{AuthMethod, AuthResult, FailureReason, PushStatus, TokenType};

#[tokio::test(start_paused = true)]
async fn test_pending_forever_hits_time_bound() {
    let mut config = test_config();
    config.api.timeout_secs = 5;
    config.auth.methods = "push".into();

    // Queue never leaves Pending
    let api = Arc::new(
        MockApi::new()
            .with_capability(TokenType::PushCapable)
            .with_expires_in(60),
    );
    let engine = build_engine(config, api.clone());

    let result = engine.authenticate(&attempt("alice")).await.unwrap();

    assert_eq!(result, AuthResult::Failure(FailureReason::PushTimeout));
    // Budget is min(timeout=5, expires=60) doubled; 1s cadence means a
    // bounded number of polls, never an unbounded loop
    let polls = api.status_calls.load(Ordering::SeqCst);
    assert!(polls >= 10 && polls <= 12, "unexpected poll count {polls}");
}

#[tokio::test(start_paused = true)]
async fn test_backend_expiry_tightens_the_bound() {
    let mut config = test_config();
    config.api.timeout_secs = 600;
    config.auth.methods = "push".into();

    let api = Arc::new(
        MockApi::new()
            .with_capability(TokenType::PushCapable)
            .with_expires_in(2),
    );
    let engine = build_engine(config, api.clone());

    let result = engine.authenticate(&attempt("alice")).await.unwrap();

    assert_eq!(result, AuthResult::Failure(FailureReason::PushTimeout));
    // Bound is 2s doubled, not the 600s configured timeout
    assert!(api.status_calls.load(Ordering::SeqCst) <= 6);
}

#[tokio::test(start_paused = true)]
async fn test_poll_survives_transport_blips() {
    // Two failed status calls, then an approval: the blips must be
    // retried at the normal cadence, never treated as a terminal
    // outcome
    let api = Arc::new(
        MockApi::new()
            .with_capability(TokenType::PushCapable)
            .with_push_status_script(vec![None, None, Some(PushStatus::Approved)]),
    );
    let engine = build_engine(test_config(), api.clone());

    let result = engine.authenticate(&attempt("alice")).await.unwrap();

    assert_eq!(result, AuthResult::Success);
    assert_eq!(api.status_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_expired_status_offers_code_fallback() {
    let api = Arc::new(
        MockApi::new()
            .with_capability(TokenType::PushCapable)
            .with_push_statuses(vec![PushStatus::Pending, PushStatus::Expired]),
    );
    let engine = build_engine(test_config(), api);

    // otp_fallback defaults on and the user is code-capable
    let result = engine.authenticate(&attempt("alice")).await.unwrap();
    assert_eq!(result, AuthResult::NeedsSecondStep(vec![AuthMethod::Totp]));
}

#[tokio::test(start_paused = true)]
async fn test_expired_status_without_fallback_fails() {
    let mut config = test_config();
    config.auth.otp_fallback = false;

    let api = Arc::new(
        MockApi::new()
            .with_capability(TokenType::PushCapable)
            .with_push_statuses(vec![PushStatus::Expired]),
    );
    let engine = build_engine(config, api);

    let result = engine.authenticate(&attempt("alice")).await.unwrap();
    assert_eq!(result, AuthResult::Failure(FailureReason::PushTimeout));
}

#[tokio::test(start_paused = true)]
async fn test_push_send_failure_falls_back_to_code() {
    let api = Arc::new(
        MockApi::new()
            .with_capability(TokenType::PushCapable)
            .push_send_fails(),
    );
    let engine = build_engine(test_config(), api);

    let result = engine.authenticate(&attempt("alice")).await.unwrap();
    assert_eq!(result, AuthResult::NeedsSecondStep(vec![AuthMethod::Totp]));
}

#[tokio::test(start_paused = true)]
async fn test_push_send_failure_without_fallback_fails() {
    let mut config = test_config();
    config.auth.methods = "push".into();

    let api = Arc::new(
        MockApi::new()
            .with_capability(TokenType::PushCapable)
            .push_send_fails(),
    );
    let engine = build_engine(config, api);

    let result = engine.authenticate(&attempt("alice")).await.unwrap();
    assert_eq!(result, AuthResult::Failure(FailureReason::PushSendFailed));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_poll() {
    let mut config = test_config();
    config.auth.methods = "push".into();

    let api = Arc::new(MockApi::new().with_capability(TokenType::PushCapable));
    let engine = Arc::new(build_engine(config, api));

    let worker = Arc::clone(&engine);
    let handle = tokio::spawn(async move { worker.authenticate(&attempt("alice")).await });

    // Let the attempt reach its poll loop, then dismiss it
    tokio::time::sleep(Duration::from_millis(1500)).await;
    engine.cancel();

    let result = handle.await.unwrap();
    assert!(matches!(result, Err(EngineError::Cancelled)));
}

#[tokio::test(start_paused = true)]
async fn test_new_attempt_supersedes_polling_one() {
    let api = Arc::new(
        MockApi::new()
            .with_capability(TokenType::PushCapable)
            .with_verify(true),
    );
    let engine = Arc::new(build_engine(test_config(), api));

    let worker = Arc::clone(&engine);
    let first = tokio::spawn(async move { worker.authenticate(&attempt("alice")).await });
    tokio::time::sleep(Duration::from_millis(1500)).await;

    // A new attempt replaces the cancel channel; the old poll ends
    let second = engine
        .authenticate(&attempt("alice").with_secret("123456"))
        .await
        .unwrap();
    assert_eq!(second, AuthResult::Success);

    let first = first.await.unwrap();
    assert!(matches!(first, Err(EngineError::Cancelled)));
}
