//! End-to-end login flow tests
//!
//! Drives the full engine against a scripted backend: code entry, push
//! approval and denial, break-glass exclusion, and backend outage.


use std::sync::Arc;
use std::sync::atomic::Ordering;

use mock_api::{CollectingAudit, MockApi, attempt, build_engine, test_config};
use mfagate_protocol::{AuthMethod, AuthResult, BypassReason, FailureReason, PushStatus, TokenType};

#[tokio::test]
async fn test_valid_code_succeeds() {
    let api = Arc::new(MockApi::new().with_capability(TokenType::TotpOnly).with_verify(true));
    let engine = build_engine(test_config(), api.clone());

    let result = engine
        .authenticate(&attempt("CORP\\alice").with_secret("123456"))
        .await
        .unwrap();

    assert_eq!(result, AuthResult::Success);
    assert_eq!(api.verify_calls.load(Ordering::SeqCst), 1);
    assert_eq!(api.push_sends.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_wrong_code_is_invalid_code() {
    let api = Arc::new(MockApi::new().with_capability(TokenType::TotpOnly).with_verify(false));
    let engine = build_engine(test_config(), api);

    let result = engine
        .authenticate(&attempt("alice").with_secret("000000"))
        .await
        .unwrap();

    assert_eq!(result, AuthResult::Failure(FailureReason::InvalidCode));
}

#[tokio::test(start_paused = true)]
async fn test_push_approval_succeeds() {
    let api = Arc::new(
        MockApi::new()
            .with_capability(TokenType::PushCapable)
            .with_push_statuses(vec![
                PushStatus::Pending,
                PushStatus::Pending,
                PushStatus::Approved,
            ]),
    );
    let engine = build_engine(test_config(), api.clone());

    let result = engine.authenticate(&attempt("alice")).await.unwrap();

    assert_eq!(result, AuthResult::Success);
    assert_eq!(api.push_sends.load(Ordering::SeqCst), 1);
    // Status checked immediately, then once per interval
    assert_eq!(api.status_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_push_denial_is_terminal() {
    // Denial must not fall back to code entry even with fallback on
    let mut config = test_config();
    config.auth.otp_fallback = true;

    let api = Arc::new(
        MockApi::new()
            .with_capability(TokenType::PushCapable)
            .with_push_statuses(vec![PushStatus::Pending, PushStatus::Denied]),
    );
    let engine = build_engine(config, api.clone());

    let result = engine.authenticate(&attempt("alice")).await.unwrap();

    assert_eq!(result, AuthResult::Failure(FailureReason::PushDenied));
    assert_eq!(api.verify_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_excluded_account_bypasses_without_network() {
    let mut config = test_config();
    config.policy.exclude_accounts = vec!["HOST01\\breakglass".to_string()];

    // Backend completely down: exclusion must still work
    let api = Arc::new(MockApi::new().capability_fails().verify_fails());
    let audit = Arc::new(CollectingAudit::default());
    let engine =
        build_engine(config, api.clone()).with_audit(audit.clone());

    let result = engine
        .authenticate(&attempt("HOST01\\BreakGlass"))
        .await
        .unwrap();

    assert_eq!(
        result,
        AuthResult::Bypassed(BypassReason::ExcludedAccount {
            matched: "HOST01\\breakglass".into()
        })
    );
    assert_eq!(api.network_calls(), 0);

    // Exactly one audit event carrying the matched entry
    let events = audit.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "breakglass");
}

#[tokio::test]
async fn test_backend_outage_fails_closed_for_normal_user() {
    let api = Arc::new(MockApi::new().capability_fails().verify_fails());
    let engine = build_engine(test_config(), api);

    // Capability discovery fails, the configured methods stand, but
    // verification is also down: the login is denied, never waved in.
    let result = engine
        .authenticate(&attempt("alice").with_secret("123456"))
        .await
        .unwrap();

    assert_eq!(result, AuthResult::Failure(FailureReason::ServiceUnavailable));
}

#[tokio::test]
async fn test_two_step_offers_methods_then_verifies() {
    let mut config = test_config();
    config.auth.two_step = true;

    let api = Arc::new(MockApi::new().with_capability(TokenType::PushCapable).with_verify(true));
    let engine = build_engine(config, api);

    let first = engine.authenticate(&attempt("alice")).await.unwrap();
    assert_eq!(
        first,
        AuthResult::NeedsSecondStep(vec![AuthMethod::Totp, AuthMethod::Push])
    );

    let second = engine
        .second_step(&attempt("alice").with_secret("123456"), AuthMethod::Totp)
        .await
        .unwrap();
    assert_eq!(second, AuthResult::Success);
}

#[tokio::test]
async fn test_totp_only_user_never_gets_push() {
    let api = Arc::new(
        MockApi::new()
            .with_capability(TokenType::TotpOnly)
            .with_push_statuses(vec![PushStatus::Approved]),
    );
    let engine = build_engine(test_config(), api.clone());

    // No code entered: the host must prompt, not push
    let result = engine.authenticate(&attempt("alice")).await.unwrap();
    assert_eq!(result, AuthResult::NeedsSecondStep(vec![AuthMethod::Totp]));
    assert_eq!(api.push_sends.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_grace_window_bypasses_second_prompt() {
    let mut config = test_config();
    config.policy.grace_window_minutes = 10;

    let api = Arc::new(MockApi::new().with_capability(TokenType::TotpOnly).with_verify(true));
    let audit = Arc::new(CollectingAudit::default());
    let sessions = Arc::new(mfagate_engine::StaticSessions::new(vec![(
        "alice".into(),
        "sid-test".into(),
    )]));
    let engine = build_engine(config, api.clone())
        .with_sessions(sessions)
        .with_audit(audit.clone());

    let first = engine
        .authenticate(&attempt("alice").with_secret("123456"))
        .await
        .unwrap();
    assert_eq!(first, AuthResult::Success);

    // Second login inside the window with the session still active
    let second = engine.authenticate(&attempt("alice")).await.unwrap();
    assert_eq!(
        second,
        AuthResult::Bypassed(BypassReason::RecentSession {
            sid: "sid-test".into()
        })
    );
    // The bypass made no network calls beyond the first attempt's one
    assert_eq!(api.network_calls(), 2);
    assert_eq!(audit.events.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_grace_window_requires_active_session() {
    let mut config = test_config();
    config.policy.grace_window_minutes = 10;

    let api = Arc::new(MockApi::new().with_capability(TokenType::TotpOnly).with_verify(true));
    // Default session query reports nothing active
    let engine = build_engine(config, api);

    engine
        .authenticate(&attempt("alice").with_secret("123456"))
        .await
        .unwrap();

    let second = engine.authenticate(&attempt("alice")).await.unwrap();
    assert_eq!(second, AuthResult::NeedsSecondStep(vec![AuthMethod::Totp]));
}
