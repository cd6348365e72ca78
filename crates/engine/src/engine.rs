//! The per-login authentication state machine
//!
//! `authenticate` drives one attempt from identity to a terminal
//! `AuthResult`. The order of the checks is load-bearing:
//!
//! 1. group gate and excluded accounts run before any network call, so
//!    break-glass access survives a backend outage
//! 2. the continuity grace window runs next, also offline
//! 3. capability discovery, then OTP or push, each fail-closed
//!
//! Cancellation is an error (`EngineError::Cancelled`), never a
//! terminal result: a dismissed prompt must not look like a denial.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use mfagate_protocol::{
    AccountName, AuthMethod, AuthResult, BypassReason, FailureReason, TokenType,
    normalize_username,
};
use mfagate_transport::MfaApi;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::{
    AuditSink, AuthRecord, Config, ContinuityStore, DirectoryLookup, EngineError, LoginAttempt,
    MachineInfo, MemoryContinuityStore, NoDirectory, NoSessions, PushOutcome, PushPoller,
    SessionQuery, TracingAudit, excluded_account_match, is_in_required_group,
    minutes_since_epoch, poll_budget, within_grace_window,
};

pub struct Engine {
    config: Config,
    api: Arc<dyn MfaApi>,
    machine: MachineInfo,
    continuity: Arc<dyn ContinuityStore>,
    sessions: Arc<dyn SessionQuery>,
    directory: Arc<dyn DirectoryLookup>,
    audit: Arc<dyn AuditSink>,
    /// Cancel handle of the attempt currently in flight. Replacing it
    /// drops the old sender, which a superseded poller observes as a
    /// closed channel.
    active: Mutex<Option<watch::Sender<bool>>>,
}

impl Engine {
    pub fn new(
        config: Config,
        api: Arc<dyn MfaApi>,
        machine: MachineInfo,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            api,
            machine,
            continuity: Arc::new(MemoryContinuityStore::default()),
            sessions: Arc::new(NoSessions),
            directory: Arc::new(NoDirectory),
            audit: Arc::new(TracingAudit),
            active: Mutex::new(None),
        })
    }

    pub fn with_continuity(mut self, store: Arc<dyn ContinuityStore>) -> Self {
        self.continuity = store;
        self
    }

    pub fn with_sessions(mut self, sessions: Arc<dyn SessionQuery>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn with_directory(mut self, directory: Arc<dyn DirectoryLookup>) -> Self {
        self.directory = directory;
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Cancel the attempt currently in flight, if any.
    pub fn cancel(&self) {
        let guard = self.active.lock().expect("cancel lock poisoned");
        if let Some(sender) = guard.as_ref() {
            // Receiver may already be gone; nothing to do then.
            let _ = sender.send(true);
        }
    }

    /// Install a fresh cancel channel for a new attempt, superseding
    /// any attempt still in flight.
    fn begin_attempt(&self) -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        let mut guard = self.active.lock().expect("cancel lock poisoned");
        *guard = Some(tx);
        rx
    }

    /// Drive one login attempt to a terminal result.
    pub async fn authenticate(&self, attempt: &LoginAttempt) -> Result<AuthResult, EngineError> {
        let cancel = self.begin_attempt();
        let normalized = normalize_username(&attempt.qualified_input());
        info!(session_id = %attempt.session_id, username = %normalized, "login attempt started");

        // Offline bypass checks come first: they must hold even when
        // the backend is unreachable.
        if !is_in_required_group(&self.config.policy.require_groups, &attempt.group_membership) {
            let reason = BypassReason::NotInRequiredGroup;
            self.audit.bypass_used(&normalized, &reason);
            return Ok(AuthResult::Bypassed(reason));
        }

        let identity = AccountName::parse(&attempt.qualified_input());
        if let Some(matched) = excluded_account_match(
            &self.config.policy.exclude_accounts,
            &identity,
            &self.machine,
            self.directory.as_ref(),
        ) {
            let reason = BypassReason::ExcludedAccount { matched };
            self.audit.bypass_used(&normalized, &reason);
            return Ok(AuthResult::Bypassed(reason));
        }

        if self.config.policy.grace_window_minutes > 0 {
            if let Some(record) = self.continuity.last_auth(&normalized).await {
                if within_grace_window(
                    &record,
                    self.config.policy.grace_window_minutes,
                    minutes_since_epoch(),
                    &normalized,
                    self.sessions.as_ref(),
                ) {
                    let reason = BypassReason::RecentSession { sid: record.sid };
                    self.audit.bypass_used(&normalized, &reason);
                    return Ok(AuthResult::Bypassed(reason));
                }
            }
        }

        // Capability discovery. A transport failure here falls back to
        // the configured method set: the user still has to present a
        // verified factor, they just lose backend-tailored choices.
        let capability = match self
            .api
            .query_capability(&normalized, &self.machine.computer_name, &self.config.auth.login_type)
            .await
        {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(session_id = %attempt.session_id, "capability discovery failed, using configured methods: {e}");
                None
            }
        };

        match capability {
            Some(TokenType::Locked) => return Ok(AuthResult::Failure(FailureReason::UserLocked)),
            Some(TokenType::Delayed) => return Ok(AuthResult::Failure(FailureReason::UserDelayed)),
            Some(TokenType::Unknown) => return Ok(AuthResult::Failure(FailureReason::UserUnknown)),
            Some(TokenType::WithoutMfa) => {
                if self.config.auth.allow_without_mfa {
                    let reason = BypassReason::NoMfaRequired;
                    self.audit.bypass_used(&normalized, &reason);
                    return Ok(AuthResult::Bypassed(reason));
                }
                return Ok(AuthResult::Failure(FailureReason::NoMethodAvailable));
            }
            Some(TokenType::TotpOnly) | Some(TokenType::PushCapable) | None => {}
        }

        let methods = self.available_methods(capability);
        if methods.is_empty() {
            return Ok(AuthResult::Failure(FailureReason::NoMethodAvailable));
        }

        // Two-step mode hands the method choice back to the host UI
        // unless the user already typed a code.
        if self.config.auth.two_step && attempt.secret.is_empty() {
            return Ok(AuthResult::NeedsSecondStep(methods));
        }

        if !attempt.secret.is_empty() && methods.contains(&AuthMethod::Totp) {
            return self.run_totp(attempt, &normalized).await;
        }

        if methods.contains(&AuthMethod::Push) {
            let allow_fallback =
                self.config.auth.otp_fallback && methods.contains(&AuthMethod::Totp);
            return self.run_push(attempt, &normalized, allow_fallback, cancel).await;
        }

        // OTP is the only option but no code was entered yet.
        Ok(AuthResult::NeedsSecondStep(vec![AuthMethod::Totp]))
    }

    /// Run the method the user picked after a `NeedsSecondStep` result.
    pub async fn second_step(
        &self,
        attempt: &LoginAttempt,
        method: AuthMethod,
    ) -> Result<AuthResult, EngineError> {
        let cancel = self.begin_attempt();
        let normalized = normalize_username(&attempt.qualified_input());

        match method {
            AuthMethod::Totp => self.run_totp(attempt, &normalized).await,
            AuthMethod::Push => {
                let allow_fallback =
                    self.config.auth.otp_fallback && self.config.auth.enabled_methods().totp;
                self.run_push(attempt, &normalized, allow_fallback, cancel).await
            }
        }
    }

    /// Intersect what the backend reports with what the deployment
    /// enables. With no capability report the configured set stands.
    fn available_methods(&self, capability: Option<TokenType>) -> Vec<AuthMethod> {
        let enabled = self.config.auth.enabled_methods();
        let (totp, push) = match capability {
            Some(TokenType::TotpOnly) => (true, false),
            Some(TokenType::PushCapable) => (true, true),
            None => (true, true),
            // Terminal token types never reach this point
            _ => (false, false),
        };

        let mut methods = Vec::new();
        if totp && enabled.totp {
            methods.push(AuthMethod::Totp);
        }
        if push && enabled.push {
            methods.push(AuthMethod::Push);
        }
        methods
    }

    async fn run_totp(
        &self,
        attempt: &LoginAttempt,
        normalized: &str,
    ) -> Result<AuthResult, EngineError> {
        if attempt.secret.is_empty() {
            return Ok(AuthResult::NeedsSecondStep(vec![AuthMethod::Totp]));
        }
        match self.api.verify_totp(normalized, &attempt.secret).await {
            Ok(true) => {
                self.record_success(attempt, normalized).await;
                Ok(AuthResult::Success)
            }
            Ok(false) => Ok(AuthResult::Failure(FailureReason::InvalidCode)),
            Err(e) => {
                warn!(session_id = %attempt.session_id, "code verification unreachable: {e}");
                Ok(AuthResult::Failure(FailureReason::ServiceUnavailable))
            }
        }
    }

    async fn run_push(
        &self,
        attempt: &LoginAttempt,
        normalized: &str,
        allow_fallback: bool,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<AuthResult, EngineError> {
        let mut challenge = match self
            .api
            .send_push(
                normalized,
                &self.machine.computer_name,
                attempt.client_host.as_deref(),
            )
            .await
        {
            Ok(challenge) => challenge,
            Err(e) => {
                warn!(session_id = %attempt.session_id, "push send failed: {e}");
                if allow_fallback {
                    return Ok(AuthResult::NeedsSecondStep(vec![AuthMethod::Totp]));
                }
                return Ok(AuthResult::Failure(FailureReason::PushSendFailed));
            }
        };

        let poller = PushPoller::new(
            Arc::clone(&self.api),
            Duration::from_millis(self.config.auth.poll_interval_ms),
        );
        let budget = poll_budget(self.config.api.timeout_secs, challenge.expires_in);

        match poller.poll(&mut challenge, budget, &mut cancel).await {
            PushOutcome::Approved => {
                self.record_success(attempt, normalized).await;
                Ok(AuthResult::Success)
            }
            // A denial is a user decision and always terminal; only a
            // push that never got answered may fall back to a code.
            PushOutcome::Denied => Ok(AuthResult::Failure(FailureReason::PushDenied)),
            PushOutcome::Expired => {
                if allow_fallback {
                    Ok(AuthResult::NeedsSecondStep(vec![AuthMethod::Totp]))
                } else {
                    Ok(AuthResult::Failure(FailureReason::PushTimeout))
                }
            }
            PushOutcome::Cancelled => Err(EngineError::Cancelled),
        }
    }

    /// Record the verified factor for the continuity grace window.
    /// Only a verified factor refreshes the record, never a bypass.
    async fn record_success(&self, attempt: &LoginAttempt, normalized: &str) {
        info!(session_id = %attempt.session_id, username = %normalized, "second factor verified");
        if let Some(sid) = &attempt.sid {
            self.continuity
                .record_auth(
                    normalized,
                    AuthRecord {
                        sid: sid.clone(),
                        minute: minutes_since_epoch(),
                    },
                )
                .await;
        }
    }
}
