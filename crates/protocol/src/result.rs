//! Terminal outcomes of a login attempt

use crate::AuthMethod;

/// Why an attempt failed.
///
/// Each reason maps to a distinct, localizable message; transport and
/// backend detail never leaks into what the login UI shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Submitted one-time code was rejected by the backend
    InvalidCode,
    /// User denied the push on their device
    PushDenied,
    /// Push expired or the poll reached its time bound
    PushTimeout,
    /// The push request could not be delivered to the backend
    PushSendFailed,
    /// Account locked at the backend
    UserLocked,
    /// Account delayed at the backend
    UserDelayed,
    /// Backend does not know the user
    UserUnknown,
    /// No enabled method is usable for this user
    NoMethodAvailable,
    /// Backend unreachable or responded outside the protocol
    ServiceUnavailable,
}

impl FailureReason {
    /// Message suitable for the login UI. Deliberately generic for
    /// transport problems: no status codes, no response bodies.
    pub fn user_message(&self) -> &'static str {
        match self {
            FailureReason::InvalidCode => "The verification code is incorrect.",
            FailureReason::PushDenied => "The sign-in request was denied.",
            FailureReason::PushTimeout => "The sign-in request was not approved in time.",
            FailureReason::PushSendFailed => "Could not send the sign-in request.",
            FailureReason::UserLocked => "This account is locked.",
            FailureReason::UserDelayed => "Too many attempts. Try again later.",
            FailureReason::UserUnknown => "This account is not enrolled.",
            FailureReason::NoMethodAvailable => "No authentication method is available.",
            FailureReason::ServiceUnavailable => "The authentication service is unavailable.",
        }
    }
}

/// Justification carried inside a `Bypassed` result.
///
/// The bypass and its proof are one value: there is no separately
/// settable "bypass flag" that could be flipped without the condition
/// that legitimizes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BypassReason {
    /// Identity matched a configured break-glass account
    ExcludedAccount { matched: String },
    /// User authenticated recently and still holds an active session
    RecentSession { sid: String },
    /// Backend reports the user does not require a second factor
    NoMfaRequired,
    /// User is not in any configured required group
    NotInRequiredGroup,
}

/// Outcome of one authentication attempt. Exactly one terminal value
/// is produced per attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResult {
    Success,
    Failure(FailureReason),
    /// Attempt could not complete for a reason unrelated to the user's
    /// credentials (configuration, local environment)
    TransientError(String),
    /// Two-step mode: the host must re-invoke the engine with the
    /// method the user picks from this list
    NeedsSecondStep(Vec<AuthMethod>),
    Bypassed(BypassReason),
}

impl AuthResult {
    pub fn is_success(&self) -> bool {
        matches!(self, AuthResult::Success)
    }

    /// True for results that let the login proceed without a verified
    /// second factor. Every such result carries its justification.
    pub fn is_bypass(&self) -> bool {
        matches!(self, AuthResult::Bypassed(_))
    }
}
