//! Token capability and push challenge types

use serde::{Deserialize, Serialize};

/// Token capability reported by the backend for one user.
///
/// Queried fresh for every login attempt; never cached across attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    /// User is enrolled but not required to present a second factor
    WithoutMfa,
    /// User can only submit a time-based one-time code
    TotpOnly,
    /// User can approve an out-of-band push (TOTP usually also available)
    PushCapable,
    /// Account is locked at the backend
    Locked,
    /// Account is delayed (too many recent failures)
    Delayed,
    /// Backend does not know the user
    Unknown,
}

/// An authentication method the host can offer to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Totp,
    Push,
}

/// Status of a push challenge at the backend.
///
/// Transitions are monotonic: `Pending` may move to any terminal state,
/// terminal states never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushStatus {
    Pending,
    Approved,
    Denied,
    Expired,
}

impl PushStatus {
    /// Parse a wire status string.
    ///
    /// Unknown values are treated as `Pending`: an unrecognized status
    /// must keep the poll alive, never grant access.
    pub fn parse(s: &str) -> Self {
        match s {
            s if s.eq_ignore_ascii_case("approved") => PushStatus::Approved,
            s if s.eq_ignore_ascii_case("denied") => PushStatus::Denied,
            s if s.eq_ignore_ascii_case("expired") => PushStatus::Expired,
            _ => PushStatus::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PushStatus::Pending)
    }
}

/// A push approval request outstanding at the backend.
///
/// Created when the push-send call succeeds and discarded when the
/// owning login attempt ends.
#[derive(Debug, Clone)]
pub struct PushChallenge {
    /// Backend-assigned request id, used for status polling
    pub request_id: String,
    status: PushStatus,
    /// Seconds until the backend expires the request
    pub expires_in: u64,
}

impl PushChallenge {
    pub fn new(request_id: String, expires_in: u64) -> Self {
        Self {
            request_id,
            status: PushStatus::Pending,
            expires_in,
        }
    }

    pub fn status(&self) -> PushStatus {
        self.status
    }

    /// Advance the challenge status.
    ///
    /// Once a terminal status has been recorded it is immutable; a
    /// later contradictory report from the backend is ignored.
    pub fn advance(&mut self, next: PushStatus) -> PushStatus {
        if !self.status.is_terminal() {
            self.status = next;
        }
        self.status
    }
}
