//! Backend API trait and capability mapping

use async_trait::async_trait;
use mfagate_protocol::{
    CapabilityResponse, ERROR_USER_DELAYED, ERROR_USER_LOCKED, ERROR_USER_NOT_FOUND,
    PushChallenge, PushStatus, TokenType,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    /// Backend unreachable, TLS failure, timeout, or non-2xx status
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// 2xx response whose body does not match the protocol schema
    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),
}

/// The four backend operations the engine needs, behind a trait so
/// tests can run the full state machine against a scripted backend.
#[async_trait]
pub trait MfaApi: Send + Sync {
    /// Capability/token-type discovery for a user
    async fn query_capability(
        &self,
        username: &str,
        hostname: &str,
        login_type: &str,
    ) -> Result<TokenType, TransportError>;

    /// Verify a submitted one-time code. `Ok(false)` is a rejected
    /// code, not an error.
    async fn verify_totp(&self, username: &str, code: &str) -> Result<bool, TransportError>;

    /// Send a push approval request to the user's device
    async fn send_push(
        &self,
        username: &str,
        device_info: &str,
        ip_address: Option<&str>,
    ) -> Result<PushChallenge, TransportError>;

    /// Query the status of an outstanding push challenge
    async fn push_status(&self, request_id: &str) -> Result<PushStatus, TransportError>;
}

/// Map a capability response to a token type.
///
/// Backend error codes for unenrolled/locked/delayed users arrive in
/// the `error` field; an unrecognized shape is a protocol error, never
/// a capability grant.
pub fn token_type_from_capability(resp: &CapabilityResponse) -> Result<TokenType, TransportError> {
    if let Some(code) = resp.error.as_deref() {
        return match code {
            ERROR_USER_NOT_FOUND => Ok(TokenType::Unknown),
            ERROR_USER_LOCKED => Ok(TokenType::Locked),
            ERROR_USER_DELAYED => Ok(TokenType::Delayed),
            other => Err(TransportError::MalformedResponse(format!(
                "unexpected capability error code: {other}"
            ))),
        };
    }

    if !resp.success {
        return Err(TransportError::MalformedResponse(
            "capability response without success or error".into(),
        ));
    }

    let totp = resp.totp_enabled.unwrap_or(true);
    let push = resp.push_enabled.unwrap_or(true);
    Ok(match (totp, push) {
        (_, true) => TokenType::PushCapable,
        (true, false) => TokenType::TotpOnly,
        (false, false) => TokenType::WithoutMfa,
    })
}
