//! Request and response bodies for the backend HTTP API
//!
//! Every response is decoded into a typed struct with serde so that a
//! missing or mistyped field surfaces as a decode error instead of
//! silently defaulting.

use serde::{Deserialize, Serialize};

pub const TOTP_VERIFY_PATH: &str = "/v1/totp/verify";
pub const PUSH_SEND_PATH: &str = "/v1/push/send";
pub const PUSH_STATUS_PATH: &str = "/v1/push/status/";
pub const CAPABILITY_PATH: &str = "/v1/rdp/auth";

/// Backend error code for an unenrolled user
pub const ERROR_USER_NOT_FOUND: &str = "user_not_found";
/// Backend error code for a locked account
pub const ERROR_USER_LOCKED: &str = "user_locked";
/// Backend error code for a rate-delayed account
pub const ERROR_USER_DELAYED: &str = "user_delayed";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    pub external_user_id: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpResponse {
    /// Required: anything other than an explicit `true` is a failed
    /// verification, not an error
    pub valid: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSendRequest {
    pub external_user_id: String,
    pub service_name: String,
    pub device_info: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

fn default_expires_in() -> u64 {
    60
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSendResponse {
    pub request_id: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

#[derive(Debug, Deserialize)]
pub struct PushStatusResponse {
    /// Parsed leniently: see `PushStatus::parse`
    pub status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityRequest {
    pub external_user_id: String,
    pub hostname: String,
    pub login_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub totp_enabled: Option<bool>,
    #[serde(default)]
    pub push_enabled: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
}
