//! Signed reqwest client for the backend API

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use mfagate_crypto::{RequestSigner, generate_nonce};
use mfagate_protocol::{
    CAPABILITY_PATH, CapabilityRequest, CapabilityResponse, PUSH_SEND_PATH, PUSH_STATUS_PATH,
    PushChallenge, PushSendRequest, PushSendResponse, PushStatus, PushStatusResponse, TOTP_VERIFY_PATH,
    TokenType, VerifyOtpRequest, VerifyOtpResponse, normalize_username,
};
use reqwest::Method;
use tracing::{debug, warn};

use crate::{MfaApi, TransportError, token_type_from_capability};

/// HTTP client that signs every request with the integration secret.
///
/// TLS certificate validation is always on; there is deliberately no
/// switch to disable it.
pub struct SigningTransport {
    client: reqwest::Client,
    endpoint: String,
    integration_key: String,
    signer: RequestSigner,
    service_name: String,
}

impl SigningTransport {
    pub fn new(
        endpoint: &str,
        integration_key: &str,
        secret_key: &str,
        service_name: &str,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            integration_key: integration_key.to_string(),
            signer: RequestSigner::new(secret_key),
            service_name: service_name.to_string(),
        })
    }

    /// Send one signed request and return the raw 2xx body.
    ///
    /// GET requests sign the empty body. Logs carry the path and
    /// status only, never headers or bodies.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: String,
    ) -> Result<Vec<u8>, TransportError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_secs()
            .to_string();
        let nonce = generate_nonce();
        let signature = self.signer.sign(&timestamp, &nonce, &body);

        let url = format!("{}{}", self.endpoint, path);
        debug!(%path, "sending signed backend request");

        let response = self
            .client
            .request(method, &url)
            .header("Content-Type", "application/json")
            .header("X-Integration-Key", &self.integration_key)
            .header("X-Signature", signature)
            .header("X-Timestamp", timestamp)
            .header("X-Nonce", nonce)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                let e = e.without_url();
                warn!(%path, "backend request failed: {e}");
                TransportError::Unavailable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%path, %status, "backend returned error status");
            return Err(TransportError::Unavailable(format!("HTTP {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::Unavailable(e.without_url().to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn post_json<B: serde::Serialize, R: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        request: &B,
    ) -> Result<R, TransportError> {
        let body = serde_json::to_string(request)
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;
        let bytes = self.send(Method::POST, path, body).await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            warn!(%path, "backend response failed schema validation: {e}");
            TransportError::MalformedResponse(e.to_string())
        })
    }
}

#[async_trait]
impl MfaApi for SigningTransport {
    async fn query_capability(
        &self,
        username: &str,
        hostname: &str,
        login_type: &str,
    ) -> Result<TokenType, TransportError> {
        let request = CapabilityRequest {
            external_user_id: normalize_username(username),
            hostname: hostname.to_string(),
            login_type: login_type.to_string(),
        };
        let response: CapabilityResponse = self.post_json(CAPABILITY_PATH, &request).await?;
        token_type_from_capability(&response)
    }

    async fn verify_totp(&self, username: &str, code: &str) -> Result<bool, TransportError> {
        let request = VerifyOtpRequest {
            external_user_id: normalize_username(username),
            code: code.to_string(),
        };
        let response: VerifyOtpResponse = self.post_json(TOTP_VERIFY_PATH, &request).await?;
        if response.valid {
            debug!("one-time code accepted");
        } else {
            debug!("one-time code rejected");
        }
        Ok(response.valid)
    }

    async fn send_push(
        &self,
        username: &str,
        device_info: &str,
        ip_address: Option<&str>,
    ) -> Result<PushChallenge, TransportError> {
        let request = PushSendRequest {
            external_user_id: normalize_username(username),
            service_name: self.service_name.clone(),
            device_info: device_info.to_string(),
            ip_address: ip_address.map(str::to_string),
        };
        let response: PushSendResponse = self.post_json(PUSH_SEND_PATH, &request).await?;
        debug!(request_id = %response.request_id, "push challenge created");
        Ok(PushChallenge::new(response.request_id, response.expires_in))
    }

    async fn push_status(&self, request_id: &str) -> Result<PushStatus, TransportError> {
        let path = format!("{PUSH_STATUS_PATH}{request_id}");
        let bytes = self.send(Method::GET, &path, String::new()).await?;
        let response: PushStatusResponse = serde_json::from_slice(&bytes)
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;
        Ok(PushStatus::parse(&response.status))
    }
}
