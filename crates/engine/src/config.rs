//! Engine configuration
//!
//! One immutable snapshot per process, loaded from a TOML file. The
//! host front ends translate their native stores (Windows registry,
//! PAM ini file) into this shape before handing it over; the engine
//! never reads a registry or parses an ini line itself.

use std::fmt;
use std::path::Path;

use mfagate_crypto::{CryptoError, MachineCipher, SecretStore};
use serde::Deserialize;
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid setting {0}: {1}")]
    Invalid(&'static str, String),

    #[error("Secret resolution failed: {0}")]
    Secret(#[from] CryptoError),
}

/// Which factors the deployment allows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnabledMethods {
    pub totp: bool,
    pub push: bool,
}

/// Per-attempt policy snapshot. Loaded once and passed by reference
/// into every attempt.
#[derive(Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the settings an attempt cannot proceed without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.endpoint.is_empty() {
            return Err(ConfigError::Missing("api.endpoint"));
        }
        if !self.api.endpoint.starts_with("https://") && !self.api.endpoint.starts_with("http://")
        {
            return Err(ConfigError::Invalid(
                "api.endpoint",
                "must be an http(s) URL".into(),
            ));
        }
        if self.api.integration_key.is_empty() && self.api.integration_key_enc.is_empty() {
            return Err(ConfigError::Missing("api.integration_key"));
        }
        if self.api.secret_key.is_empty() && self.api.secret_key_enc.is_empty() {
            return Err(ConfigError::Missing("api.secret_key"));
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Invalid("api.timeout_secs", "must be > 0".into()));
        }
        let methods = self.auth.enabled_methods();
        if !methods.totp && !methods.push {
            return Err(ConfigError::Invalid(
                "auth.methods",
                format!("unusable method set: {}", self.auth.methods),
            ));
        }
        Ok(())
    }

    /// Resolve the integration key, preferring the encrypted value.
    pub fn integration_key<C: MachineCipher>(
        &self,
        store: &SecretStore<C>,
    ) -> Result<Zeroizing<String>, ConfigError> {
        Ok(store.load_secret(
            Some(&self.api.integration_key_enc),
            Some(&self.api.integration_key),
        )?)
    }

    /// Resolve the API secret key, preferring the encrypted value.
    pub fn secret_key<C: MachineCipher>(
        &self,
        store: &SecretStore<C>,
    ) -> Result<Zeroizing<String>, ConfigError> {
        Ok(store.load_secret(Some(&self.api.secret_key_enc), Some(&self.api.secret_key))?)
    }
}

// Key material must never end up in logs, so Debug is written by hand.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("endpoint", &self.api.endpoint)
            .field("timeout_secs", &self.api.timeout_secs)
            .field("methods", &self.auth.methods)
            .field("two_step", &self.auth.two_step)
            .field("exclude_accounts", &self.policy.exclude_accounts)
            .field("require_groups", &self.policy.require_groups)
            .field("grace_window_minutes", &self.policy.grace_window_minutes)
            .finish_non_exhaustive()
    }
}

/// Backend connection settings
#[derive(Clone, Deserialize)]
pub struct ApiConfig {
    /// Backend base URL
    #[serde(default)]
    pub endpoint: String,

    /// Integration key, plaintext (legacy)
    #[serde(default)]
    pub integration_key: String,

    /// Integration key, encrypted blob (preferred)
    #[serde(default)]
    pub integration_key_enc: String,

    /// Secret signing key, plaintext (legacy)
    #[serde(default)]
    pub secret_key: String,

    /// Secret signing key, encrypted blob (preferred)
    #[serde(default)]
    pub secret_key_enc: String,

    /// Request timeout and push wait budget, seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Path of the 32-byte machine key guarding encrypted values
    #[serde(default = "default_machine_key_path")]
    pub machine_key_path: String,
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_machine_key_path() -> String {
    "/etc/mfagate/machine.key".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            integration_key: String::new(),
            integration_key_enc: String::new(),
            secret_key: String::new(),
            secret_key_enc: String::new(),
            timeout_secs: default_timeout_secs(),
            machine_key_path: default_machine_key_path(),
        }
    }
}

/// Authentication flow settings
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Allowed factors: "both", "otp", or "push"
    #[serde(default = "default_methods")]
    pub methods: String,

    /// Service name shown in the push prompt on the user's device
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Login type reported to the backend ("ssh", "rdp", ...)
    #[serde(default = "default_login_type")]
    pub login_type: String,

    /// Two-step mode: first call validates the password and returns
    /// the method choice to the host UI
    #[serde(default)]
    pub two_step: bool,

    /// Honor a backend "no second factor required" capability
    #[serde(default)]
    pub allow_without_mfa: bool,

    /// Offer OTP entry when a push could not be delivered or timed out
    #[serde(default = "default_true")]
    pub otp_fallback: bool,

    /// Push status poll interval, milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_methods() -> String {
    "both".to_string()
}

fn default_service_name() -> String {
    "Interactive Login".to_string()
}

fn default_login_type() -> String {
    "ssh".to_string()
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            methods: default_methods(),
            service_name: default_service_name(),
            login_type: default_login_type(),
            two_step: false,
            allow_without_mfa: false,
            otp_fallback: default_true(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl AuthConfig {
    pub fn enabled_methods(&self) -> EnabledMethods {
        match self.methods.to_ascii_lowercase().as_str() {
            "otp" | "totp" => EnabledMethods {
                totp: true,
                push: false,
            },
            "push" => EnabledMethods {
                totp: false,
                push: true,
            },
            // "both" and anything unrecognized keep every door that
            // still requires a verified factor
            _ => EnabledMethods {
                totp: true,
                push: true,
            },
        }
    }
}

/// Bypass policy settings
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PolicyConfig {
    /// Break-glass accounts, `DOMAIN\user` or `.\user` form
    #[serde(default)]
    pub exclude_accounts: Vec<String>,

    /// If non-empty, only members of these groups are gated
    #[serde(default)]
    pub require_groups: Vec<String>,

    /// "Recently authenticated" grace window, minutes; 0 disables it
    #[serde(default)]
    pub grace_window_minutes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        r#"
            [api]
            endpoint = "https://mfa.example.com"
            integration_key = "ik"
            secret_key = "sk"
        "#
    }

    #[test]
    fn test_minimal_config_is_valid() {
        let config: Config = toml::from_str(minimal_toml()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.api.timeout_secs, 60);
        assert_eq!(config.auth.poll_interval_ms, 1000);
        assert!(config.auth.otp_fallback);
        assert_eq!(config.policy.grace_window_minutes, 0);
    }

    #[test]
    fn test_missing_keys_are_fatal() {
        let toml_str = r#"
            [api]
            endpoint = "https://mfa.example.com"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing("api.integration_key"))
        ));

        let config = Config::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing("api.endpoint"))
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let toml_str = r#"
            [api]
            endpoint = "https://mfa.example.com"
            integration_key = "ik"
            secret_key = "sk"
            timeout_secs = 0
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_methods_parsing() {
        let mut auth = AuthConfig::default();
        assert_eq!(
            auth.enabled_methods(),
            EnabledMethods {
                totp: true,
                push: true
            }
        );

        auth.methods = "otp".into();
        assert!(auth.enabled_methods().totp);
        assert!(!auth.enabled_methods().push);

        auth.methods = "PUSH".into();
        assert!(!auth.enabled_methods().totp);
        assert!(auth.enabled_methods().push);
    }

    #[test]
    fn test_debug_redacts_keys() {
        let toml_str = r#"
            [api]
            endpoint = "https://mfa.example.com"
            integration_key = "ik-sensitive"
            secret_key = "sk-sensitive"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        let printed = format!("{config:?}");
        assert!(!printed.contains("sensitive"));
        assert!(printed.contains("mfa.example.com"));
    }
}
