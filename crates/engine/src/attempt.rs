//! Per-login attempt context

use uuid::Uuid;
use zeroize::Zeroizing;

/// Everything the host knows about one login attempt.
///
/// Built fresh for each attempt and dropped when the attempt reaches a
/// terminal outcome. The secret field (one-time code or push marker)
/// is wiped on drop.
pub struct LoginAttempt {
    /// Raw username as the host captured it
    pub username: String,
    /// Domain portion if the host separated it out
    pub domain: String,
    /// Remote client address, when the host knows one (RDP, SSH)
    pub client_host: Option<String>,
    /// One-time code the user typed, or empty when none was entered
    pub secret: Zeroizing<String>,
    /// Host-assigned stable session identifier (Windows SID, PAM
    /// "user@tty"), used by the continuity store
    pub sid: Option<String>,
    /// Correlates every log line of this attempt
    pub session_id: Uuid,
    /// Group names the host resolved for this user, already normalized
    /// to lowercase
    pub group_membership: Vec<String>,
}

impl LoginAttempt {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            domain: String::new(),
            client_host: None,
            secret: Zeroizing::new(String::new()),
            sid: None,
            session_id: Uuid::new_v4(),
            group_membership: Vec::new(),
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_client_host(mut self, host: impl Into<String>) -> Self {
        self.client_host = Some(host.into());
        self
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Zeroizing::new(secret.into());
        self
    }

    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.group_membership = groups.into_iter().map(|g| g.to_lowercase()).collect();
        self
    }

    /// Identity in `DOMAIN\user` form when a domain is known, otherwise
    /// the raw username (which may itself carry a domain).
    pub fn qualified_input(&self) -> String {
        if self.domain.is_empty() {
            self.username.clone()
        } else {
            format!("{}\\{}", self.domain, self.username)
        }
    }
}

// Secrets stay out of logs even when the whole attempt is dumped.
impl std::fmt::Debug for LoginAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginAttempt")
            .field("username", &self.username)
            .field("domain", &self.domain)
            .field("client_host", &self.client_host)
            .field("sid", &self.sid)
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_input_forms() {
        let attempt = LoginAttempt::new("alice").with_domain("CORP");
        assert_eq!(attempt.qualified_input(), "CORP\\alice");

        let attempt = LoginAttempt::new("CORP\\alice");
        assert_eq!(attempt.qualified_input(), "CORP\\alice");
    }

    #[test]
    fn test_debug_hides_secret() {
        let attempt = LoginAttempt::new("alice").with_secret("123456");
        let printed = format!("{attempt:?}");
        assert!(!printed.contains("123456"));
    }

    #[test]
    fn test_groups_are_lowercased() {
        let attempt = LoginAttempt::new("alice").with_groups(vec!["MFA Users".into()]);
        assert_eq!(attempt.group_membership, vec!["mfa users".to_string()]);
    }
}
