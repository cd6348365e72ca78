//! Username and account-name normalization
//!
//! The backend identifies users by a bare lowercase name. Hosts hand
//! the engine identities in `DOMAIN\user`, `user@domain`, or plain
//! form; every comparison and every outbound request uses the same
//! normalization so the two can never disagree.

/// Normalize a username for backend calls and comparisons:
/// strip a leading `DOMAIN\` prefix, strip a trailing `@domain`
/// suffix, lowercase the remainder. Idempotent.
pub fn normalize_username(raw: &str) -> String {
    let mut user = raw;

    if let Some(pos) = user.find('\\') {
        user = &user[pos + 1..];
    }
    if let Some(pos) = user.find('@') {
        user = &user[..pos];
    }

    user.to_lowercase()
}

/// A domain-qualified account identity in `DOMAIN\user` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountName {
    pub domain: String,
    pub user: String,
}

impl AccountName {
    pub fn new(domain: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            user: user.into(),
        }
    }

    /// Parse `DOMAIN\user`, `user@domain`, or a bare username.
    pub fn parse(raw: &str) -> Self {
        if let Some((domain, user)) = raw.split_once('\\') {
            return Self::new(domain, user);
        }
        if let Some((user, domain)) = raw.split_once('@') {
            return Self::new(domain, user);
        }
        Self::new("", raw)
    }

    /// Render as `DOMAIN\user`, rewriting a `.` or empty domain to the
    /// local computer name. Local accounts are compared in their
    /// machine-qualified form.
    pub fn qualified(&self, computer_name: &str) -> String {
        let domain = if self.domain.is_empty() || self.domain == "." {
            computer_name
        } else {
            self.domain.as_str()
        };
        format!("{}\\{}", domain, self.user)
    }

    /// Case-insensitive comparison of two qualified names.
    pub fn matches(qualified_a: &str, qualified_b: &str) -> bool {
        qualified_a.eq_ignore_ascii_case(qualified_b)
    }
}
