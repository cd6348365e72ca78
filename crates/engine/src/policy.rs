//! Bypass policy: break-glass account exclusion and group gating
//!
//! Exclusion matching runs before any network call so a break-glass
//! account still works when the backend is down. Every match produces
//! the exact configured entry it matched, which travels inside the
//! `Bypassed` result and into the audit log.

use mfagate_protocol::AccountName;

/// What the policy layer knows about the local machine.
#[derive(Debug, Clone)]
pub struct MachineInfo {
    /// Local computer name, used to qualify `.\user` and bare local
    /// account entries
    pub computer_name: String,
    /// Whether the machine is joined to a directory domain
    pub domain_joined: bool,
}

impl MachineInfo {
    pub fn standalone(computer_name: impl Into<String>) -> Self {
        Self {
            computer_name: computer_name.into(),
            domain_joined: false,
        }
    }
}

/// Directory name resolution the exclusion matcher may consult.
///
/// On a domain-joined Windows host this maps a DNS domain to its
/// NetBIOS short name; everywhere else `NoDirectory` is enough.
pub trait DirectoryLookup: Send + Sync {
    /// NetBIOS short name for a DNS domain name, if resolvable.
    fn netbios_name(&self, dns_domain: &str) -> Option<String>;
}

/// Lookup for hosts without a directory. Never resolves anything.
pub struct NoDirectory;

impl DirectoryLookup for NoDirectory {
    fn netbios_name(&self, _dns_domain: &str) -> Option<String> {
        None
    }
}

/// Match a login identity against the configured excluded accounts.
///
/// Returns the configured entry that matched, or `None`. Matching is
/// case-insensitive and tries, in order:
/// 1. the entry as written against the qualified login identity
/// 2. the login identity with its DNS domain resolved to the NetBIOS
///    short name (a UPN login matches an entry written in flat form)
/// 3. the entry with its own domain resolved the same way, so entries
///    written with the DNS domain also match a flat-form login
/// Local entries (`.\user`, bare names) are compared in their
/// machine-qualified form throughout.
pub fn excluded_account_match(
    excluded: &[String],
    identity: &AccountName,
    machine: &MachineInfo,
    directory: &dyn DirectoryLookup,
) -> Option<String> {
    let login = identity.qualified(&machine.computer_name);
    let flat_login = netbios_form(identity, machine, directory)
        .map(|flat| flat.qualified(&machine.computer_name));

    for entry in excluded {
        let parsed = AccountName::parse(entry);
        let entry_qualified = parsed.qualified(&machine.computer_name);

        if AccountName::matches(&entry_qualified, &login) {
            return Some(entry.clone());
        }

        if let Some(flat) = &flat_login {
            if AccountName::matches(&entry_qualified, flat) {
                return Some(entry.clone());
            }
        }

        if let Some(rewritten) = netbios_form(&parsed, machine, directory) {
            if AccountName::matches(&rewritten.qualified(&machine.computer_name), &login) {
                return Some(entry.clone());
            }
        }
    }

    None
}

/// The account with its DNS domain replaced by the NetBIOS short name,
/// when the directory can resolve one.
fn netbios_form(
    account: &AccountName,
    machine: &MachineInfo,
    directory: &dyn DirectoryLookup,
) -> Option<AccountName> {
    if !machine.domain_joined || account.domain.is_empty() || account.domain == "." {
        return None;
    }
    directory
        .netbios_name(&account.domain)
        .map(|netbios| AccountName::new(netbios, account.user.clone()))
}

/// Whether the user is subject to the gate at all.
///
/// An empty `require_groups` list gates everyone. Group names compare
/// case-insensitively against the host-resolved membership list.
pub fn is_in_required_group(require_groups: &[String], membership: &[String]) -> bool {
    if require_groups.is_empty() {
        return true;
    }
    require_groups.iter().any(|required| {
        membership
            .iter()
            .any(|held| held.eq_ignore_ascii_case(required))
    })
}
