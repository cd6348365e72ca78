//! Audit trail for bypass decisions
//!
//! Every login that proceeds without a verified second factor emits
//! exactly one audit event carrying the proof that legitimized it.

use mfagate_protocol::BypassReason;
use tracing::warn;

/// Sink for security-relevant events.
pub trait AuditSink: Send + Sync {
    /// A login was allowed to proceed without a verified factor.
    fn bypass_used(&self, username: &str, reason: &BypassReason);
}

/// Default sink: structured records on the `audit` target, always at
/// warn level so no filter configuration can silence them by accident.
pub struct TracingAudit;

impl AuditSink for TracingAudit {
    fn bypass_used(&self, username: &str, reason: &BypassReason) {
        match reason {
            BypassReason::ExcludedAccount { matched } => {
                warn!(target: "audit", %username, %matched, "login bypassed MFA: excluded account");
            }
            BypassReason::RecentSession { sid } => {
                warn!(target: "audit", %username, %sid, "login bypassed MFA: recent verified session");
            }
            BypassReason::NoMfaRequired => {
                warn!(target: "audit", %username, "login bypassed MFA: backend requires no second factor");
            }
            BypassReason::NotInRequiredGroup => {
                warn!(target: "audit", %username, "login bypassed MFA: user not in a gated group");
            }
        }
    }
}
