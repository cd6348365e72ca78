//! Host return-code mapping
//!
//! Translates terminal results into what the two host surfaces expect:
//! PAM integer codes on Linux and credential-provider states on
//! Windows. Everything ambiguous maps to a denial.

use mfagate_protocol::{AuthResult, FailureReason};

/// PAM return codes (from `security/_pam_types.h`).
pub mod pam {
    pub const SUCCESS: i32 = 0;
    pub const AUTH_ERR: i32 = 7;
    pub const USER_UNKNOWN: i32 = 10;
    pub const IGNORE: i32 = 25;
}

/// Map a terminal result to a PAM return code.
///
/// Bypasses return `IGNORE` so the stack's other modules decide;
/// `NeedsSecondStep` never reaches PAM (the module loops its
/// conversation until a terminal result) and maps to a denial if it
/// somehow does.
pub fn pam_code(result: &AuthResult) -> i32 {
    match result {
        AuthResult::Success => pam::SUCCESS,
        AuthResult::Bypassed(_) => pam::IGNORE,
        AuthResult::Failure(FailureReason::UserUnknown) => pam::USER_UNKNOWN,
        AuthResult::Failure(_) | AuthResult::TransientError(_) | AuthResult::NeedsSecondStep(_) => {
            pam::AUTH_ERR
        }
    }
}

/// Credential-provider serialization states on Windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// Hand the packaged credential to the LSA
    Finished,
    /// Keep the tile up and show `message` to the user
    Retry { message: &'static str },
    /// Tell the logon UI nothing useful happened
    NotFinished,
}

/// Map a terminal result to a credential-provider state.
pub fn credential_state(result: &AuthResult) -> CredentialState {
    match result {
        AuthResult::Success | AuthResult::Bypassed(_) => CredentialState::Finished,
        AuthResult::Failure(reason) => CredentialState::Retry {
            message: reason.user_message(),
        },
        AuthResult::TransientError(_) => CredentialState::Retry {
            message: FailureReason::ServiceUnavailable.user_message(),
        },
        AuthResult::NeedsSecondStep(_) => CredentialState::NotFinished,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mfagate_protocol::BypassReason;

    #[test]
    fn test_pam_mapping_is_fail_closed() {
        assert_eq!(pam_code(&AuthResult::Success), pam::SUCCESS);
        assert_eq!(
            pam_code(&AuthResult::Bypassed(BypassReason::NoMfaRequired)),
            pam::IGNORE
        );
        assert_eq!(
            pam_code(&AuthResult::Failure(FailureReason::UserUnknown)),
            pam::USER_UNKNOWN
        );
        assert_eq!(
            pam_code(&AuthResult::Failure(FailureReason::PushDenied)),
            pam::AUTH_ERR
        );
        assert_eq!(
            pam_code(&AuthResult::TransientError("clock".into())),
            pam::AUTH_ERR
        );
    }

    #[test]
    fn test_credential_state_retry_carries_message() {
        let state = credential_state(&AuthResult::Failure(FailureReason::InvalidCode));
        assert_eq!(
            state,
            CredentialState::Retry {
                message: FailureReason::InvalidCode.user_message()
            }
        );
    }
}
