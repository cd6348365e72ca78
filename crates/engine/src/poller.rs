//! Push status poller
//!
//! Polls the backend at a fixed cadence until the challenge reaches a
//! terminal status, the time bound runs out, or the attempt is
//! cancelled. Transport errors during the poll are transient: the
//! challenge may already be approved on the backend, so the loop keeps
//! polling until its bound instead of failing early.

use std::sync::Arc;
use std::time::Duration;

use mfagate_protocol::{PushChallenge, PushStatus};
use mfagate_transport::MfaApi;
use tokio::sync::watch;
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{debug, info};

/// The poll never waits longer than this multiple of the configured
/// budget, whatever expiry the backend claims.
const SAFETY_FACTOR: u64 = 2;

/// How a poll ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Approved,
    Denied,
    Expired,
    /// The attempt was cancelled or superseded while polling
    Cancelled,
}

/// Hard upper bound on a poll: the smaller of the configured timeout
/// and the backend-reported expiry, doubled as slack for in-flight
/// requests. The backend's expiry wins when it is the tighter of the
/// two so an already-expired challenge is not polled for a full
/// configured timeout.
pub fn poll_budget(timeout_secs: u64, expires_in: u64) -> Duration {
    let bound = timeout_secs.min(expires_in).max(1);
    Duration::from_secs(bound.saturating_mul(SAFETY_FACTOR))
}

pub struct PushPoller {
    api: Arc<dyn MfaApi>,
    interval: Duration,
}

impl PushPoller {
    pub fn new(api: Arc<dyn MfaApi>, interval: Duration) -> Self {
        Self { api, interval }
    }

    /// Drive one challenge to an outcome.
    ///
    /// The status is checked immediately, then once per interval. A
    /// closed cancel channel counts as cancellation: it means the
    /// owning attempt was dropped or superseded.
    pub async fn poll(
        &self,
        challenge: &mut PushChallenge,
        max_wait: Duration,
        cancel: &mut watch::Receiver<bool>,
    ) -> PushOutcome {
        let deadline = Instant::now() + max_wait;

        loop {
            match self.api.push_status(&challenge.request_id).await {
                Ok(status) => match challenge.advance(status) {
                    PushStatus::Approved => {
                        info!(request_id = %challenge.request_id, "push approved");
                        return PushOutcome::Approved;
                    }
                    PushStatus::Denied => {
                        info!(request_id = %challenge.request_id, "push denied");
                        return PushOutcome::Denied;
                    }
                    PushStatus::Expired => {
                        info!(request_id = %challenge.request_id, "push expired at backend");
                        return PushOutcome::Expired;
                    }
                    PushStatus::Pending => {}
                },
                Err(e) => {
                    debug!(request_id = %challenge.request_id, "status poll failed, retrying: {e}");
                }
            }

            if Instant::now() >= deadline {
                info!(request_id = %challenge.request_id, "push wait budget exhausted");
                return PushOutcome::Expired;
            }

            tokio::select! {
                _ = sleep(self.interval) => {}
                _ = sleep_until(deadline) => {
                    info!(request_id = %challenge.request_id, "push wait budget exhausted");
                    return PushOutcome::Expired;
                }
                changed = cancel.changed() => {
                    let cancelled = match changed {
                        Ok(()) => *cancel.borrow(),
                        // Sender dropped: the attempt was superseded.
                        Err(_) => true,
                    };
                    if cancelled {
                        info!(request_id = %challenge.request_id, "push poll cancelled");
                        return PushOutcome::Cancelled;
                    }
                }
            }
        }
    }
}
