//! "Recently authenticated" continuity records
//!
//! A successful MFA outcome is recorded with a minute-resolution
//! timestamp. A later attempt inside the grace window may bypass the
//! second factor, but only while the recorded session is still active
//! on the host. Records are never refreshed by a bypass: the window
//! runs from the last *verified* factor, so a bypass chain cannot
//! extend itself.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

/// Minutes since the unix epoch. Minute resolution keeps the record
/// comparable across processes without clock-skew fights.
pub fn minutes_since_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
        / 60
}

/// One recorded verified authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRecord {
    /// Host session identifier active when the factor was verified
    pub sid: String,
    /// Minutes since epoch at verification time
    pub minute: u64,
}

/// Storage for continuity records, keyed by normalized username.
#[async_trait]
pub trait ContinuityStore: Send + Sync {
    /// Record a verified authentication. Overwrites any prior record
    /// for the same user.
    async fn record_auth(&self, username: &str, record: AuthRecord);

    /// Most recent verified authentication for a user, if any.
    async fn last_auth(&self, username: &str) -> Option<AuthRecord>;
}

/// Host session liveness the continuity check consults.
pub trait SessionQuery: Send + Sync {
    /// Whether the session identified by `sid` is still active.
    fn has_active_session(&self, username: &str, sid: &str) -> bool;
}

/// Session query for hosts that cannot enumerate sessions. Reports
/// nothing active, which disables the grace window entirely.
pub struct NoSessions;

impl SessionQuery for NoSessions {
    fn has_active_session(&self, _username: &str, _sid: &str) -> bool {
        false
    }
}

/// Session query backed by a fixed set, for hosts that snapshot their
/// session table up front (and for tests).
#[derive(Default)]
pub struct StaticSessions {
    active: Vec<(String, String)>,
}

impl StaticSessions {
    pub fn new(active: Vec<(String, String)>) -> Self {
        Self { active }
    }
}

impl SessionQuery for StaticSessions {
    fn has_active_session(&self, username: &str, sid: &str) -> bool {
        self.active
            .iter()
            .any(|(u, s)| u.eq_ignore_ascii_case(username) && s == sid)
    }
}

/// In-process continuity store. Suits single-process hosts (the PAM
/// module forks per login, so this only helps tests and long-lived
/// daemons).
#[derive(Default)]
pub struct MemoryContinuityStore {
    records: RwLock<HashMap<String, AuthRecord>>,
}

#[async_trait]
impl ContinuityStore for MemoryContinuityStore {
    async fn record_auth(&self, username: &str, record: AuthRecord) {
        self.records
            .write()
            .expect("continuity lock poisoned")
            .insert(username.to_string(), record);
    }

    async fn last_auth(&self, username: &str) -> Option<AuthRecord> {
        self.records
            .read()
            .expect("continuity lock poisoned")
            .get(username)
            .cloned()
    }
}

/// File-backed continuity store shared across processes. The whole
/// map is one JSON document; reads and writes go through a mutex so a
/// concurrent login cannot tear it.
pub struct FileContinuityStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileContinuityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn read_map(&self) -> HashMap<String, AuthRecord> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!("continuity file unreadable, starting empty: {e}");
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        }
    }
}

#[async_trait]
impl ContinuityStore for FileContinuityStore {
    async fn record_auth(&self, username: &str, record: AuthRecord) {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await;
        map.insert(username.to_string(), record);
        match serde_json::to_vec(&map) {
            Ok(bytes) => {
                if let Err(e) = tokio::fs::write(&self.path, bytes).await {
                    // Failure to record only costs the user a prompt
                    // next time; it never blocks this login.
                    warn!("cannot write continuity file: {e}");
                }
            }
            Err(e) => warn!("cannot serialize continuity records: {e}"),
        }
    }

    async fn last_auth(&self, username: &str) -> Option<AuthRecord> {
        let _guard = self.lock.lock().await;
        self.read_map().await.get(username).cloned()
    }
}

/// Whether a recorded authentication still grants continuity.
///
/// All three must hold: the window is enabled, the record is fresh,
/// and the recorded session is still active. A zero window always
/// refuses.
pub fn within_grace_window(
    record: &AuthRecord,
    grace_window_minutes: u64,
    now_minute: u64,
    username: &str,
    sessions: &dyn SessionQuery,
) -> bool {
    if grace_window_minutes == 0 {
        return false;
    }
    // A record from the future means the clock moved; treat as stale.
    let age = match now_minute.checked_sub(record.minute) {
        Some(age) => age,
        None => return false,
    };
    if age >= grace_window_minutes {
        return false;
    }
    sessions.has_active_session(username, &record.sid)
}
