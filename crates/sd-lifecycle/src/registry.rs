//! Session records and the active-session registry
//!
//! The registry is the authoritative collection of live sessions. A
//! record exists in it exactly as long as its process was believed
//! running at the last check; termination flows and the liveness
//! monitor both funnel removals through [`SessionRegistry::remove`],
//! whose single atomic removal decides which racing path gets to emit
//! the "session ended" notification.

use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

use sd_core::events::SessionSummary;
use sd_core::time::current_time_millis;
use sd_core::types::{InstanceId, SessionKind};

use crate::process::SessionProcess;

/// Unique identifier for a tracked session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u32);

impl SessionId {
    /// Create a new session ID
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// One active forwarded or interactive session.
///
/// The record owns the spawned process exclusively; no other component
/// holds a terminating reference to the same process.
pub struct SessionRecord {
    /// Session ID
    pub id: SessionId,
    /// Target instance
    pub instance_id: InstanceId,
    /// Session kind with its parameters
    pub kind: SessionKind,
    /// Forwarded local port (`None` for interactive SSH)
    pub local_port: Option<u16>,
    /// Creation time in milliseconds since the Unix epoch (display only)
    pub created_at_ms: u64,

    root_pid: u32,
    process: Mutex<Box<dyn SessionProcess>>,
}

impl SessionRecord {
    /// Create a record for a freshly spawned process
    pub fn new(
        id: SessionId,
        instance_id: InstanceId,
        kind: SessionKind,
        local_port: Option<u16>,
        process: Box<dyn SessionProcess>,
    ) -> Self {
        let root_pid = process.pid();
        Self {
            id,
            instance_id,
            kind,
            local_port,
            created_at_ms: current_time_millis(),
            root_pid,
            process: Mutex::new(process),
        }
    }

    /// OS process ID of the root process
    pub fn root_pid(&self) -> u32 {
        self.root_pid
    }

    /// Plain-data projection for notifications and listings
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.as_u32(),
            instance_id: self.instance_id.clone(),
            kind: self.kind.clone(),
            local_port: self.local_port,
            created_at_ms: self.created_at_ms,
        }
    }

    /// Non-blocking liveness poll.
    ///
    /// Reports `false` while a termination flow holds the process lock:
    /// the record is still tracked and the terminating path will decide
    /// its fate.
    pub async fn poll_exited(&self) -> bool {
        let Ok(mut process) = self.process.try_lock() else {
            return false;
        };
        match process.try_wait().await {
            Ok(exit) => exit.is_some(),
            Err(e) => {
                tracing::warn!("Failed to poll {}: {}", self.id, e);
                false
            }
        }
    }

    /// Wait up to `timeout` for the process to exit.
    ///
    /// Returns `true` once the process has exited.
    pub async fn wait_exit(&self, timeout: std::time::Duration) -> bool {
        let mut process = self.process.lock().await;
        match tokio::time::timeout(timeout, process.wait()).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                // A wait error means there is nothing left to reap
                tracing::warn!("Failed to wait on {}: {}", self.id, e);
                true
            }
            Err(_) => false,
        }
    }

    /// Begin forced termination of the root process
    pub async fn start_kill(&self) {
        let mut process = self.process.lock().await;
        if let Err(e) = process.start_kill().await {
            tracing::warn!("Failed to kill {} (pid {}): {}", self.id, self.root_pid, e);
        }
    }
}

impl fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRecord")
            .field("id", &self.id)
            .field("instance_id", &self.instance_id)
            .field("kind", &self.kind)
            .field("local_port", &self.local_port)
            .field("root_pid", &self.root_pid)
            .finish()
    }
}

/// Authoritative collection of active sessions
pub struct SessionRegistry {
    /// Records indexed by session ID
    sessions: DashMap<SessionId, Arc<SessionRecord>>,
}

impl SessionRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Insert a record. Never overwrites: refuses (with a log, not a
    /// panic) if the session ID or the root process is already tracked.
    pub fn insert(&self, record: Arc<SessionRecord>) -> bool {
        if self.sessions.contains_key(&record.id) {
            tracing::error!("Refusing to overwrite tracked {}", record.id);
            return false;
        }
        if self
            .sessions
            .iter()
            .any(|r| r.root_pid() == record.root_pid())
        {
            tracing::error!(
                "Refusing to track pid {} twice (new {})",
                record.root_pid(),
                record.id
            );
            return false;
        }
        self.sessions.insert(record.id, record);
        true
    }

    /// Remove a record by identity.
    ///
    /// Tolerates double removal from racing termination paths: returns
    /// `None` with a warning if the record is already gone, and exactly
    /// one of the racing callers observes `Some`.
    pub fn remove(&self, id: SessionId) -> Option<Arc<SessionRecord>> {
        match self.sessions.remove(&id) {
            Some((_, record)) => Some(record),
            None => {
                tracing::warn!("{} already removed from registry", id);
                None
            }
        }
    }

    /// Get a record by ID
    pub fn get(&self, id: SessionId) -> Option<Arc<SessionRecord>> {
        self.sessions.get(&id).map(|r| Arc::clone(&r))
    }

    /// Immutable snapshot of current records, safe to iterate while the
    /// registry is mutated concurrently
    pub fn snapshot(&self) -> Vec<Arc<SessionRecord>> {
        self.sessions.iter().map(|r| Arc::clone(&r)).collect()
    }

    /// Number of active sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
