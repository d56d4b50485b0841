//! Session lifecycle manager
//!
//! Front door for everything session-shaped: launches go through the
//! launcher and end in the registry, disconnects go through the
//! terminator and end with a removal. The manager owns the session ID
//! counter and is the only component that emits start/end notifications
//! for operations it drives; deaths it did not cause are the liveness
//! monitor's to report.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use sd_core::error::DockError;
use sd_core::events::{PanelEvent, SessionSummary};
use sd_core::types::{InstanceId, SessionKind};

use crate::launcher::Launcher;
use crate::registry::{SessionId, SessionRegistry};
use crate::terminate::Terminator;

/// Coordinates session launch, tracking and teardown
pub struct LifecycleManager {
    registry: Arc<SessionRegistry>,
    launcher: Launcher,
    terminator: Terminator,
    events: mpsc::UnboundedSender<PanelEvent>,
    next_id: AtomicU32,
}

impl LifecycleManager {
    /// Create a manager around an existing registry and event channel
    pub fn new(
        registry: Arc<SessionRegistry>,
        launcher: Launcher,
        terminator: Terminator,
        events: mpsc::UnboundedSender<PanelEvent>,
    ) -> Self {
        Self {
            registry,
            launcher,
            terminator,
            events,
            next_id: AtomicU32::new(1),
        }
    }

    /// The registry this manager feeds (shared with the monitor)
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Launch a session and start tracking it.
    ///
    /// On success the new session is in the registry and a started
    /// notification has been sent. On failure nothing is tracked.
    pub async fn launch(
        &self,
        instance_id: InstanceId,
        kind: SessionKind,
    ) -> Result<SessionSummary, DockError> {
        let id = SessionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let record = Arc::new(self.launcher.launch(id, instance_id, kind).await?);

        let summary = record.summary();
        if !self.registry.insert(Arc::clone(&record)) {
            // Cannot track it, so do not leave it running
            record.start_kill().await;
            return Err(DockError::Io(std::io::Error::other(format!(
                "refused to track {} (pid {})",
                id,
                record.root_pid()
            ))));
        }

        let _ = self.events.send(PanelEvent::SessionStarted(summary.clone()));
        Ok(summary)
    }

    /// Disconnect one session.
    ///
    /// Idempotent: an unknown or already-removed ID is success. A root
    /// process that survives the forced kill stays in the registry and
    /// surfaces as an error.
    pub async fn disconnect(&self, id: SessionId) -> Result<(), DockError> {
        let Some(record) = self.registry.get(id) else {
            tracing::debug!("{} not tracked, nothing to disconnect", id);
            return Ok(());
        };

        self.terminator.terminate(&record).await?;

        // Single-winner removal; the monitor may have beaten us to it
        if self.registry.remove(id).is_some() {
            let _ = self.events.send(PanelEvent::SessionEnded(record.summary()));
        }
        Ok(())
    }

    /// Disconnect every tracked session, best effort.
    ///
    /// Returns the number of sessions that failed to terminate; each
    /// failure is logged and the survivor stays tracked.
    pub async fn disconnect_all(&self) -> usize {
        let mut failures = 0;
        for record in self.registry.snapshot() {
            if let Err(e) = self.disconnect(record.id).await {
                tracing::error!("Failed to disconnect {}: {}", record.id, e);
                failures += 1;
            }
        }
        failures
    }

    /// Summaries of all tracked sessions, newest last
    pub fn list(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<_> = self
            .registry
            .snapshot()
            .iter()
            .map(|r| r.summary())
            .collect();
        summaries.sort_by_key(|s| s.id);
        summaries
    }
}
