//! Events emitted to the presentation layer
//!
//! The core never touches UI state directly. Background work posts
//! `PanelEvent`s over a channel and the presentation side applies them
//! on its own thread of control.

use serde::{Deserialize, Serialize};

use crate::types::{InstanceId, InstanceSummary, SessionKind};

/// Plain-data projection of a session record.
///
/// Records own their process handle exclusively and cannot be cloned,
/// so notifications carry this summary instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session ID
    pub id: u32,
    /// Target instance
    pub instance_id: InstanceId,
    /// Session kind with its parameters
    pub kind: SessionKind,
    /// Forwarded local port, if the kind forwards one
    pub local_port: Option<u16>,
    /// Creation time, milliseconds since the Unix epoch (display only)
    pub created_at_ms: u64,
}

/// Notification from the core to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEvent {
    /// The managed-instance list was refreshed
    InstancesUpdated(Vec<InstanceSummary>),

    /// The cloud connection is no longer usable (e.g. expired credentials)
    ConnectionBroken {
        /// Human-readable reason
        reason: String,
    },

    /// A session was launched and inserted into the registry
    SessionStarted(SessionSummary),

    /// A session ended (user request, bulk disconnect, or process exit)
    SessionEnded(SessionSummary),

    /// A user-facing error message
    Error {
        /// Human-readable message
        message: String,
    },
}
