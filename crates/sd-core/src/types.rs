//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a remote managed instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub String);

impl InstanceId {
    /// Create a new instance ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the ID is empty (an empty target is never valid)
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for InstanceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for InstanceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Kind of session, with the parameters specific to each variant.
///
/// The variant carries its own parameters so that a record can only be
/// constructed with the fields its kind requires: a host forward always
/// has a remote host and port, an interactive SSH session never does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionKind {
    /// Interactive shell in a visible console window
    Ssh,
    /// Remote desktop: hidden forwarder to port 3389 plus a viewer
    Rdp,
    /// Forward a local port to a port on the instance itself
    CustomPortForward {
        /// Remote port on the instance
        remote_port: u16,
    },
    /// Forward a local port to a host reachable from the instance
    HostPortForward {
        /// Remote host to reach through the instance
        remote_host: String,
        /// Port on the remote host
        remote_port: u16,
    },
}

impl SessionKind {
    /// Short label used in logs and session listings
    pub fn label(&self) -> &'static str {
        match self {
            SessionKind::Ssh => "SSH",
            SessionKind::Rdp => "RDP",
            SessionKind::CustomPortForward { .. } => "Custom",
            SessionKind::HostPortForward { .. } => "Host",
        }
    }

    /// Whether this kind forwards a local port
    pub fn forwards_port(&self) -> bool {
        !matches!(self, SessionKind::Ssh)
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::Ssh => write!(f, "SSH"),
            SessionKind::Rdp => write!(f, "RDP"),
            SessionKind::CustomPortForward { remote_port } => {
                write!(f, "Custom (remote port {})", remote_port)
            }
            SessionKind::HostPortForward {
                remote_host,
                remote_port,
            } => write!(f, "Host ({}:{})", remote_host, remote_port),
        }
    }
}

/// One row of the managed-instance list shown by the panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSummary {
    /// Instance ID
    pub id: InstanceId,
    /// Name tag, or "N/A" when untagged
    pub name: String,
    /// Instance type (e.g. "t3.micro")
    pub instance_type: String,
    /// Operating system / platform details
    pub os: String,
    /// Lifecycle state reported by the provider (e.g. "running")
    pub state: String,
    /// Whether the instance is reachable through the session broker
    pub session_capable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_id_display() {
        let id = InstanceId::new("i-0123456789abcdef0");
        assert_eq!(format!("{}", id), "i-0123456789abcdef0");
        assert!(!id.is_empty());
        assert!(InstanceId::new("").is_empty());
    }

    #[test]
    fn test_session_kind_labels() {
        assert_eq!(SessionKind::Ssh.label(), "SSH");
        assert_eq!(
            SessionKind::HostPortForward {
                remote_host: "db.internal".to_string(),
                remote_port: 5432,
            }
            .label(),
            "Host"
        );
    }

    #[test]
    fn test_session_kind_forwards_port() {
        assert!(!SessionKind::Ssh.forwards_port());
        assert!(SessionKind::Rdp.forwards_port());
        assert!(SessionKind::CustomPortForward { remote_port: 80 }.forwards_port());
    }
}
