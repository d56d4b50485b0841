//! Launching session processes through the broker CLI
//!
//! Every session is backed by one `aws ssm start-session` invocation.
//! Forwarding kinds run it hidden with detached stdio; interactive SSH
//! gets a visible console. RDP is a forwarding session to port 3389
//! plus a fire-and-forget desktop viewer pointed at the local end.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use sd_core::error::{DockError, LaunchError, ValidationError};
use sd_core::prefs::PortRange;
use sd_core::types::{InstanceId, SessionKind};

use crate::port::alloc_port;
use crate::process::{SessionProcess, TokioProcess};
use crate::registry::{SessionId, SessionRecord};

/// Remote desktop port on the instance
const RDP_PORT: u16 = 3389;

/// Time given to the forwarder to establish before the viewer connects
const RDP_ESTABLISH_GRACE: Duration = Duration::from_secs(2);

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;
#[cfg(windows)]
const CREATE_NEW_CONSOLE: u32 = 0x0000_0010;

/// Reject parameters that can never produce a working session
pub fn validate(instance_id: &InstanceId, kind: &SessionKind) -> Result<(), ValidationError> {
    if instance_id.is_empty() {
        return Err(ValidationError::EmptyInstanceId);
    }
    match kind {
        SessionKind::CustomPortForward { remote_port } if *remote_port == 0 => {
            Err(ValidationError::InvalidRemotePort)
        }
        SessionKind::HostPortForward { remote_host, .. } if remote_host.trim().is_empty() => {
            Err(ValidationError::EmptyRemoteHost)
        }
        SessionKind::HostPortForward { remote_port, .. } if *remote_port == 0 => {
            Err(ValidationError::InvalidRemotePort)
        }
        _ => Ok(()),
    }
}

/// Build the broker CLI argument list for a session.
///
/// `local_port` must be `Some` for every forwarding kind and is ignored
/// for interactive SSH, which lets the broker pick its own plumbing.
/// A forwarding kind without a port is a caller bug and panics rather
/// than producing a command line that forwards to port 0.
pub fn session_args(
    profile: &str,
    region: &str,
    instance_id: &InstanceId,
    kind: &SessionKind,
    local_port: Option<u16>,
) -> Vec<String> {
    let mut args = vec![
        "ssm".to_string(),
        "start-session".to_string(),
        "--target".to_string(),
        instance_id.as_str().to_string(),
    ];

    match kind {
        SessionKind::Ssh => {}
        SessionKind::Rdp => {
            push_port_forward(&mut args, RDP_PORT, require_port(local_port));
        }
        SessionKind::CustomPortForward { remote_port } => {
            push_port_forward(&mut args, *remote_port, require_port(local_port));
        }
        SessionKind::HostPortForward {
            remote_host,
            remote_port,
        } => {
            args.push("--document-name".to_string());
            args.push("AWS-StartPortForwardingSessionToRemoteHost".to_string());
            args.push("--parameters".to_string());
            args.push(format!(
                "host={},portNumber={},localPortNumber={}",
                remote_host,
                remote_port,
                require_port(local_port)
            ));
        }
    }

    args.push("--region".to_string());
    args.push(region.to_string());
    args.push("--profile".to_string());
    args.push(profile.to_string());
    args
}

fn require_port(local_port: Option<u16>) -> u16 {
    local_port.expect("forwarding kinds are launched with an allocated local port")
}

fn push_port_forward(args: &mut Vec<String>, remote_port: u16, local_port: u16) {
    args.push("--document-name".to_string());
    args.push("AWS-StartPortForwardingSession".to_string());
    args.push("--parameters".to_string());
    args.push(format!(
        "portNumber={},localPortNumber={}",
        remote_port, local_port
    ));
}

/// Spawns session processes configured from the active preferences
pub struct Launcher {
    profile: String,
    region: String,
    port_range: PortRange,
    broker_program: String,
}

impl Launcher {
    /// Create a launcher for a credential profile and region
    pub fn new(profile: impl Into<String>, region: impl Into<String>, port_range: PortRange) -> Self {
        Self {
            profile: profile.into(),
            region: region.into(),
            port_range,
            broker_program: "aws".to_string(),
        }
    }

    /// Override the broker CLI program name (used by tests)
    pub fn with_broker_program(mut self, program: impl Into<String>) -> Self {
        self.broker_program = program.into();
        self
    }

    /// Launch a session of the given kind against an instance.
    ///
    /// Allocates a local port for forwarding kinds, spawns the broker
    /// process and returns the record ready for registration. For RDP
    /// the forwarder gets a short grace period before the desktop
    /// viewer is pointed at the local port; a viewer that fails to
    /// start leaves the forwarder running so the user can retry.
    pub async fn launch(
        &self,
        id: SessionId,
        instance_id: InstanceId,
        kind: SessionKind,
    ) -> Result<SessionRecord, DockError> {
        validate(&instance_id, &kind)?;

        let local_port = if kind.forwards_port() {
            Some(alloc_port(self.port_range)?)
        } else {
            None
        };

        let args = session_args(&self.profile, &self.region, &instance_id, &kind, local_port);

        let child = match kind {
            SessionKind::Ssh => self.spawn_console(&args)?,
            _ => self.spawn_hidden(&args)?,
        };
        let process = TokioProcess::new(child).map_err(|source| LaunchError::Spawn {
            command: self.broker_program.clone(),
            source,
        })?;

        tracing::info!(
            "Launched {} {} session for {} (pid {}, local port {:?})",
            id,
            kind.label(),
            instance_id,
            process.pid(),
            local_port
        );

        if matches!(kind, SessionKind::Rdp) {
            tokio::time::sleep(RDP_ESTABLISH_GRACE).await;
            // Guaranteed Some: RDP is a forwarding kind
            if let Some(port) = local_port {
                self.spawn_rdp_viewer(port);
            }
        }

        Ok(SessionRecord::new(
            id,
            instance_id,
            kind,
            local_port,
            Box::new(process),
        ))
    }

    /// Spawn the broker CLI with no console and detached stdio
    fn spawn_hidden(&self, args: &[String]) -> Result<tokio::process::Child, LaunchError> {
        let mut cmd = Command::new(&self.broker_program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        cmd.spawn().map_err(|source| LaunchError::Spawn {
            command: self.broker_program.clone(),
            source,
        })
    }

    /// Spawn the broker CLI attached to a console the user can type in
    #[cfg(windows)]
    fn spawn_console(&self, args: &[String]) -> Result<tokio::process::Child, LaunchError> {
        // /K keeps the console open after the session ends so the user
        // can read any final broker output
        let mut cmd = Command::new("cmd.exe");
        cmd.arg("/K").arg(&self.broker_program).args(args);
        cmd.creation_flags(CREATE_NEW_CONSOLE);
        cmd.spawn().map_err(|source| LaunchError::Spawn {
            command: "cmd.exe".to_string(),
            source,
        })
    }

    #[cfg(not(windows))]
    fn spawn_console(&self, args: &[String]) -> Result<tokio::process::Child, LaunchError> {
        let mut cmd = Command::new(&self.broker_program);
        cmd.args(args);
        cmd.spawn().map_err(|source| LaunchError::Spawn {
            command: self.broker_program.clone(),
            source,
        })
    }

    /// Start the desktop viewer against the forwarded local port.
    ///
    /// The viewer is not part of the session's process tree: it lives
    /// and dies on its own, so we only reap it in the background.
    fn spawn_rdp_viewer(&self, local_port: u16) {
        let target = format!("localhost:{local_port}");
        #[cfg(windows)]
        let mut cmd = {
            let mut cmd = Command::new("mstsc");
            cmd.arg(format!("/v:{target}"));
            cmd
        };
        #[cfg(not(windows))]
        let mut cmd = {
            let mut cmd = Command::new("xfreerdp");
            cmd.arg(format!("/v:{target}"));
            cmd
        };

        match cmd.spawn() {
            Ok(mut child) => {
                tokio::spawn(async move {
                    let _ = child.wait().await;
                });
            }
            Err(e) => {
                tracing::warn!("Failed to start desktop viewer for {}: {}", target, e);
            }
        }
    }
}
