//! Error taxonomy for sessiondock
//!
//! Errors are split the way they propagate: validation failures never
//! produce a session record, launch failures surface the spawn cause,
//! and the only termination failure a caller ever sees is a root
//! process that survived a forced kill. Processes that vanish while
//! being terminated are success, not errors, and never appear here.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the sessiondock ecosystem
#[derive(Error, Debug)]
pub enum DockError {
    /// Parameter validation failed before anything was spawned
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Launching the external session process failed
    #[error("Launch error: {0}")]
    Launch(#[from] LaunchError),

    /// Termination failure
    #[error("Termination error: {0}")]
    Termination(#[from] TerminationError),

    /// Broker (cloud API) error
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    /// Preferences error
    #[error("Preferences error: {0}")]
    Prefs(#[from] PrefsError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bad parameters, rejected before spawn
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Instance ID must not be empty
    #[error("Instance ID must not be empty")]
    EmptyInstanceId,

    /// Remote host must not be empty for host forwards
    #[error("Remote host must not be empty")]
    EmptyRemoteHost,

    /// Remote port must be in 1-65535
    #[error("Remote port must be in 1-65535")]
    InvalidRemotePort,
}

/// Spawning the external session process failed
#[derive(Error, Debug)]
pub enum LaunchError {
    /// The broker CLI or plugin could not be executed
    #[error("Failed to spawn {command}: {source}")]
    Spawn {
        /// Command that failed to start
        command: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// A required external dependency is missing or broken
    #[error("Missing external dependency: {0}")]
    MissingDependency(String),

    /// No free local port in the configured range
    #[error("No free port in {start}-{end} after {attempts} attempts")]
    PortRangeExhausted {
        /// Start of the configured range
        start: u16,
        /// End of the configured range
        end: u16,
        /// Number of bind probes performed
        attempts: u32,
    },
}

/// Termination-path errors surfaced to the user
#[derive(Error, Debug)]
pub enum TerminationError {
    /// The root process is still running after a forced kill
    #[error("Process {pid} survived forced termination")]
    RootSurvived {
        /// Root process ID
        pid: u32,
    },
}

/// Cloud API client errors
#[derive(Error, Debug)]
pub enum BrokerError {
    /// The named credential profile does not exist
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    /// Authentication or connection failure
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Credentials expired or the connection went away mid-session
    #[error("Connection broken: {0}")]
    ConnectionBroken(String),

    /// The broker CLI produced output we could not parse
    #[error("Unexpected broker output: {0}")]
    UnexpectedOutput(String),
}

/// Preferences-related errors
#[derive(Error, Debug)]
pub enum PrefsError {
    /// Preferences file exists but could not be read
    #[error("Failed to read preferences {0}")]
    Unreadable(PathBuf),

    /// JSON parse error
    #[error("Preferences parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Preferences could not be written
    #[error("Failed to write preferences {path}: {source}")]
    Write {
        /// Target path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
}
