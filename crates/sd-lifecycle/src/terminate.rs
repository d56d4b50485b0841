//! Process tree termination
//!
//! Tears down a session's root process and everything it spawned.
//! Children are signalled before the root so the broker process does
//! not orphan its tunnel subprocess, each signalled process gets a
//! bounded grace period before a forced kill, and after a short settle
//! delay any top-level windows still owned by the tree are asked to
//! close. A process that disappears between enumeration and signalling
//! is by definition terminated, so every such error counts as success.

use std::sync::Arc;
use std::time::Duration;

use sd_core::error::TerminationError;

use crate::registry::SessionRecord;

/// Grace period before a signalled process is forcefully killed
pub const DEFAULT_GRACEFUL_TIMEOUT: Duration = Duration::from_secs(5);

/// Delay between forced kill and the window sweep
pub const SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Extra wait for the root to be reaped after a forced kill
const FORCED_REAP_TIMEOUT: Duration = Duration::from_secs(1);

/// Poll interval while waiting for a non-child process to die
const DEATH_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// OS process-tree capability consumed by the terminator.
///
/// The system implementation talks to the real process table; tests
/// substitute an instrumented fake to assert signalling order.
pub trait ProcessTree: Send + Sync {
    /// All descendant PIDs of `pid`, transitively
    fn children_of(&self, pid: u32) -> Vec<u32>;

    /// Request cooperative termination of `pid`.
    ///
    /// Implementations map "no such process" to `Ok`: a vanished
    /// process is a terminated process.
    fn signal_terminate(&self, pid: u32) -> std::io::Result<()>;

    /// Forcefully kill `pid` (no grace)
    fn kill(&self, pid: u32);

    /// Whether `pid` still exists in the process table
    fn is_alive(&self, pid: u32) -> bool;

    /// Ask every top-level window owned by `pid` to close. Best effort;
    /// a window already gone is not an error.
    fn close_windows_of(&self, pid: u32);
}

/// Terminates session process trees
pub struct Terminator {
    tree: Arc<dyn ProcessTree>,
    graceful_timeout: Duration,
    settle_delay: Duration,
}

impl Terminator {
    /// Create a terminator with default timeouts
    pub fn new(tree: Arc<dyn ProcessTree>) -> Self {
        Self::with_timeouts(tree, DEFAULT_GRACEFUL_TIMEOUT, SETTLE_DELAY)
    }

    /// Create a terminator with explicit grace and settle durations
    pub fn with_timeouts(
        tree: Arc<dyn ProcessTree>,
        graceful_timeout: Duration,
        settle_delay: Duration,
    ) -> Self {
        Self {
            tree,
            graceful_timeout,
            settle_delay,
        }
    }

    /// Terminate a record's process tree.
    ///
    /// Idempotent: a process that already exited skips straight to
    /// done. The only surfaced failure is a root process that is still
    /// running after the forced kill.
    pub async fn terminate(&self, record: &SessionRecord) -> Result<(), TerminationError> {
        let root = record.root_pid();

        if record.poll_exited().await {
            tracing::debug!("{} (pid {}) already exited", record.id, root);
            return Ok(());
        }

        let children = self.tree.children_of(root);
        tracing::info!(
            "Terminating {} (pid {}, {} children)",
            record.id,
            root,
            children.len()
        );

        // Children before the root, so the root cannot orphan them
        for &child in &children {
            if let Err(e) = self.tree.signal_terminate(child) {
                tracing::warn!("Failed to signal child {}: {}", child, e);
            }
        }
        if let Err(e) = self.tree.signal_terminate(root) {
            tracing::warn!("Failed to signal root {}: {}", root, e);
        }

        for &child in &children {
            if !self.wait_for_death(child).await {
                tracing::info!("Child {} did not exit in time, killing", child);
                self.tree.kill(child);
            }
        }

        if !record.wait_exit(self.graceful_timeout).await {
            tracing::info!("Root {} did not exit in time, killing", root);
            record.start_kill().await;
            if !record.wait_exit(FORCED_REAP_TIMEOUT).await && self.tree.is_alive(root) {
                return Err(TerminationError::RootSurvived { pid: root });
            }
        }

        tokio::time::sleep(self.settle_delay).await;
        self.tree.close_windows_of(root);

        tracing::info!("Terminated {} (pid {})", record.id, root);
        Ok(())
    }

    /// Poll a non-child process until it disappears or the grace period
    /// runs out. We cannot `wait()` on processes we did not spawn.
    async fn wait_for_death(&self, pid: u32) -> bool {
        let deadline = tokio::time::Instant::now() + self.graceful_timeout;
        while self.tree.is_alive(pid) {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(DEATH_POLL_INTERVAL).await;
        }
        true
    }
}

/// `ProcessTree` backed by the real process table
pub struct SystemProcessTree;

impl SystemProcessTree {
    /// Create a system process tree
    pub fn new() -> Self {
        Self
    }

    fn collect_children(
        system: &sysinfo::System,
        parent: sysinfo::Pid,
        out: &mut Vec<u32>,
    ) {
        for (pid, process) in system.processes() {
            if process.parent() == Some(parent) {
                out.push(pid.as_u32());
                Self::collect_children(system, *pid, out);
            }
        }
    }

    fn refreshed_table() -> sysinfo::System {
        let mut system = sysinfo::System::new();
        system.refresh_processes(sysinfo::ProcessesToUpdate::All, true);
        system
    }
}

impl Default for SystemProcessTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTree for SystemProcessTree {
    fn children_of(&self, pid: u32) -> Vec<u32> {
        let system = Self::refreshed_table();
        let mut children = Vec::new();
        Self::collect_children(&system, sysinfo::Pid::from_u32(pid), &mut children);
        children
    }

    #[cfg(unix)]
    fn signal_terminate(&self, pid: u32) -> std::io::Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(()) => Ok(()),
            // Vanished between enumeration and signalling: terminated
            Err(nix::errno::Errno::ESRCH) => Ok(()),
            Err(e) => Err(std::io::Error::from_raw_os_error(e as i32)),
        }
    }

    #[cfg(windows)]
    fn signal_terminate(&self, pid: u32) -> std::io::Result<()> {
        // Windows has no cooperative termination signal; TerminateProcess
        // is what the grace step amounts to there.
        self.kill(pid);
        Ok(())
    }

    #[cfg(unix)]
    fn kill(&self, pid: u32) {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            if e != nix::errno::Errno::ESRCH {
                tracing::warn!("Failed to kill pid {}: {}", pid, e);
            }
        }
    }

    #[cfg(windows)]
    fn kill(&self, pid: u32) {
        let system = Self::refreshed_table();
        if let Some(process) = system.process(sysinfo::Pid::from_u32(pid)) {
            process.kill();
        }
    }

    #[cfg(unix)]
    fn is_alive(&self, pid: u32) -> bool {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        // Signal 0 probes existence; EPERM still means the process exists
        match kill(Pid::from_raw(pid as i32), None) {
            Ok(()) => true,
            Err(nix::errno::Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    #[cfg(windows)]
    fn is_alive(&self, pid: u32) -> bool {
        use windows_sys::Win32::Foundation::CloseHandle;
        use windows_sys::Win32::System::Threading::{
            OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION,
        };

        unsafe {
            let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid);
            if handle.is_null() {
                return false;
            }
            CloseHandle(handle);
            true
        }
    }

    #[cfg(unix)]
    fn close_windows_of(&self, pid: u32) {
        // No window system tie-in on Unix; console sessions end with
        // their process.
        tracing::trace!("No window sweep for pid {} on this platform", pid);
    }

    #[cfg(windows)]
    fn close_windows_of(&self, pid: u32) {
        use windows_sys::Win32::Foundation::{HWND, LPARAM};
        use windows_sys::Win32::UI::WindowsAndMessaging::{
            EnumWindows, GetWindowThreadProcessId, PostMessageW, WM_CLOSE,
        };

        unsafe extern "system" fn close_if_owned(hwnd: HWND, lparam: LPARAM) -> i32 {
            let target = lparam as u32;
            let mut owner = 0u32;
            GetWindowThreadProcessId(hwnd, &mut owner);
            if owner == target {
                // Best effort; the window may already be gone
                PostMessageW(hwnd, WM_CLOSE, 0, 0);
            }
            1
        }

        unsafe {
            EnumWindows(Some(close_if_owned), pid as LPARAM);
        }
    }
}
