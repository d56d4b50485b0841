//! Ownership seam over a spawned OS process
//!
//! A session record owns exactly one `SessionProcess`. The trait keeps
//! the lifecycle logic independent of how the process was spawned, so
//! tests can substitute an instrumented fake for a real child process.

use async_trait::async_trait;
use std::io;

use tokio::process::Child;

/// Handle to a spawned session process, owned exclusively by one record
#[async_trait]
pub trait SessionProcess: Send + Sync {
    /// OS process ID of the root process
    fn pid(&self) -> u32;

    /// Non-blocking liveness poll.
    ///
    /// Returns `Some(code)` once the process has exited. A process
    /// terminated by a signal reports code -1.
    async fn try_wait(&mut self) -> io::Result<Option<i32>>;

    /// Wait for the process to exit and return its exit code
    async fn wait(&mut self) -> io::Result<i32>;

    /// Begin forced termination (no grace); does not reap the process
    async fn start_kill(&mut self) -> io::Result<()>;
}

/// `SessionProcess` backed by a `tokio::process::Child`
pub struct TokioProcess {
    pid: u32,
    child: Child,
}

impl TokioProcess {
    /// Wrap a freshly spawned child.
    ///
    /// Fails if the child has no PID, which means it already exited
    /// before we could observe it.
    pub fn new(child: Child) -> io::Result<Self> {
        let pid = child.id().ok_or_else(|| {
            io::Error::new(io::ErrorKind::Other, "spawned process exited before tracking")
        })?;
        Ok(Self { pid, child })
    }
}

fn exit_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

#[async_trait]
impl SessionProcess for TokioProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    async fn try_wait(&mut self) -> io::Result<Option<i32>> {
        Ok(self.child.try_wait()?.map(exit_code))
    }

    async fn wait(&mut self) -> io::Result<i32> {
        self.child.wait().await.map(exit_code)
    }

    async fn start_kill(&mut self) -> io::Result<()> {
        match self.child.start_kill() {
            Ok(()) => Ok(()),
            // Already reaped: nothing left to kill
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tokio::process::Command;

    fn spawn_sleep() -> Child {
        Command::new("sleep")
            .arg("60")
            .spawn()
            .expect("spawn sleep")
    }

    #[tokio::test]
    async fn test_running_process_reports_no_exit() {
        let mut proc = TokioProcess::new(spawn_sleep()).unwrap();
        assert!(proc.pid() > 0);
        assert_eq!(proc.try_wait().await.unwrap(), None);

        proc.start_kill().await.unwrap();
        proc.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_killed_process_reports_signal_exit() {
        let mut proc = TokioProcess::new(spawn_sleep()).unwrap();
        proc.start_kill().await.unwrap();
        let code = proc.wait().await.unwrap();
        assert_eq!(code, -1);
    }

    #[tokio::test]
    async fn test_exited_process_reports_code() {
        let child = Command::new("true").spawn().expect("spawn true");
        let mut proc = TokioProcess::new(child).unwrap();
        let code = proc.wait().await.unwrap();
        assert_eq!(code, 0);
        // Further polls keep reporting the exit
        assert_eq!(proc.try_wait().await.unwrap(), Some(0));
    }
}
