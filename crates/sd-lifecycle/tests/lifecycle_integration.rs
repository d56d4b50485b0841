//! End-to-end lifecycle tests over instrumented process fakes
//!
//! Real broker processes are out of reach in tests, so the process
//! seam and the process-tree seam are both faked: the fakes record
//! every signal so ordering and cleanup guarantees can be asserted.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use sd_core::error::{DockError, TerminationError, ValidationError};
use sd_core::events::PanelEvent;
use sd_core::prefs::PortRange;
use sd_core::types::{InstanceId, SessionKind};
use sd_lifecycle::{
    Launcher, LifecycleManager, ProcessTree, SessionId, SessionProcess, SessionRecord,
    SessionRegistry, Terminator,
};

struct FakeProcess {
    pid: u32,
    exited: Arc<AtomicBool>,
}

#[async_trait]
impl SessionProcess for FakeProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    async fn try_wait(&mut self) -> io::Result<Option<i32>> {
        Ok(self.exited.load(Ordering::SeqCst).then_some(0))
    }

    async fn wait(&mut self) -> io::Result<i32> {
        while !self.exited.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        Ok(0)
    }

    async fn start_kill(&mut self) -> io::Result<()> {
        self.exited.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Process whose root ignores every signal, including the forced kill
struct StubbornProcess {
    pid: u32,
}

#[async_trait]
impl SessionProcess for StubbornProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    async fn try_wait(&mut self) -> io::Result<Option<i32>> {
        Ok(None)
    }

    async fn wait(&mut self) -> io::Result<i32> {
        std::future::pending().await
    }

    async fn start_kill(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct FakeTree {
    children: HashMap<u32, Vec<u32>>,
    /// Pids that shrug off both signals and forced kills
    stubborn: HashSet<u32>,
    signals: Mutex<Vec<u32>>,
    alive: Mutex<HashSet<u32>>,
    exit_flags: Mutex<HashMap<u32, Arc<AtomicBool>>>,
    window_sweeps: Mutex<Vec<u32>>,
}

impl FakeTree {
    fn track(&self, pid: u32, exited: Arc<AtomicBool>) {
        self.alive.lock().unwrap().insert(pid);
        self.exit_flags.lock().unwrap().insert(pid, exited);
    }

    fn signals(&self) -> Vec<u32> {
        self.signals.lock().unwrap().clone()
    }

    fn mark_dead(&self, pid: u32) {
        if self.stubborn.contains(&pid) {
            return;
        }
        self.alive.lock().unwrap().remove(&pid);
        if let Some(flag) = self.exit_flags.lock().unwrap().get(&pid) {
            flag.store(true, Ordering::SeqCst);
        }
    }
}

impl ProcessTree for FakeTree {
    fn children_of(&self, pid: u32) -> Vec<u32> {
        self.children.get(&pid).cloned().unwrap_or_default()
    }

    fn signal_terminate(&self, pid: u32) -> io::Result<()> {
        self.signals.lock().unwrap().push(pid);
        self.mark_dead(pid);
        Ok(())
    }

    fn kill(&self, pid: u32) {
        self.mark_dead(pid);
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.alive.lock().unwrap().contains(&pid)
    }

    fn close_windows_of(&self, pid: u32) {
        self.window_sweeps.lock().unwrap().push(pid);
    }
}

fn fast_terminator(tree: Arc<FakeTree>) -> Terminator {
    Terminator::with_timeouts(tree, Duration::from_millis(200), Duration::from_millis(10))
}

fn fake_record(id: u32, pid: u32, tree: &FakeTree) -> Arc<SessionRecord> {
    let exited = Arc::new(AtomicBool::new(false));
    tree.track(pid, Arc::clone(&exited));
    Arc::new(SessionRecord::new(
        SessionId::new(id),
        InstanceId::new("i-0123456789abcdef0"),
        SessionKind::CustomPortForward { remote_port: 8080 },
        Some(60042),
        Box::new(FakeProcess { pid, exited }),
    ))
}

fn manager_over(
    registry: Arc<SessionRegistry>,
    tree: Arc<FakeTree>,
) -> (LifecycleManager, mpsc::UnboundedReceiver<PanelEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let launcher = Launcher::new("dev", "us-east-1", PortRange::default());
    let manager = LifecycleManager::new(registry, launcher, fast_terminator(tree), tx);
    (manager, rx)
}

#[tokio::test]
async fn test_children_are_signalled_before_the_root() {
    let mut tree = FakeTree::default();
    tree.children.insert(100, vec![201, 202]);
    let tree = Arc::new(tree);

    let record = fake_record(1, 100, &tree);
    tree.track(201, Arc::new(AtomicBool::new(false)));
    tree.track(202, Arc::new(AtomicBool::new(false)));

    fast_terminator(Arc::clone(&tree))
        .terminate(&record)
        .await
        .unwrap();

    assert_eq!(tree.signals(), vec![201, 202, 100]);
    assert_eq!(*tree.window_sweeps.lock().unwrap(), vec![100]);
}

#[tokio::test]
async fn test_terminating_an_exited_process_is_a_no_op() {
    let tree = Arc::new(FakeTree::default());
    let record = fake_record(1, 100, &tree);
    record.start_kill().await;

    fast_terminator(Arc::clone(&tree))
        .terminate(&record)
        .await
        .unwrap();

    assert!(tree.signals().is_empty());
}

#[tokio::test]
async fn test_surviving_root_is_reported() {
    let mut tree = FakeTree::default();
    // Alive in the process table, never flipped by signals or kills
    tree.stubborn.insert(100);
    tree.alive.lock().unwrap().insert(100);
    let tree = Arc::new(tree);

    let record = Arc::new(SessionRecord::new(
        SessionId::new(1),
        InstanceId::new("i-0123456789abcdef0"),
        SessionKind::Rdp,
        Some(60050),
        Box::new(StubbornProcess { pid: 100 }),
    ));

    let err = fast_terminator(Arc::clone(&tree))
        .terminate(&record)
        .await
        .unwrap_err();
    assert!(matches!(err, TerminationError::RootSurvived { pid: 100 }));
}

#[tokio::test]
async fn test_disconnect_all_empties_the_registry() {
    let registry = Arc::new(SessionRegistry::new());
    let tree = Arc::new(FakeTree::default());

    for i in 1..=3 {
        assert!(registry.insert(fake_record(i, 100 + i, &tree)));
    }
    let (manager, mut rx) = manager_over(Arc::clone(&registry), Arc::clone(&tree));

    let failures = manager.disconnect_all().await;

    assert_eq!(failures, 0);
    assert!(registry.is_empty());

    let mut ended = Vec::new();
    while let Ok(event) = rx.try_recv() {
        match event {
            PanelEvent::SessionEnded(summary) => ended.push(summary.id),
            other => panic!("unexpected event: {other:?}"),
        }
    }
    ended.sort_unstable();
    assert_eq!(ended, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_disconnecting_an_unknown_session_is_ok() {
    let registry = Arc::new(SessionRegistry::new());
    let tree = Arc::new(FakeTree::default());
    let (manager, mut rx) = manager_over(registry, tree);

    manager.disconnect(SessionId::new(42)).await.unwrap();
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_disconnect_is_idempotent() {
    let registry = Arc::new(SessionRegistry::new());
    let tree = Arc::new(FakeTree::default());
    registry.insert(fake_record(1, 100, &tree));
    let (manager, mut rx) = manager_over(Arc::clone(&registry), tree);

    manager.disconnect(SessionId::new(1)).await.unwrap();
    manager.disconnect(SessionId::new(1)).await.unwrap();

    assert!(registry.is_empty());
    // Exactly one ended notification despite the double disconnect
    assert!(matches!(
        rx.try_recv().unwrap(),
        PanelEvent::SessionEnded(_)
    ));
    assert!(rx.try_recv().is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn test_launched_forward_is_tracked_then_disconnected() {
    let registry = Arc::new(SessionRegistry::new());
    let tree = Arc::new(FakeTree::default());
    let (tx, mut rx) = mpsc::unbounded_channel();
    // A real short-lived process stands in for the broker CLI
    let launcher =
        Launcher::new("dev", "us-east-1", PortRange::default()).with_broker_program("sleep");
    let manager = LifecycleManager::new(
        Arc::clone(&registry),
        launcher,
        fast_terminator(Arc::clone(&tree)),
        tx,
    );

    let summary = manager
        .launch(
            InstanceId::new("i-0123456789abcdef0"),
            SessionKind::CustomPortForward { remote_port: 8080 },
        )
        .await
        .unwrap();

    assert_eq!(registry.len(), 1);
    assert!(matches!(
        summary.kind,
        SessionKind::CustomPortForward { remote_port: 8080 }
    ));
    let port = summary.local_port.expect("forwarding kinds get a port");
    assert!((60000..=60100).contains(&port));
    assert!(matches!(
        rx.recv().await,
        Some(PanelEvent::SessionStarted(_))
    ));

    let listed = manager.list();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, summary.id);
    assert_eq!(listed[0].local_port, Some(port));

    manager
        .disconnect(SessionId::new(summary.id))
        .await
        .unwrap();
    assert!(registry.is_empty());
    assert!(matches!(rx.recv().await, Some(PanelEvent::SessionEnded(_))));
}

#[tokio::test]
async fn test_launch_rejects_invalid_parameters_before_spawning() {
    let registry = Arc::new(SessionRegistry::new());
    let tree = Arc::new(FakeTree::default());
    let (manager, mut rx) = manager_over(Arc::clone(&registry), tree);

    let err = manager
        .launch(
            InstanceId::new("i-0123456789abcdef0"),
            SessionKind::HostPortForward {
                remote_host: String::new(),
                remote_port: 5432,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DockError::Validation(ValidationError::EmptyRemoteHost)
    ));
    assert!(registry.is_empty());
    assert!(rx.try_recv().is_err());
}
