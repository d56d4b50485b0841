//! sd-lifecycle: Session lifecycle manager
//!
//! Creates, tracks, monitors and tears down the external OS processes
//! that back forwarded sessions. The registry is the single shared
//! mutable resource; every component reaches a process handle either
//! through the registry or by owning a record it just created.

pub mod launcher;
pub mod manager;
pub mod monitor;
pub mod port;
pub mod process;
pub mod registry;
pub mod terminate;

pub use launcher::Launcher;
pub use manager::LifecycleManager;
pub use monitor::{run_liveness_monitor, LIVENESS_INTERVAL};
pub use port::alloc_port;
pub use process::{SessionProcess, TokioProcess};
pub use registry::{SessionId, SessionRecord, SessionRegistry};
pub use terminate::{ProcessTree, SystemProcessTree, Terminator};
