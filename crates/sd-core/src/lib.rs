//! sd-core: Core types and configuration for sessiondock
//!
//! This crate provides the shared domain types, error taxonomy,
//! preferences layer and presentation-layer event types used by the
//! lifecycle manager, the broker client and the CLI.

pub mod error;
pub mod events;
pub mod prefs;
pub mod time;
pub mod types;

pub use error::DockError;
pub use events::{PanelEvent, SessionSummary};
pub use types::{InstanceId, InstanceSummary, SessionKind};
