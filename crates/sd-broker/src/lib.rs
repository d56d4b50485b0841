//! sd-broker: Cloud API client for the session broker
//!
//! Talks to the brokering service exclusively through its official CLI,
//! behind a trait so the rest of the workspace (and its tests) never
//! depends on the CLI being installed. Also hosts the background
//! instance-list refresh task and the external dependency preflight.

pub mod aws_cli;
pub mod broker;
pub mod preflight;
pub mod refresh;

pub use aws_cli::AwsCliBroker;
pub use broker::{BrokerConnection, SessionBroker};
pub use preflight::check_dependencies;
pub use refresh::{run_instance_refresh, REFRESH_INTERVAL};
