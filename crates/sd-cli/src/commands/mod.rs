//! CLI command implementations

mod doctor;
mod instances;
mod prefs;
mod session;

pub use doctor::doctor_command;
pub use instances::{instances_command, profiles_command, regions_command};
pub use prefs::{prefs_path, prefs_set, prefs_show};
pub use session::session_command;
