//! External dependency check

use anyhow::Result;

use sd_broker::check_dependencies;

use crate::output::{print_error, print_success};

/// Verify the broker CLI and session plugin are installed
pub async fn doctor_command() -> Result<()> {
    match check_dependencies().await {
        Ok(()) => {
            print_success("All external dependencies present");
            Ok(())
        }
        Err(e) => {
            print_error(&format!("Missing dependencies: {e}"));
            Err(e.into())
        }
    }
}
