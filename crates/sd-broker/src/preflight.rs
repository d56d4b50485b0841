//! External dependency preflight
//!
//! Sessions cannot work without the broker CLI and its session plugin,
//! so both are probed once at startup instead of failing obscurely at
//! first launch.

use std::process::Stdio;

use tokio::process::Command;

use sd_core::error::LaunchError;

/// Required external programs with their install hints
const REQUIRED: &[(&str, &str)] = &[
    ("aws", "install the AWS CLI v2 from https://aws.amazon.com/cli/"),
    (
        "session-manager-plugin",
        "install the Session Manager plugin from \
         https://docs.aws.amazon.com/systems-manager/latest/userguide/session-manager-working-with-install-plugin.html",
    ),
];

/// Verify every required external program can be started.
///
/// The probe only cares that the program exists on PATH and executes;
/// exit codes are ignored because both tools exit non-zero on bare
/// invocations depending on version.
pub async fn check_dependencies() -> Result<(), LaunchError> {
    let mut missing = Vec::new();
    for (program, hint) in REQUIRED {
        if !probe(program).await {
            tracing::error!("Required program {} not found on PATH", program);
            missing.push(format!("{program} ({hint})"));
        }
    }

    if missing.is_empty() {
        tracing::debug!("All external dependencies present");
        Ok(())
    } else {
        Err(LaunchError::MissingDependency(missing.join("; ")))
    }
}

async fn probe(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_probe_finds_a_real_program() {
        // Something guaranteed to exist wherever the tests run
        #[cfg(unix)]
        assert!(probe("sh").await);
        #[cfg(windows)]
        assert!(probe("cmd.exe").await);
    }

    #[tokio::test]
    async fn test_probe_rejects_a_missing_program() {
        assert!(!probe("definitely-not-a-real-broker-cli").await);
    }
}
