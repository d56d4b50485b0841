//! Session launch command
//!
//! Launches one session and stays in the foreground for its lifetime,
//! the way the graphical panel would: the liveness monitor runs
//! alongside, events stream to the terminal, and Ctrl+C tears every
//! tracked session down before exiting.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use sd_broker::check_dependencies;
use sd_core::events::PanelEvent;
use sd_core::prefs::Preferences;
use sd_core::types::{InstanceId, SessionKind};
use sd_lifecycle::{
    run_liveness_monitor, Launcher, LifecycleManager, SessionRegistry, SystemProcessTree,
    Terminator,
};

use crate::commands::instances::resolve_target;
use crate::output::{format_sessions, print_error, print_info, print_success, print_warning};

/// Launch a session and run it until it ends or the user interrupts
pub async fn session_command(
    prefs: &Preferences,
    prefs_path: &Path,
    profile: Option<&str>,
    region: Option<&str>,
    instance: &str,
    kind: SessionKind,
) -> Result<()> {
    check_dependencies()
        .await
        .context("External dependency check failed")?;

    let (profile, region) = resolve_target(prefs, profile, region)?;

    let registry = Arc::new(SessionRegistry::new());
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let shutdown = CancellationToken::new();

    let launcher = Launcher::new(profile.clone(), region.clone(), prefs.port_range);
    let terminator = Terminator::new(Arc::new(SystemProcessTree::new()));
    let monitor_tx = events_tx.clone();
    let manager = LifecycleManager::new(Arc::clone(&registry), launcher, terminator, events_tx);

    let monitor = tokio::spawn(run_liveness_monitor(
        Arc::clone(&registry),
        monitor_tx,
        shutdown.clone(),
    ));

    let summary = manager
        .launch(InstanceId::new(instance), kind)
        .await
        .with_context(|| format!("Failed to launch session to {instance}"))?;

    match summary.local_port {
        Some(port) => print_success(&format!(
            "{} session to {} ready on localhost:{}",
            summary.kind.label(),
            summary.instance_id,
            port
        )),
        None => print_success(&format!(
            "{} session to {} started",
            summary.kind.label(),
            summary.instance_id
        )),
    }
    println!("{}", format_sessions(&manager.list()));
    print_info("Press Ctrl+C to disconnect");

    save_target(prefs, prefs_path, profile, region);

    // Foreground loop: stream events until our session ends or Ctrl+C
    loop {
        tokio::select! {
            event = events_rx.recv() => {
                match event {
                    Some(PanelEvent::SessionEnded(ended)) => {
                        print_warning(&format!(
                            "{} session to {} ended",
                            ended.kind.label(),
                            ended.instance_id
                        ));
                        if ended.id == summary.id {
                            break;
                        }
                    }
                    Some(PanelEvent::Error { message }) => print_error(&message),
                    Some(_) => {}
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                print_info("Disconnecting...");
                break;
            }
        }
    }

    shutdown.cancel();
    let failures = manager.disconnect_all().await;
    if failures > 0 {
        print_error(&format!("{failures} session(s) could not be terminated"));
    } else {
        print_success("All sessions disconnected");
    }
    monitor.await.ok();
    Ok(())
}

fn save_target(prefs: &Preferences, prefs_path: &Path, profile: String, region: String) {
    let mut updated = prefs.clone();
    updated.profile = profile;
    updated.region = region;
    if let Err(e) = updated.save(prefs_path) {
        tracing::warn!("Could not save preferences: {}", e);
    }
}
