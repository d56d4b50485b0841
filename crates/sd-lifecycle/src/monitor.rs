//! Background liveness monitor
//!
//! Periodically polls every tracked session process and drops the ones
//! that died on their own (broker timeout, user closing the console,
//! the tunnel falling over). Whichever path removes the record from
//! the registry first, this monitor or an explicit disconnect, is the
//! one that emits the session-ended notification.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use sd_core::events::PanelEvent;

use crate::registry::SessionRegistry;

/// How often tracked processes are polled for liveness
pub const LIVENESS_INTERVAL: Duration = Duration::from_secs(2);

/// Run the liveness monitor until `shutdown` is cancelled.
///
/// Meant to be spawned once next to the registry it watches.
pub async fn run_liveness_monitor(
    registry: Arc<SessionRegistry>,
    events: mpsc::UnboundedSender<PanelEvent>,
    shutdown: CancellationToken,
) {
    run_liveness_monitor_every(registry, events, shutdown, LIVENESS_INTERVAL).await
}

/// Monitor loop with an explicit poll interval (tests shorten it)
pub async fn run_liveness_monitor_every(
    registry: Arc<SessionRegistry>,
    events: mpsc::UnboundedSender<PanelEvent>,
    shutdown: CancellationToken,
    every: Duration,
) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                sweep(&registry, &events).await;
            }
            _ = shutdown.cancelled() => {
                tracing::debug!("Liveness monitor shutting down");
                return;
            }
        }
    }
}

/// One poll pass over the registry
async fn sweep(registry: &SessionRegistry, events: &mpsc::UnboundedSender<PanelEvent>) {
    for record in registry.snapshot() {
        if !record.poll_exited().await {
            continue;
        }
        // Single-winner removal; a racing disconnect already notified
        if registry.remove(record.id).is_some() {
            tracing::info!(
                "{} (pid {}) exited on its own",
                record.id,
                record.root_pid()
            );
            let _ = events.send(PanelEvent::SessionEnded(record.summary()));
        }
    }
}
