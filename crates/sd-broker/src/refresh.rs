//! Background instance-list refresh
//!
//! Keeps the managed-instance list current with a periodic fetch, plus
//! an on-demand nudge for when the user hits refresh. A fetch that
//! comes back `None` means the connection is gone; the task reports it
//! once and stops, leaving reconnection to the control surface.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use sd_core::events::PanelEvent;

use crate::broker::{BrokerConnection, SessionBroker};

/// Periodic refresh cadence
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Run the refresh loop until `shutdown` is cancelled or the
/// connection breaks. The first tick fires immediately, so the panel
/// gets an instance list as soon as the task starts.
pub async fn run_instance_refresh(
    broker: Arc<dyn SessionBroker>,
    conn: BrokerConnection,
    events: mpsc::UnboundedSender<PanelEvent>,
    mut refresh_now: mpsc::UnboundedReceiver<()>,
    shutdown: CancellationToken,
) {
    run_instance_refresh_every(broker, conn, events, &mut refresh_now, shutdown, REFRESH_INTERVAL)
        .await
}

/// Refresh loop with an explicit cadence (tests shorten it)
pub async fn run_instance_refresh_every(
    broker: Arc<dyn SessionBroker>,
    conn: BrokerConnection,
    events: mpsc::UnboundedSender<PanelEvent>,
    refresh_now: &mut mpsc::UnboundedReceiver<()>,
    shutdown: CancellationToken,
    every: Duration,
) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            nudge = refresh_now.recv() => {
                if nudge.is_none() {
                    tracing::debug!("Refresh nudge channel closed, stopping");
                    return;
                }
            }
            _ = shutdown.cancelled() => {
                tracing::debug!("Instance refresh shutting down");
                return;
            }
        }

        match broker.list_managed_instances(&conn).await {
            Some(instances) => {
                tracing::debug!("Refreshed {} instances", instances.len());
                let _ = events.send(PanelEvent::InstancesUpdated(instances));
            }
            None => {
                tracing::warn!(
                    "Lost connection to the broker (profile {}, region {})",
                    conn.profile,
                    conn.region
                );
                let _ = events.send(PanelEvent::ConnectionBroken {
                    reason: "instance listing failed; credentials may have expired".to_string(),
                });
                return;
            }
        }
    }
}
