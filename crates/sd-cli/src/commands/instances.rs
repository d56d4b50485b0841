//! Profile, region and instance listing commands

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use sd_broker::{run_instance_refresh, AwsCliBroker, SessionBroker};
use sd_core::events::PanelEvent;
use sd_core::prefs::Preferences;

use crate::output::{format_instances, print_error, print_info, print_success};

/// List the credential profiles configured on this machine
pub fn profiles_command() -> Result<()> {
    let broker = AwsCliBroker::new();
    let profiles = broker.list_profiles().context("Failed to list profiles")?;

    if profiles.is_empty() {
        print_info("No credential profiles found. Run: aws configure");
        return Ok(());
    }
    for profile in profiles {
        println!("{profile}");
    }
    Ok(())
}

/// List the regions the panel offers
pub fn regions_command() -> Result<()> {
    for region in AwsCliBroker::new().list_regions() {
        println!("{region}");
    }
    Ok(())
}

/// Connect and print the managed-instance list.
///
/// The profile and region that worked are written back to the
/// preferences file so the next invocation can omit them.
pub async fn instances_command(
    prefs: &Preferences,
    prefs_path: &Path,
    profile: Option<&str>,
    region: Option<&str>,
    watch: bool,
) -> Result<()> {
    let (profile, region) = resolve_target(prefs, profile, region)?;

    let broker = AwsCliBroker::new();
    let conn = broker
        .connect(&profile, &region)
        .await
        .with_context(|| format!("Failed to connect with profile {profile} in {region}"))?;
    print_success(&format!("Connected with profile {profile} in {region}"));

    let mut updated = prefs.clone();
    updated.profile = profile;
    updated.region = region;
    if let Err(e) = updated.save(prefs_path) {
        tracing::warn!("Could not save preferences: {}", e);
    }

    if watch {
        return watch_instances(Arc::new(broker), conn).await;
    }

    let Some(instances) = broker.list_managed_instances(&conn).await else {
        bail!("Connection to the broker broke while listing instances");
    };
    println!("{}", format_instances(&instances));
    Ok(())
}

/// Keep printing the instance list as the refresh task updates it
async fn watch_instances(
    broker: Arc<dyn SessionBroker>,
    conn: sd_broker::BrokerConnection,
) -> Result<()> {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    // The nudge side stays open but unused; ticks drive the watch
    let (_nudge_tx, nudge_rx) = mpsc::unbounded_channel();
    let shutdown = CancellationToken::new();

    let refresh = tokio::spawn(run_instance_refresh(
        broker,
        conn,
        events_tx,
        nudge_rx,
        shutdown.clone(),
    ));
    print_info("Watching instances. Press Ctrl+C to stop");

    loop {
        tokio::select! {
            event = events_rx.recv() => {
                match event {
                    Some(PanelEvent::InstancesUpdated(instances)) => {
                        println!("{}", format_instances(&instances));
                    }
                    Some(PanelEvent::ConnectionBroken { reason }) => {
                        print_error(&reason);
                        break;
                    }
                    Some(_) => {}
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    shutdown.cancel();
    refresh.await.ok();
    Ok(())
}

/// Pick profile and region from arguments, falling back to preferences
pub fn resolve_target(
    prefs: &Preferences,
    profile: Option<&str>,
    region: Option<&str>,
) -> Result<(String, String)> {
    let profile = match profile {
        Some(p) => p.to_string(),
        None if !prefs.profile.is_empty() => prefs.profile.clone(),
        None => bail!(
            "No profile given and none saved. Pass --profile, or see: sessiondock profiles"
        ),
    };
    let region = match region {
        Some(r) => r.to_string(),
        None if !prefs.region.is_empty() => prefs.region.clone(),
        None => bail!("No region given and none saved. Pass --region, or see: sessiondock regions"),
    };
    Ok((profile, region))
}
