//! sessiondock CLI
//!
//! Control surface for brokered port-forward sessions:
//! - Connect a credential profile and list managed instances
//! - Launch SSH / RDP / port-forward sessions and track them
//! - Inspect and edit preferences

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sd_core::prefs::{default_prefs_path, Preferences};
use sd_core::types::SessionKind;
use sessiondock::commands;

#[derive(Parser)]
#[command(name = "sessiondock")]
#[command(author, version, about = "Session control panel for cloud instances")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to preferences file
    #[arg(short, long, global = true)]
    prefs: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List credential profiles configured on this machine
    Profiles,

    /// List selectable regions
    Regions,

    /// Connect and list managed instances
    List {
        /// Credential profile (defaults to the saved one)
        #[arg(long)]
        profile: Option<String>,
        /// Region (defaults to the saved one)
        #[arg(long)]
        region: Option<String>,
        /// Keep the list updating until interrupted
        #[arg(short, long)]
        watch: bool,
    },

    /// Open an interactive shell session to an instance
    Ssh {
        /// Target instance ID
        instance: String,
        #[arg(long)]
        profile: Option<String>,
        #[arg(long)]
        region: Option<String>,
    },

    /// Open a remote desktop session to an instance
    Rdp {
        /// Target instance ID
        instance: String,
        #[arg(long)]
        profile: Option<String>,
        #[arg(long)]
        region: Option<String>,
    },

    /// Forward a local port to a port on an instance, or to a host
    /// reachable from it
    Forward {
        /// Target instance ID
        instance: String,
        /// Remote port to forward to
        remote_port: u16,
        /// Forward to this host through the instance instead of the
        /// instance itself
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        profile: Option<String>,
        #[arg(long)]
        region: Option<String>,
    },

    /// Inspect or edit preferences
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },

    /// Check that required external programs are installed
    Doctor,
}

#[derive(Subcommand)]
enum PrefsAction {
    /// Show current preferences
    Show,
    /// Show the preferences file path
    Path,
    /// Set a preference value
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let prefs_path = cli.prefs.clone().unwrap_or_else(default_prefs_path);
    let prefs = Preferences::load(&prefs_path)?;

    // Logging from verbosity flags, falling back to the preferences
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error".to_string(),
        (false, 0) => prefs.log_level.clone(),
        (false, 1) => "debug".to_string(),
        (false, _) => "trace".to_string(),
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or(log_level),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Profiles => commands::profiles_command()?,

        Commands::Regions => commands::regions_command()?,

        Commands::List {
            profile,
            region,
            watch,
        } => {
            commands::instances_command(
                &prefs,
                &prefs_path,
                profile.as_deref(),
                region.as_deref(),
                watch,
            )
            .await?;
        }

        Commands::Ssh {
            instance,
            profile,
            region,
        } => {
            commands::session_command(
                &prefs,
                &prefs_path,
                profile.as_deref(),
                region.as_deref(),
                &instance,
                SessionKind::Ssh,
            )
            .await?;
        }

        Commands::Rdp {
            instance,
            profile,
            region,
        } => {
            commands::session_command(
                &prefs,
                &prefs_path,
                profile.as_deref(),
                region.as_deref(),
                &instance,
                SessionKind::Rdp,
            )
            .await?;
        }

        Commands::Forward {
            instance,
            remote_port,
            host,
            profile,
            region,
        } => {
            let kind = match host {
                Some(remote_host) => SessionKind::HostPortForward {
                    remote_host,
                    remote_port,
                },
                None => SessionKind::CustomPortForward { remote_port },
            };
            commands::session_command(
                &prefs,
                &prefs_path,
                profile.as_deref(),
                region.as_deref(),
                &instance,
                kind,
            )
            .await?;
        }

        Commands::Prefs { action } => match action {
            PrefsAction::Show => commands::prefs_show(&prefs)?,
            PrefsAction::Path => commands::prefs_path(&prefs_path)?,
            PrefsAction::Set { key, value } => {
                commands::prefs_set(&prefs, &prefs_path, &key, &value)?;
            }
        },

        Commands::Doctor => commands::doctor_command().await?,
    }

    Ok(())
}
