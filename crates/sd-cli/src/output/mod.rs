//! Output formatting utilities for the CLI
//!
//! Tables for instance and session listings plus colored status
//! messages. Everything here formats; nothing here decides.

use tabled::{
    settings::{Style, Width},
    Table, Tabled,
};

use sd_core::events::SessionSummary;
use sd_core::time::elapsed_duration;
use sd_core::types::InstanceSummary;

/// Format the managed-instance list as an ASCII table
///
/// # Arguments
/// * `instances` - Instances to display
///
/// # Returns
/// A formatted string suitable for terminal output, or "No instances
/// found" if the list is empty.
pub fn format_instances(instances: &[InstanceSummary]) -> String {
    if instances.is_empty() {
        return "No instances found".to_string();
    }

    #[derive(Tabled)]
    struct InstanceRow {
        #[tabled(rename = "INSTANCE ID")]
        id: String,
        #[tabled(rename = "NAME")]
        name: String,
        #[tabled(rename = "TYPE")]
        instance_type: String,
        #[tabled(rename = "OS")]
        os: String,
        #[tabled(rename = "STATE")]
        state: String,
        #[tabled(rename = "SESSIONS")]
        sessions: String,
    }

    let rows: Vec<InstanceRow> = instances
        .iter()
        .map(|i| InstanceRow {
            id: i.id.to_string(),
            name: i.name.clone(),
            instance_type: i.instance_type.clone(),
            os: i.os.clone(),
            state: i.state.clone(),
            sessions: if i.session_capable { "yes" } else { "no" }.to_string(),
        })
        .collect();

    Table::new(rows)
        .with(Style::rounded())
        .with(Width::wrap(120))
        .to_string()
}

/// Format active sessions as an ASCII table
pub fn format_sessions(sessions: &[SessionSummary]) -> String {
    if sessions.is_empty() {
        return "No active sessions".to_string();
    }

    #[derive(Tabled)]
    struct SessionRow {
        #[tabled(rename = "ID")]
        id: u32,
        #[tabled(rename = "INSTANCE")]
        instance: String,
        #[tabled(rename = "KIND")]
        kind: String,
        #[tabled(rename = "LOCAL PORT")]
        local_port: String,
        #[tabled(rename = "AGE")]
        age: String,
    }

    let rows: Vec<SessionRow> = sessions
        .iter()
        .map(|s| SessionRow {
            id: s.id,
            instance: s.instance_id.to_string(),
            kind: s.kind.to_string(),
            local_port: s
                .local_port
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string()),
            age: format_duration(elapsed_duration(s.created_at_ms).as_secs()),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Format duration in human-readable form
fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow with a warning symbol prefix
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan with an info symbol prefix
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
