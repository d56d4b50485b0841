//! Preferences inspection and editing

use std::path::Path;

use anyhow::{bail, Context, Result};

use sd_core::prefs::Preferences;

use crate::output::print_success;

/// Print the current preferences as pretty JSON
pub fn prefs_show(prefs: &Preferences) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(prefs).context("Failed to render preferences")?
    );
    Ok(())
}

/// Print the preferences file path
pub fn prefs_path(path: &Path) -> Result<()> {
    println!("{}", path.display());
    Ok(())
}

/// Set one preference value and save the file
pub fn prefs_set(prefs: &Preferences, path: &Path, key: &str, value: &str) -> Result<()> {
    let mut updated = prefs.clone();
    match key {
        "profile" => updated.profile = value.to_string(),
        "region" => updated.region = value.to_string(),
        "log_level" => {
            if !["error", "warn", "info", "debug", "trace"].contains(&value) {
                bail!("log_level must be one of: error, warn, info, debug, trace");
            }
            updated.log_level = value.to_string();
        }
        "port_range.start" => {
            updated.port_range.start = parse_port(value)?;
        }
        "port_range.end" => {
            updated.port_range.end = parse_port(value)?;
        }
        other => bail!(
            "Unknown preference key '{other}'. Known keys: profile, region, log_level, \
             port_range.start, port_range.end"
        ),
    }

    if updated.port_range.start > updated.port_range.end {
        bail!(
            "Port range {}-{} is inverted",
            updated.port_range.start,
            updated.port_range.end
        );
    }

    updated.save(path).context("Failed to save preferences")?;
    print_success(&format!("{key} = {value}"));
    Ok(())
}

fn parse_port(value: &str) -> Result<u16> {
    let port: u16 = value.parse().context("Port must be a number in 1-65535")?;
    if port == 0 {
        bail!("Port must be in 1-65535");
    }
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn prefs_in(dir: &TempDir) -> (Preferences, std::path::PathBuf) {
        (Preferences::default(), dir.path().join("preferences.json"))
    }

    #[test]
    fn test_set_profile_persists() {
        let dir = TempDir::new().unwrap();
        let (prefs, path) = prefs_in(&dir);

        prefs_set(&prefs, &path, "profile", "staging").unwrap();
        let loaded = Preferences::load(&path).unwrap();
        assert_eq!(loaded.profile, "staging");
    }

    #[test]
    fn test_set_rejects_unknown_key() {
        let dir = TempDir::new().unwrap();
        let (prefs, path) = prefs_in(&dir);
        assert!(prefs_set(&prefs, &path, "colour", "blue").is_err());
    }

    #[test]
    fn test_set_rejects_bad_log_level() {
        let dir = TempDir::new().unwrap();
        let (prefs, path) = prefs_in(&dir);
        assert!(prefs_set(&prefs, &path, "log_level", "loud").is_err());
    }

    #[test]
    fn test_set_rejects_inverted_port_range() {
        let dir = TempDir::new().unwrap();
        let (prefs, path) = prefs_in(&dir);
        // Default end is 60100; a start above it must be refused
        assert!(prefs_set(&prefs, &path, "port_range.start", "60200").is_err());
    }

    #[test]
    fn test_set_port_range_end() {
        let dir = TempDir::new().unwrap();
        let (prefs, path) = prefs_in(&dir);

        prefs_set(&prefs, &path, "port_range.end", "60500").unwrap();
        let loaded = Preferences::load(&path).unwrap();
        assert_eq!(loaded.port_range.end, 60500);
    }
}
