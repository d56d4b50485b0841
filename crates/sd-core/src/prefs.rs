//! Application preferences
//!
//! Preferences live in a JSON file and are consumed read-only by the
//! core; only the control surface writes them back (last used profile
//! and region). Missing fields fall back to defaults, so a file written
//! by an older version keeps working.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::PrefsError;

/// Preferences file name
const PREFS_FILE_NAME: &str = "preferences.json";

/// Get the default preferences directory
pub fn default_prefs_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sessiondock")
}

/// Get the default preferences file path
pub fn default_prefs_path() -> PathBuf {
    default_prefs_dir().join(PREFS_FILE_NAME)
}

/// Local port range used by the free-port allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    /// First port of the range (inclusive)
    pub start: u16,
    /// Last port of the range (inclusive)
    pub end: u16,
}

impl Default for PortRange {
    fn default() -> Self {
        Self {
            start: 60000,
            end: 60100,
        }
    }
}

/// Persisted application preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Last used credential profile
    pub profile: String,

    /// Last used region
    pub region: String,

    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,

    /// Port range for forwarded sessions
    pub port_range: PortRange,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            profile: String::new(),
            region: String::new(),
            log_level: "info".to_string(),
            port_range: PortRange::default(),
        }
    }
}

impl Preferences {
    /// Load preferences from a file, falling back to defaults if the
    /// file does not exist. Fields missing from the file take their
    /// default values.
    pub fn load(path: &Path) -> Result<Self, PrefsError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).map_err(|_| PrefsError::Unreadable(path.to_path_buf()))?;
        let prefs: Self = serde_json::from_str(&content)?;
        Ok(prefs)
    }

    /// Save preferences to a file, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), PrefsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| PrefsError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| PrefsError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
