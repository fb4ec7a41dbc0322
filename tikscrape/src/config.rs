//! JSON-backed application settings.
//!
//! Missing keys fall back to their defaults, so a settings file only needs
//! to carry what differs.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::transport::FailureMarkers;

/// Tunables shared by the queue converter, ledger and transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// `limit-at` applied to every static queue the converter creates
    #[serde(default = "default_limit_at")]
    pub limit_at_default: String,

    /// Queue type pair written as `queue=` on new static queues
    #[serde(default = "default_queue_kind")]
    pub queue_kind: String,

    /// Where the action ledger is persisted
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,

    /// In-band failure markers checked in command output
    #[serde(default)]
    pub failure_markers: FailureMarkers,

    /// Per-command timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_limit_at() -> String {
    "1600k/6200k".to_string()
}

fn default_queue_kind() -> String {
    "default-small/default-small".to_string()
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("action_history.json")
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            limit_at_default: default_limit_at(),
            queue_kind: default_queue_kind(),
            ledger_path: default_ledger_path(),
            failure_markers: FailureMarkers::default(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file, falling back to defaults if the file
    /// does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let settings: Self = match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("settings file {} not found, using defaults", path.display());
                Self::default()
            }
            Err(e) => return Err(ConfigError::io("reading settings", path, e).into()),
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Save settings as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::io("creating settings directory", parent, e))?;
        }
        fs::write(path, content).map_err(|e| ConfigError::io("writing settings", path, e))?;

        Ok(())
    }

    /// Per-command timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Reject values RouterOS would refuse.
    pub fn validate(&self) -> Result<()> {
        if self.limit_at_default.trim().is_empty() {
            return Err(ConfigError::Invalid("limit_at_default must not be empty".into()).into());
        }
        if self.queue_kind.trim().is_empty() {
            return Err(ConfigError::Invalid("queue_kind must not be empty".into()).into());
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be > 0".into()).into());
        }
        Ok(())
    }
}
