use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, VoxdropError};

/// Top-level configuration for Voxdrop.
///
/// Loaded from `~/.voxdrop/config.toml` by default. Every section falls back
/// to its defaults when missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoxdropConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub queue: QueueConfig,
}

impl VoxdropConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: VoxdropConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| VoxdropError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Full path of the queue database, with `~` expanded.
    pub fn queue_path(&self) -> PathBuf {
        expand_home(&self.general.data_dir).join(&self.queue.file_name)
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the queue database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.voxdrop/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Capture session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Absolute cap on a session, independent of the recognizer's own
    /// silence handling.
    pub max_duration_secs: u64,
    /// Trailing silence after which the recognizer finishes on its own.
    pub silence_timeout_ms: u64,
    /// Recognizer locale hint. `None` means the system locale.
    pub locale: Option<String>,
    /// Ask the recognizer for partial transcripts.
    pub partial_results: bool,
    /// Upper bound on the best-effort host notification.
    pub host_notify_timeout_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: 120,
            silence_timeout_ms: 8000,
            locale: None,
            partial_results: true,
            host_notify_timeout_ms: 500,
        }
    }
}

impl CaptureConfig {
    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }

    pub fn silence_timeout(&self) -> Duration {
        Duration::from_millis(self.silence_timeout_ms)
    }

    pub fn host_notify_timeout(&self) -> Duration {
        Duration::from_millis(self.host_notify_timeout_ms)
    }
}

/// Trigger relay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// How long the intermediary context stays visible after it appears.
    /// Zero skips the hold on platforms without the restriction.
    pub visibility_hold_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            visibility_hold_ms: 1000,
        }
    }
}

impl RelayConfig {
    pub fn visibility_hold(&self) -> Duration {
        Duration::from_millis(self.visibility_hold_ms)
    }
}

/// Durable queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Database file name inside `general.data_dir`.
    pub file_name: String,
    /// Destination hint stamped on new results.
    pub default_destination: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            file_name: "pending.db".to_string(),
            default_destination: crate::types::DEFAULT_DESTINATION.to_string(),
        }
    }
}
