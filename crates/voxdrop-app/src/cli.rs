//! CLI argument definitions for the Voxdrop binary.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

/// Voxdrop: capture a voice note from anywhere and queue it for the host app.
#[derive(Parser, Debug)]
#[command(name = "voxdrop", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Data directory holding the queue database.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a simulated capture end to end: trigger, relay, recognize, queue.
    Capture {
        /// Transcript the simulated recognizer produces.
        #[arg(default_value = "This is a simulated voice note")]
        text: String,

        /// Context the trigger arrives in.
        #[arg(long, value_enum, default_value_t = ContextArg::Background)]
        context: ContextArg,

        /// Delay between simulated recognizer events, in milliseconds.
        #[arg(long, default_value_t = 300)]
        pace_ms: u64,

        /// End the recognition with this error instead of a final result.
        #[arg(long, value_enum)]
        fail_with: Option<FailArg>,
    },
    /// Print every pending result as JSON, oldest first.
    Pending,
    /// Remove pending results.
    Clear {
        /// Remove only this result.
        #[arg(long)]
        id: Option<Uuid>,
    },
    /// Read and remove all pending results in one step, printing them as JSON.
    Import,
    /// Print the persisted display status and the queue length.
    Status,
    /// Write the effective configuration to the config file.
    InitConfig,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextArg {
    Foreground,
    Background,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailArg {
    Permission,
    Network,
    NoSpeech,
    Unavailable,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > VOXDROP_CONFIG env var > platform default (~/.voxdrop/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("VOXDROP_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the data directory path.
    ///
    /// Priority: --data-dir flag > config file value.
    /// Returns `None` if not overridden (use config default).
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    /// Returns `None` if not overridden.
    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".voxdrop").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".voxdrop").join("config.toml");
    }
    PathBuf::from("config.toml")
}
