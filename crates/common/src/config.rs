//! Application configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory where exported videos and project documents are saved.
    pub downloads_dir: PathBuf,

    /// Recording session timing.
    #[serde(default)]
    pub timing: CaptureTiming,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Timing parameters for a recording session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureTiming {
    /// Number of countdown ticks before capture begins.
    pub countdown_ticks: u32,

    /// Length of one countdown tick (ms).
    pub countdown_tick_ms: u64,

    /// Progress refresh period while recording (ms).
    pub progress_interval_ms: u64,

    /// Encoder flush interval; chunks are emitted at this period (ms).
    pub chunk_timeslice_ms: u64,

    /// Extra time after the composition's total duration before the
    /// automatic stop fires (ms).
    pub deadline_grace_ms: u64,

    /// Upper bound on waiting for the encoder to drain after stop (ms).
    pub drain_timeout_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "slidecast=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            downloads_dir: default_downloads_dir(),
            timing: CaptureTiming::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CaptureTiming {
    fn default() -> Self {
        Self {
            countdown_ticks: 3,
            countdown_tick_ms: 1000,
            progress_interval_ms: 100,
            chunk_timeslice_ms: 100,
            deadline_grace_ms: 500,
            drain_timeout_ms: 10_000,
        }
    }
}

impl CaptureTiming {
    pub fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms.max(1))
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }

    pub fn chunk_timeslice(&self) -> Duration {
        Duration::from_millis(self.chunk_timeslice_ms.max(1))
    }

    pub fn deadline_grace(&self) -> Duration {
        Duration::from_millis(self.deadline_grace_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load config from `path`, falling back to defaults.
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to `path`.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Standard per-user config file location, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("io", "Slidecast", "slidecast")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }
}

/// The user's download directory, or the working directory.
fn default_downloads_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.download_dir().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}
