//! Session configuration (config.toml in the platform config directory)
//!
//! Handles loading, saving, and providing defaults for session settings.
//! Settings are stored in TOML format in the platform-specific config
//! directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default mono audio sample rate for streamed sessions.
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Session configuration.
///
/// All fields have serde defaults so a partial (or absent) config file
/// yields a working session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding snapshot and battery files.
    /// Defaults to the platform data directory.
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,

    /// Mono audio sample rate in Hz (default: 16000)
    #[serde(default = "default_sample_rate")]
    pub audio_sample_rate: u32,

    /// Target stepping rate in Hz for the built-in drive loop (default: 60)
    #[serde(default = "default_tick_rate")]
    pub tick_rate: u32,

    /// How often, in milliseconds, the input pump wakes to check its stop
    /// flag when the transport is quiet (default: 50)
    #[serde(default = "default_input_poll_ms")]
    pub input_poll_ms: u64,
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}
fn default_tick_rate() -> u32 {
    60
}
fn default_input_poll_ms() -> u64 {
    50
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: None,
            audio_sample_rate: default_sample_rate(),
            tick_rate: default_tick_rate(),
            input_poll_ms: default_input_poll_ms(),
        }
    }
}

impl Config {
    /// Resolve the storage root for persistence artifacts: the explicit
    /// override when set, otherwise the platform data directory.
    pub fn storage_root(&self) -> Option<PathBuf> {
        self.storage_dir.clone().or_else(data_dir)
    }
}

/// Returns the platform-specific configuration directory.
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.retrocast", "", "Retrocast")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Returns the platform-specific data directory where snapshot and battery
/// files are stored.
///
/// Returns `None` if the home directory cannot be determined.
pub fn data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.retrocast", "", "Retrocast")
        .map(|dirs| dirs.data_dir().to_path_buf())
}

/// Loads the configuration from disk.
///
/// Reads `config.toml` from the platform's configuration directory.
/// Returns default values if the file doesn't exist or cannot be parsed.
pub fn load() -> Config {
    config_dir()
        .and_then(|dir| std::fs::read_to_string(dir.join("config.toml")).ok())
        .and_then(|content| toml::from_str(&content).ok())
        .unwrap_or_default()
}

/// Saves the configuration to disk.
///
/// Writes `config.toml` to the platform's configuration directory.
/// Creates the directory if it doesn't exist.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file
/// cannot be written.
pub fn save(config: &Config) -> std::io::Result<()> {
    if let Some(dir) = config_dir() {
        std::fs::create_dir_all(&dir)?;
        let content = toml::to_string_pretty(config).unwrap();
        std::fs::write(dir.join("config.toml"), content)?;
    }
    Ok(())
}
