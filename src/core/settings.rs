//! Synchronization preferences.
//!
//! Loaded from TOML with defaults for every missing key, so an empty file is a
//! valid configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::time::{self, Time};

/// Error type for loading settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Largest auto-play window whose nanosecond value fits in [`Time`].
pub const MAX_AUTO_PLAY_WINDOW_MS: u64 = (Time::MAX / time::constants::NANOS_PER_MILLI) as u64;

/// Preferences driving the dual-player synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Scale the second player so both motions (sync point to end) span the
    /// same common duration.
    pub sync_by_motion: bool,
    /// Copy a speed change on one player to the other one.
    pub sync_lock_speed: bool,
    /// Start both players automatically when their recordings were created
    /// close enough in time.
    pub auto_play: bool,
    /// Maximum creation time distance for auto-play, in milliseconds.
    pub auto_play_window_ms: u64,
    /// Forced realignments allowed per playback episode.
    pub resync_budget: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            sync_by_motion: false,
            sync_lock_speed: true,
            auto_play: true,
            auto_play_window_ms: 5_000,
            resync_budget: 1,
        }
    }
}

impl SyncSettings {
    /// Load settings from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse settings from a TOML string and validate them.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, SettingsError> {
        let settings: SyncSettings = toml::from_str(toml_str)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.auto_play_window_ms == 0 {
            return Err(SettingsError::Invalid(
                "auto_play_window_ms must be greater than zero".to_string(),
            ));
        }
        if self.auto_play_window_ms > MAX_AUTO_PLAY_WINDOW_MS {
            return Err(SettingsError::Invalid(format!(
                "auto_play_window_ms must not exceed {}",
                MAX_AUTO_PLAY_WINDOW_MS
            )));
        }
        Ok(())
    }

    /// Auto-play proximity threshold in nanoseconds, saturating for windows
    /// that were never validated.
    pub fn auto_play_window(&self) -> Time {
        i64::try_from(self.auto_play_window_ms)
            .map_or(Time::MAX, |ms| ms.saturating_mul(time::constants::NANOS_PER_MILLI))
    }
}
