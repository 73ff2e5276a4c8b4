//! # Playback Configuration
//!
//! Tunables for the playback session, the download manager and the listening
//! history. All values have serde defaults so partial configs deserialize.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Playback session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// How often the position is sampled while playing.
    ///
    /// Default: 500 ms.
    #[serde(default = "default_tick_interval")]
    pub tick_interval: Duration,

    /// Minimum change in seconds before a sampled position is published.
    ///
    /// Smaller jitter from the player clock is ignored.
    ///
    /// Default: 0.25.
    #[serde(default = "default_time_update_threshold")]
    pub time_update_threshold: f64,

    /// Seconds of listening between history snapshots.
    ///
    /// Default: 10.
    #[serde(default = "default_history_save_interval")]
    pub history_save_interval: f64,

    /// Seconds moved by remote skip commands without an explicit interval.
    ///
    /// Default: 30.
    #[serde(default = "default_skip_interval")]
    pub skip_interval: f64,

    /// Request a background download when a streamed episode starts playing.
    ///
    /// Default: true.
    #[serde(default = "default_auto_download_on_play")]
    pub auto_download_on_play: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_interval: default_tick_interval(),
            time_update_threshold: default_time_update_threshold(),
            history_save_interval: default_history_save_interval(),
            skip_interval: default_skip_interval(),
            auto_download_on_play: default_auto_download_on_play(),
        }
    }
}

impl PlaybackConfig {
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_time_update_threshold(mut self, seconds: f64) -> Self {
        self.time_update_threshold = seconds;
        self
    }

    pub fn with_history_save_interval(mut self, seconds: f64) -> Self {
        self.history_save_interval = seconds;
        self
    }

    pub fn with_skip_interval(mut self, seconds: f64) -> Self {
        self.skip_interval = seconds;
        self
    }

    pub fn with_auto_download_on_play(mut self, enabled: bool) -> Self {
        self.auto_download_on_play = enabled;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_interval.is_zero() {
            return Err("tick_interval must be > 0".to_string());
        }

        if !self.time_update_threshold.is_finite() || self.time_update_threshold < 0.0 {
            return Err("time_update_threshold must be a non-negative number".to_string());
        }

        if !self.history_save_interval.is_finite() || self.history_save_interval <= 0.0 {
            return Err("history_save_interval must be > 0".to_string());
        }

        if !self.skip_interval.is_finite() || self.skip_interval <= 0.0 {
            return Err("skip_interval must be > 0".to_string());
        }

        Ok(())
    }
}

/// Download manager configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Subdirectory of the platform data directory holding completed files.
    ///
    /// Default: `Downloads`.
    #[serde(default = "default_downloads_directory")]
    pub directory_name: String,

    /// Transfers allowed to run at once. Further requests wait their turn.
    ///
    /// Default: 3.
    #[serde(default = "default_max_concurrent_transfers")]
    pub max_concurrent_transfers: usize,

    /// Maximum characters kept from the asset id in a file name.
    ///
    /// Default: 64.
    #[serde(default = "default_file_stem_length")]
    pub file_stem_length: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            directory_name: default_downloads_directory(),
            max_concurrent_transfers: default_max_concurrent_transfers(),
            file_stem_length: default_file_stem_length(),
        }
    }
}

impl DownloadConfig {
    pub fn with_directory_name(mut self, name: impl Into<String>) -> Self {
        self.directory_name = name.into();
        self
    }

    pub fn with_max_concurrent_transfers(mut self, count: usize) -> Self {
        self.max_concurrent_transfers = count;
        self
    }

    pub fn with_file_stem_length(mut self, length: usize) -> Self {
        self.file_stem_length = length;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.directory_name.trim().is_empty() || self.directory_name.contains(['/', '\\']) {
            return Err("directory_name must be a single non-empty path segment".to_string());
        }

        if self.max_concurrent_transfers == 0 {
            return Err("max_concurrent_transfers must be > 0".to_string());
        }

        if self.file_stem_length == 0 {
            return Err("file_stem_length must be > 0".to_string());
        }

        Ok(())
    }
}

/// Listening history configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Settings key holding the serialized history list.
    ///
    /// Default: `playbackHistory`.
    #[serde(default = "default_history_key")]
    pub settings_key: String,

    /// Maximum number of remembered episodes.
    ///
    /// Default: 50.
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Fraction of the duration after which an episode counts as finished.
    ///
    /// Default: 0.95.
    #[serde(default = "default_finished_ratio")]
    pub finished_ratio: f64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            settings_key: default_history_key(),
            max_items: default_max_items(),
            finished_ratio: default_finished_ratio(),
        }
    }
}

impl HistoryConfig {
    pub fn with_settings_key(mut self, key: impl Into<String>) -> Self {
        self.settings_key = key.into();
        self
    }

    pub fn with_max_items(mut self, count: usize) -> Self {
        self.max_items = count;
        self
    }

    pub fn with_finished_ratio(mut self, ratio: f64) -> Self {
        self.finished_ratio = ratio;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.settings_key.is_empty() {
            return Err("settings_key must not be empty".to_string());
        }

        if self.max_items == 0 {
            return Err("max_items must be > 0".to_string());
        }

        if !(0.0..=1.0).contains(&self.finished_ratio) || self.finished_ratio == 0.0 {
            return Err("finished_ratio must be in (0.0, 1.0]".to_string());
        }

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_tick_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_time_update_threshold() -> f64 {
    0.25
}

fn default_history_save_interval() -> f64 {
    10.0
}

fn default_skip_interval() -> f64 {
    30.0
}

fn default_auto_download_on_play() -> bool {
    true
}

fn default_downloads_directory() -> String {
    "Downloads".to_string()
}

fn default_max_concurrent_transfers() -> usize {
    3
}

fn default_file_stem_length() -> usize {
    64
}

fn default_history_key() -> String {
    "playbackHistory".to_string()
}

fn default_max_items() -> usize {
    50
}

fn default_finished_ratio() -> f64 {
    0.95
}
