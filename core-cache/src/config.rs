//! Cache Configuration

use serde::{Deserialize, Serialize};

/// Configuration for the expiring JSON cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Subdirectory of the platform cache directory holding entry files.
    pub directory_name: String,

    /// Keys whose sanitized form exceeds this length are truncated and
    /// suffixed with a digest of the original key.
    pub max_key_length: usize,

    /// Remove expired and unreadable entries when the cache is opened.
    pub sweep_on_start: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory_name: "DataCache".to_string(),
            max_key_length: 120,
            sweep_on_start: true,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_directory_name(mut self, name: impl Into<String>) -> Self {
        self.directory_name = name.into();
        self
    }

    pub fn with_max_key_length(mut self, length: usize) -> Self {
        self.max_key_length = length;
        self
    }

    pub fn with_sweep_on_start(mut self, sweep: bool) -> Self {
        self.sweep_on_start = sweep;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_directory_name(&self.directory_name)?;

        if self.max_key_length < crate::keys::MIN_KEY_LENGTH {
            return Err(format!(
                "max_key_length must be at least {}",
                crate::keys::MIN_KEY_LENGTH
            ));
        }

        Ok(())
    }
}

/// Configuration for the two-tier artwork cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageCacheConfig {
    pub directory_name: String,

    /// Maximum number of images held in memory.
    pub memory_count_limit: usize,

    /// Maximum total bytes held in memory.
    pub memory_cost_limit: usize,
}

impl Default for ImageCacheConfig {
    fn default() -> Self {
        Self {
            directory_name: "PodcastArtwork".to_string(),
            memory_count_limit: 50,
            memory_cost_limit: 50 * 1024 * 1024,
        }
    }
}

impl ImageCacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_directory_name(mut self, name: impl Into<String>) -> Self {
        self.directory_name = name.into();
        self
    }

    pub fn with_memory_count_limit(mut self, count: usize) -> Self {
        self.memory_count_limit = count;
        self
    }

    pub fn with_memory_cost_limit(mut self, bytes: usize) -> Self {
        self.memory_cost_limit = bytes;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_directory_name(&self.directory_name)?;

        if self.memory_count_limit == 0 {
            return Err("memory_count_limit must be greater than 0".to_string());
        }

        if self.memory_cost_limit == 0 {
            return Err("memory_cost_limit must be greater than 0".to_string());
        }

        Ok(())
    }
}

fn validate_directory_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("directory_name must not be empty".to_string());
    }

    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(format!("directory_name must be a single path segment: {name}"));
    }

    Ok(())
}
