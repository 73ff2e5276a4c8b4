//! # Core Configuration Module
//!
//! Provides configuration management for the media engine.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the storage locations, feature flags and host bridges
//! the engine needs. Validation is fail-fast: `build()` rejects missing or
//! inconsistent settings with an actionable message.
//!
//! ## Bridges
//!
//! - `SettingsStore` - Durable key-value storage (desktop default: SQLite)
//! - `FileSystemAccess` - File I/O (desktop default: tokio fs)
//! - `HttpClient` - Downloads, feeds and artwork (desktop default: reqwest)
//! - `Clock` - Time source (default: system clock)
//!
//! When the `desktop-shims` feature is enabled, the `resolve_*` accessors fall
//! back to the desktop implementations for bridges that were not injected.
//! Without the feature, a missing bridge is reported as
//! [`Error::CapabilityMissing`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .cache_dir("/path/to/cache")
//!     .data_dir("/path/to/data")
//!     .build()?;
//!
//! let settings = config.resolve_settings_store().await?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Fails: no cache directory configured
//! let config = CoreConfig::builder()
//!     .data_dir("/path/to/data")
//!     .build()
//!     .expect("Should fail - missing cache directory");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{Clock, FileSystemAccess, HttpClient, SettingsStore, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;

/// Largest accepted event bus buffer.
const MAX_EVENT_BUFFER_SIZE: usize = 10_000;

/// Core configuration for the media engine.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite settings database used by the desktop settings store
    pub settings_path: PathBuf,

    /// Directory for disposable data (metadata cache, artwork)
    pub cache_dir: PathBuf,

    /// Directory for durable data (downloaded episodes)
    pub data_dir: PathBuf,

    /// Capacity of the event bus channel
    pub event_buffer_size: usize,

    /// HTTP client (optional with desktop default)
    pub http_client: Option<Arc<dyn HttpClient>>,

    /// File system access abstraction (optional with desktop default)
    pub file_system: Option<Arc<dyn FileSystemAccess>>,

    /// Durable key-value storage (optional with desktop default)
    pub settings_store: Option<Arc<dyn SettingsStore>>,

    /// Time source
    pub clock: Arc<dyn Clock>,

    /// Feature flags
    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("settings_path", &self.settings_path)
            .field("cache_dir", &self.cache_dir)
            .field("data_dir", &self.data_dir)
            .field("event_buffer_size", &self.event_buffer_size)
            .field(
                "http_client",
                &self.http_client.as_ref().map(|_| "HttpClient { ... }"),
            )
            .field(
                "file_system",
                &self
                    .file_system
                    .as_ref()
                    .map(|_| "FileSystemAccess { ... }"),
            )
            .field(
                "settings_store",
                &self
                    .settings_store
                    .as_ref()
                    .map(|_| "SettingsStore { ... }"),
            )
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Start a background download when a streamed episode begins playing
    pub auto_download_on_play: bool,

    /// Remove expired metadata cache entries at startup
    pub sweep_cache_on_start: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            auto_download_on_play: true,
            sweep_cache_on_start: true,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Storage paths are not empty
    /// - Cache and data directories are distinct
    /// - Event buffer size is within bounds
    pub fn validate(&self) -> Result<()> {
        if self.settings_path.as_os_str().is_empty() {
            return Err(Error::Config("Settings path cannot be empty".to_string()));
        }

        if self.cache_dir.as_os_str().is_empty() {
            return Err(Error::Config("Cache directory cannot be empty".to_string()));
        }

        if self.data_dir.as_os_str().is_empty() {
            return Err(Error::Config("Data directory cannot be empty".to_string()));
        }

        if self.cache_dir == self.data_dir {
            return Err(Error::Config(
                "Cache and data directories must differ: clearing the cache would \
                 otherwise delete downloaded episodes"
                    .to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size > MAX_EVENT_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "Event buffer size exceeds maximum of {}",
                MAX_EVENT_BUFFER_SIZE
            )));
        }

        Ok(())
    }

    /// Returns the injected settings store or the desktop default.
    pub async fn resolve_settings_store(&self) -> Result<Arc<dyn SettingsStore>> {
        match &self.settings_store {
            Some(store) => Ok(Arc::clone(store)),
            None => provide_default_settings_store(self).await,
        }
    }

    /// Returns the injected file system or the desktop default rooted at the
    /// configured directories.
    pub fn resolve_file_system(&self) -> Result<Arc<dyn FileSystemAccess>> {
        match &self.file_system {
            Some(fs) => Ok(Arc::clone(fs)),
            None => provide_default_file_system(self),
        }
    }

    /// Returns the injected HTTP client or the desktop default.
    pub fn resolve_http_client(&self) -> Result<Arc<dyn HttpClient>> {
        match &self.http_client {
            Some(client) => Ok(Arc::clone(client)),
            None => provide_default_http_client(),
        }
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn capability_missing(capability: &str, platform_hint: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: format!(
            "No {} implementation provided. \
             Desktop: ensure the 'desktop-shims' feature is enabled. \
             Mobile: inject {}.",
            capability, platform_hint
        ),
    }
}

#[cfg(feature = "desktop-shims")]
async fn provide_default_settings_store(config: &CoreConfig) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;

    let store = SqliteSettingsStore::new(config.settings_path.clone()).await?;

    let store: Arc<dyn SettingsStore> = Arc::new(store);
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
async fn provide_default_settings_store(_config: &CoreConfig) -> Result<Arc<dyn SettingsStore>> {
    Err(capability_missing(
        "SettingsStore",
        "platform-native settings (UserDefaults/DataStore)",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system(config: &CoreConfig) -> Result<Arc<dyn FileSystemAccess>> {
    use bridge_desktop::TokioFileSystem;

    let fs: Arc<dyn FileSystemAccess> = Arc::new(TokioFileSystem::with_directories(
        config.cache_dir.clone(),
        config.data_dir.clone(),
    ));
    Ok(fs)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system(_config: &CoreConfig) -> Result<Arc<dyn FileSystemAccess>> {
    Err(capability_missing(
        "FileSystemAccess",
        "sandboxed app directory access",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(capability_missing("HttpClient", "URLSession/OkHttp adapter"))
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Use this builder to incrementally set configuration options and then
/// call [`build()`](CoreConfigBuilder::build) to create the final config.
#[derive(Default)]
pub struct CoreConfigBuilder {
    settings_path: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    event_buffer_size: Option<usize>,
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    clock: Option<Arc<dyn Clock>>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    /// Sets the settings database path.
    ///
    /// Default: `<data_dir>/settings.db`
    pub fn settings_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    /// Sets the cache directory.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .cache_dir("/path/to/cache");
    /// ```
    pub fn cache_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    /// Sets the data directory where downloads are stored.
    pub fn data_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    /// Sets the event bus buffer size.
    ///
    /// Default: [`DEFAULT_EVENT_BUFFER_SIZE`]
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Sets the HTTP client implementation.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the file system access implementation.
    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Sets the settings store implementation.
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Sets the time source. Tests inject a manual clock here.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Enables or disables downloading streamed episodes when they start playing.
    ///
    /// Default: true
    pub fn auto_download_on_play(mut self, enabled: bool) -> Self {
        self.features.auto_download_on_play = enabled;
        self
    }

    /// Enables or disables the startup sweep of expired cache entries.
    ///
    /// Default: true
    pub fn sweep_cache_on_start(mut self, enabled: bool) -> Self {
        self.features.sweep_cache_on_start = enabled;
        self
    }

    /// Sets all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required directory is missing or a value
    /// is out of range.
    pub fn build(self) -> Result<CoreConfig> {
        let cache_dir = self.cache_dir.ok_or_else(|| {
            Error::Config("Cache directory is required. Use .cache_dir() to set it.".to_string())
        })?;

        let data_dir = self.data_dir.ok_or_else(|| {
            Error::Config("Data directory is required. Use .data_dir() to set it.".to_string())
        })?;

        let settings_path = self
            .settings_path
            .unwrap_or_else(|| data_dir.join("settings.db"));

        let config = CoreConfig {
            settings_path,
            cache_dir,
            data_dir,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            http_client: self.http_client,
            file_system: self.file_system,
            settings_store: self.settings_store,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}
