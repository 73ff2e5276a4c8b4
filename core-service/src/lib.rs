//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridges (player, HTTP, filesystem,
//! settings) into the media engine. [`CoreService::bootstrap`] opens the
//! caches, restores downloads and listening history, and spawns the engine
//! task that owns them. Desktop apps enable the `desktop-shims` feature
//! (which depends on `bridge-desktop`) so missing bridges fall back to the
//! desktop adapters.

mod engine;
pub mod error;
pub mod feed;
pub mod handle;

pub use error::{CoreError, Result};
pub use feed::{FeedEpisode, FeedFetcher, FeedResult, FeedService};
pub use handle::{EngineHandle, DEFAULT_RECENT_LIMIT};

use std::sync::Arc;

use bridge_traits::{MediaPlayer, NowPlayingCenter};
use core_cache::{CacheConfig, ExpiringDiskCache, ImageCache, ImageCacheConfig};
use core_playback::{
    DownloadConfig, DownloadManager, HistoryConfig, PlaybackConfig, PlaybackHistoryStore,
    PlaybackSessionManager,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus};
use tokio::sync::broadcast;
use tracing::info;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::TracingNowPlayingCenter;

/// Per-module settings applied at bootstrap.
#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    pub playback: PlaybackConfig,
    pub downloads: DownloadConfig,
    pub history: HistoryConfig,
    pub cache: CacheConfig,
    pub images: ImageCacheConfig,
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    engine: EngineHandle,
    cache: Arc<ExpiringDiskCache>,
    images: Arc<ImageCache>,
    event_bus: EventBus,
}

impl CoreService {
    /// Builds every component from `config` and starts the engine task.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn bootstrap(
        config: CoreConfig,
        player: Arc<dyn MediaPlayer>,
        now_playing: Arc<dyn NowPlayingCenter>,
    ) -> Result<Self> {
        Self::bootstrap_with(config, EngineSettings::default(), player, now_playing).await
    }

    pub async fn bootstrap_with(
        config: CoreConfig,
        settings: EngineSettings,
        player: Arc<dyn MediaPlayer>,
        now_playing: Arc<dyn NowPlayingCenter>,
    ) -> Result<Self> {
        config.validate()?;

        let event_bus = EventBus::new(config.event_buffer_size);
        let fs = config.resolve_file_system()?;
        let http = config.resolve_http_client()?;
        let store = config.resolve_settings_store().await?;
        let clock = config.clock.clone();

        let cache_config = settings
            .cache
            .with_sweep_on_start(config.features.sweep_cache_on_start);
        let cache = ExpiringDiskCache::open(fs.clone(), clock.clone(), cache_config)
            .await?
            .with_event_bus(event_bus.clone());

        let images = ImageCache::open(fs.clone(), settings.images)
            .await?
            .with_http_client(http.clone());

        let (downloads, transfers) =
            DownloadManager::open(fs, http, store.clone(), clock.clone(), settings.downloads)
                .await?;
        let downloads = downloads.with_event_bus(event_bus.clone());

        let history = PlaybackHistoryStore::load(store, clock, settings.history).await?;

        let playback_config = settings
            .playback
            .with_auto_download_on_play(config.features.auto_download_on_play);
        let (session, player_events) =
            PlaybackSessionManager::new(player, now_playing, playback_config)?;
        let session = session.with_event_bus(event_bus.clone());

        let engine = EngineHandle::spawn((session, player_events), (downloads, transfers), history);
        info!(
            cache_dir = %config.cache_dir.display(),
            data_dir = %config.data_dir.display(),
            "Core service started"
        );

        Ok(Self {
            engine,
            cache: Arc::new(cache),
            images: Arc::new(images),
            event_bus,
        })
    }

    /// Desktop bootstrap that reports now-playing changes through `tracing`.
    #[cfg(feature = "desktop-shims")]
    pub async fn bootstrap_desktop(
        config: CoreConfig,
        player: Arc<dyn MediaPlayer>,
    ) -> Result<Self> {
        Self::bootstrap(config, player, Arc::new(TracingNowPlayingCenter::new())).await
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    /// Metadata cache for search results, listings and feeds.
    pub fn cache(&self) -> Arc<ExpiringDiskCache> {
        Arc::clone(&self.cache)
    }

    pub fn images(&self) -> Arc<ImageCache> {
        Arc::clone(&self.images)
    }

    /// Feed access backed by the metadata cache.
    pub fn feeds(&self, fetcher: Arc<dyn FeedFetcher>) -> FeedService {
        FeedService::new(self.cache(), fetcher)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    pub async fn shutdown(&self) {
        self.engine.shutdown().await;
    }
}
