//! Parsed podcast feeds, cached on disk.
//!
//! Parsing RSS is the host's job; it plugs in through [`FeedFetcher`]. This
//! module only decides when to call it.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_cache::{keys, CacheTtl, ExpiringDiskCache};
use core_playback::AssetId;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEpisode {
    pub id: String,
    pub title: String,
    pub audio_url: Option<String>,
    pub image_url: Option<String>,
    pub pub_date: Option<DateTime<Utc>>,
    /// Seconds, when the feed declares it.
    pub duration: Option<f64>,
}

impl FeedEpisode {
    /// The identifier playback, downloads and history use for this episode.
    pub fn asset_id(&self) -> AssetId {
        AssetId::from_source(self.audio_url.as_deref(), &self.title)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedResult {
    pub id: String,
    pub title: String,
    pub collection_title: String,
    pub source_url: String,
    pub episodes: Vec<FeedEpisode>,
}

/// Fetches and parses a feed.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> core_cache::Result<FeedResult>;
}

#[derive(Clone)]
pub struct FeedService {
    cache: Arc<ExpiringDiskCache>,
    fetcher: Arc<dyn FeedFetcher>,
}

impl FeedService {
    pub fn new(cache: Arc<ExpiringDiskCache>, fetcher: Arc<dyn FeedFetcher>) -> Self {
        Self { cache, fetcher }
    }

    /// The cached feed, fetched on a miss.
    #[instrument(skip(self))]
    pub async fn feed(&self, url: &str) -> core_cache::Result<FeedResult> {
        self.cache
            .fetch_or_cache(&keys::episodes(url), CacheTtl::Persistent, || {
                self.fetcher.fetch(url)
            })
            .await
    }

    /// Fetches the feed and replaces the cached copy.
    #[instrument(skip(self))]
    pub async fn refresh(&self, url: &str) -> core_cache::Result<FeedResult> {
        let feed = self.fetcher.fetch(url).await?;
        if let Err(e) = self
            .cache
            .set(&keys::episodes(url), &feed, CacheTtl::Persistent)
            .await
        {
            warn!(error = %e, "Failed to cache refreshed feed");
        }
        Ok(feed)
    }
}
