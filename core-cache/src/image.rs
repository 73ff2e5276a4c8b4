//! Artwork cache.
//!
//! A bounded in-memory LRU sits in front of a directory of image files named
//! by the SHA-256 of their source URL. Disk hits are promoted into memory.
//! The memory tier is bounded both by item count and by total bytes.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bridge_traits::{FileSystemAccess, HttpClient, HttpRequest};
use bytes::Bytes;
use lru::LruCache;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::ImageCacheConfig;
use crate::error::{CacheError, Result};
use crate::keys;

const IMAGE_EXTENSION: &str = "img";

struct MemoryTier {
    entries: LruCache<String, Bytes>,
    total_bytes: usize,
    cost_limit: usize,
}

impl MemoryTier {
    fn get(&mut self, key: &str) -> Option<Bytes> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: String, data: Bytes) {
        if data.len() > self.cost_limit {
            debug!(size = data.len(), "Image exceeds memory budget, keeping on disk only");
            return;
        }

        if let Some(previous) = self.entries.pop(&key) {
            self.total_bytes -= previous.len();
        }

        while self.total_bytes + data.len() > self.cost_limit {
            match self.entries.pop_lru() {
                Some((_, evicted)) => self.total_bytes -= evicted.len(),
                None => break,
            }
        }

        self.total_bytes += data.len();
        if let Some((_, evicted)) = self.entries.push(key, data) {
            self.total_bytes -= evicted.len();
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.total_bytes = 0;
    }
}

pub struct ImageCache {
    fs: Arc<dyn FileSystemAccess>,
    http: Option<Arc<dyn HttpClient>>,
    directory: PathBuf,
    memory: Mutex<MemoryTier>,
}

impl ImageCache {
    pub async fn open(fs: Arc<dyn FileSystemAccess>, config: ImageCacheConfig) -> Result<Self> {
        config.validate().map_err(CacheError::InvalidConfig)?;
        let capacity = NonZeroUsize::new(config.memory_count_limit).ok_or_else(|| {
            CacheError::InvalidConfig("memory_count_limit must be greater than 0".to_string())
        })?;

        let directory = fs.get_cache_directory().await?.join(&config.directory_name);
        fs.create_dir_all(&directory).await?;

        Ok(Self {
            fs,
            http: None,
            directory,
            memory: Mutex::new(MemoryTier {
                entries: LruCache::new(capacity),
                total_bytes: 0,
                cost_limit: config.memory_cost_limit,
            }),
        })
    }

    /// Enables [`ImageCache::load`] to fetch images that are not cached.
    pub fn with_http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn image_path(&self, url: &str) -> PathBuf {
        self.directory
            .join(format!("{}.{IMAGE_EXTENSION}", keys::digest_hex(url)))
    }

    /// Looks the image up in memory, then on disk.
    pub async fn get(&self, url: &str) -> Option<Bytes> {
        let key = keys::digest_hex(url);

        if let Some(hit) = self.memory.lock().await.get(&key) {
            return Some(hit);
        }

        let path = self.image_path(url);
        match self.fs.read_file(&path).await {
            Ok(data) => {
                debug!(url, "Artwork disk hit");
                self.memory.lock().await.insert(key, data.clone());
                Some(data)
            }
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                warn!(url, error = %e, "Failed to read cached artwork");
                None
            }
        }
    }

    /// Stores an image in both tiers. Disk failures are logged; the memory
    /// tier still receives the image.
    pub async fn insert(&self, url: &str, data: Bytes) {
        let key = keys::digest_hex(url);
        self.memory.lock().await.insert(key, data.clone());

        let path = self.image_path(url);
        if let Err(e) = self.fs.write_file(&path, data).await {
            warn!(url, error = %e, "Failed to persist artwork");
        }
    }

    /// Returns the cached image or downloads and caches it.
    pub async fn load(&self, url: &str) -> Result<Bytes> {
        if let Some(hit) = self.get(url).await {
            return Ok(hit);
        }

        let http = self.http.as_ref().ok_or(CacheError::FetchUnavailable)?;
        let response = http
            .execute(HttpRequest::get(url))
            .await
            .map_err(|e| CacheError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !response.is_success() {
            return Err(CacheError::Fetch {
                url: url.to_string(),
                reason: format!("HTTP status {}", response.status),
            });
        }
        if response.body.is_empty() {
            return Err(CacheError::Fetch {
                url: url.to_string(),
                reason: "empty body".to_string(),
            });
        }

        debug!(url, size = response.body.len(), "Downloaded artwork");
        self.insert(url, response.body.clone()).await;
        Ok(response.body)
    }

    /// Empties both tiers.
    pub async fn clear(&self) -> Result<()> {
        self.memory.lock().await.clear();

        match self.fs.delete_dir_all(&self.directory).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
        self.fs.create_dir_all(&self.directory).await?;

        info!("Cleared artwork cache");
        Ok(())
    }

    /// Returns `(items, bytes)` currently held in memory.
    pub async fn memory_stats(&self) -> (usize, usize) {
        let memory = self.memory.lock().await;
        (memory.entries.len(), memory.total_bytes)
    }
}
