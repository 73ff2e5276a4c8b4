//! Expiring JSON disk cache.
//!
//! Each key maps to one file `<stem>.json` under the cache directory holding a
//! [`CacheEntry`]. Writes land in a temporary sibling first and are renamed
//! into place so a reader never observes a half-written entry.
//!
//! Lookups never fail: a missing, unreadable, corrupt or expired entry is a
//! miss, and corrupt or expired files are removed on the way out.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bridge_traits::{Clock, FileSystemAccess};
use bytes::Bytes;
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use core_runtime::logging::file_label;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::CacheConfig;
use crate::entry::{CacheEntry, EntryHeader};
use crate::error::{CacheError, Result};
use crate::keys;
use crate::ttl::CacheTtl;

const ENTRY_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";
/// Age after which a temp file is treated as left over from an interrupted write.
const TEMP_FILE_GRACE_SECS: i64 = 60;

pub struct ExpiringDiskCache {
    fs: Arc<dyn FileSystemAccess>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    directory: PathBuf,
    event_bus: Option<EventBus>,
}

impl ExpiringDiskCache {
    /// Opens the cache under the platform cache directory, creating it if
    /// needed and sweeping expired entries when configured to.
    pub async fn open(
        fs: Arc<dyn FileSystemAccess>,
        clock: Arc<dyn Clock>,
        config: CacheConfig,
    ) -> Result<Self> {
        config.validate().map_err(CacheError::InvalidConfig)?;

        let directory = fs.get_cache_directory().await?.join(&config.directory_name);
        fs.create_dir_all(&directory).await?;

        let cache = Self {
            fs,
            clock,
            config,
            directory,
            event_bus: None,
        };

        if cache.config.sweep_on_start {
            match cache.clean_expired_entries().await {
                Ok(removed) => debug!(removed, "Startup cache sweep finished"),
                Err(e) => warn!(error = %e, "Startup cache sweep failed"),
            }
        }

        info!(directory = ?cache.directory, "Opened disk cache");
        Ok(cache)
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the file backing `key`.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        let stem = keys::file_stem(key, self.config.max_key_length);
        self.directory.join(format!("{stem}.{ENTRY_EXTENSION}"))
    }

    /// Returns the cached value, or `None` on a miss.
    #[instrument(skip(self), level = "debug")]
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.entry_path(key);

        let raw = match self.fs.read_file(&path).await {
            Ok(raw) => raw,
            Err(e) if e.is_not_found() => {
                debug!("Cache miss");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read cache entry");
                return None;
            }
        };

        let entry: CacheEntry<T> = match serde_json::from_slice(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                let corrupt = CacheError::Corrupt {
                    key: key.to_string(),
                    reason: e.to_string(),
                };
                warn!(error = %corrupt, "Discarding unreadable cache entry");
                self.discard(&path).await;
                return None;
            }
        };

        if entry.is_expired(self.clock.now()) {
            debug!(stored_at = %entry.stored_at, "Cache entry expired");
            self.discard(&path).await;
            return None;
        }

        debug!("Cache hit");
        Some(entry.value)
    }

    /// Stores `value` under `key`, replacing any previous entry.
    #[instrument(skip(self, value), fields(ttl = ttl.as_secs()), level = "debug")]
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: CacheTtl,
    ) -> Result<()> {
        let entry = CacheEntry::new(value, self.clock.now(), ttl.as_secs());
        let encoded = serde_json::to_vec(&entry)?;

        let path = self.entry_path(key);
        let temp = self
            .directory
            .join(format!(".{}.{TEMP_EXTENSION}", Uuid::new_v4()));

        self.fs.write_file(&temp, Bytes::from(encoded)).await?;
        if let Err(e) = self.fs.rename(&temp, &path).await {
            self.discard(&temp).await;
            return Err(e.into());
        }

        debug!(file = %file_label(&path), "Stored cache entry");
        Ok(())
    }

    /// Removes the entry for `key`. Removing an absent key is not an error.
    pub async fn remove(&self, key: &str) -> Result<()> {
        let path = self.entry_path(key);
        match self.fs.delete_file(&path).await {
            Ok(()) => {
                debug!(key, "Removed cache entry");
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes every entry and recreates the empty directory.
    pub async fn clear_all(&self) -> Result<()> {
        match self.fs.delete_dir_all(&self.directory).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
        self.fs.create_dir_all(&self.directory).await?;

        info!(directory = ?self.directory, "Cleared disk cache");
        self.emit(CacheEvent::Cleared {
            namespace: self.config.directory_name.clone(),
        });
        Ok(())
    }

    /// Removes expired and unreadable entries, returning how many were removed.
    ///
    /// Temp files older than a minute are orphans of interrupted writes and
    /// are deleted too; they are not included in the count.
    pub async fn clean_expired_entries(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut removed = 0;
        let mut orphans = 0usize;

        for path in self.fs.list_directory(&self.directory).await? {
            match path.extension().and_then(|ext| ext.to_str()) {
                Some(ENTRY_EXTENSION) => {}
                Some(TEMP_EXTENSION) => {
                    if self.remove_orphaned_temp(&path, now.timestamp()).await {
                        orphans += 1;
                    }
                    continue;
                }
                _ => continue,
            }

            let stale = match self.fs.read_file(&path).await {
                Ok(raw) => match serde_json::from_slice::<EntryHeader>(&raw) {
                    Ok(header) => header.is_expired(now),
                    Err(e) => {
                        debug!(
                            file = %file_label(&path),
                            error = %e,
                            "Sweeping unreadable cache entry"
                        );
                        true
                    }
                },
                Err(e) if e.is_not_found() => false,
                Err(e) => {
                    warn!(file = %file_label(&path), error = %e, "Skipping unreadable cache file");
                    false
                }
            };

            if stale {
                match self.fs.delete_file(&path).await {
                    Ok(()) => removed += 1,
                    Err(e) if e.is_not_found() => {}
                    Err(e) => warn!(
                        file = %file_label(&path),
                        error = %e,
                        "Failed to remove stale cache entry"
                    ),
                }
            }
        }

        if removed > 0 || orphans > 0 {
            info!(removed, orphans, "Removed expired cache entries");
        }
        self.emit(CacheEvent::ExpiredSwept {
            namespace: self.config.directory_name.clone(),
            removed,
        });
        Ok(removed)
    }

    /// Returns the cached value for `key`, or runs `fetch` and caches its
    /// result.
    ///
    /// Fetch errors propagate unchanged and nothing is cached. A failure to
    /// store a freshly fetched value is logged and the value is still
    /// returned.
    pub async fn fetch_or_cache<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: CacheTtl,
        fetch: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        if let Some(cached) = self.get::<T>(key).await {
            return Ok(cached);
        }

        let value = fetch().await?;
        if let Err(e) = self.set(key, &value, ttl).await {
            warn!(key, error = %e, "Failed to cache fetched value");
        }
        Ok(value)
    }

    async fn remove_orphaned_temp(&self, path: &Path, now: i64) -> bool {
        let modified_at = match self.fs.metadata(path).await {
            Ok(meta) => meta.modified_at,
            Err(_) => return false,
        };
        if modified_at.is_some_and(|at| now - at < TEMP_FILE_GRACE_SECS) {
            return false;
        }

        match self.fs.delete_file(path).await {
            Ok(()) => {
                debug!(file = %file_label(path), "Removed orphaned temp file");
                true
            }
            Err(e) if e.is_not_found() => false,
            Err(e) => {
                warn!(file = %file_label(path), error = %e, "Failed to remove orphaned temp file");
                false
            }
        }
    }

    async fn discard(&self, path: &Path) {
        match self.fs.delete_file(path).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!(file = %file_label(path), error = %e, "Failed to remove cache file"),
        }
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Cache(event));
        }
    }
}
