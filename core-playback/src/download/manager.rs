//! Download manager.
//!
//! Owns the download bookkeeping: active tasks, completed assets and their
//! durable metadata. Transfers run as spawned tasks and report progress over a
//! channel whose receiving end belongs to whoever owns the manager; that owner
//! feeds each event back through [`DownloadManager::handle_transfer_event`].

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bridge_traits::{Clock, FileSystemAccess, HttpClient, SettingsStore};
use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
use core_runtime::logging::file_label;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::metadata::{DownloadRequest, DownloadedAssetMetadata};
use super::path;
use super::task::{DownloadState, DownloadTask, RequestOutcome};
use super::transfer::{
    TransferEvent, TransferEventReceiver, TransferEventSender, TransferId, TransferJob,
};
use crate::asset::AssetId;
use crate::config::DownloadConfig;
use crate::error::{PlaybackError, Result};
use crate::source;

pub const DOWNLOADED_ASSETS_KEY: &str = "downloaded_assets";
pub const DOWNLOADED_METADATA_KEY: &str = "downloaded_asset_metadata";

pub struct DownloadManager {
    fs: Arc<dyn FileSystemAccess>,
    http: Arc<dyn HttpClient>,
    settings: Arc<dyn SettingsStore>,
    clock: Arc<dyn Clock>,
    config: DownloadConfig,
    directory: PathBuf,
    slots: Arc<Semaphore>,
    events: TransferEventSender,
    tasks: HashMap<AssetId, DownloadTask>,
    last_outcome: HashMap<AssetId, DownloadState>,
    downloaded: HashSet<AssetId>,
    metadata: HashMap<AssetId, DownloadedAssetMetadata>,
    next_transfer: u64,
    event_bus: Option<EventBus>,
}

impl DownloadManager {
    /// Creates the downloads directory and restores completed downloads,
    /// dropping any whose file has disappeared.
    ///
    /// Returns the receiver on which transfer events arrive.
    pub async fn open(
        fs: Arc<dyn FileSystemAccess>,
        http: Arc<dyn HttpClient>,
        settings: Arc<dyn SettingsStore>,
        clock: Arc<dyn Clock>,
        config: DownloadConfig,
    ) -> Result<(Self, TransferEventReceiver)> {
        config.validate().map_err(PlaybackError::Internal)?;

        let directory = fs
            .get_data_directory()
            .await
            .map_err(PlaybackError::filesystem)?
            .join(&config.directory_name);
        fs.create_dir_all(&directory)
            .await
            .map_err(PlaybackError::filesystem)?;

        let (events, receiver) = mpsc::unbounded_channel();
        let slots = Arc::new(Semaphore::new(config.max_concurrent_transfers));

        let mut manager = Self {
            fs,
            http,
            settings,
            clock,
            config,
            directory,
            slots,
            events,
            tasks: HashMap::new(),
            last_outcome: HashMap::new(),
            downloaded: HashSet::new(),
            metadata: HashMap::new(),
            next_transfer: 0,
            event_bus: None,
        };
        manager.restore().await?;
        manager.remove_stale_partials().await;

        Ok((manager, receiver))
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Where the completed file for `asset_id` lives.
    pub fn local_path(&self, asset_id: &AssetId) -> PathBuf {
        self.directory
            .join(path::file_name(asset_id, self.config.file_stem_length))
    }

    pub fn is_downloaded(&self, asset_id: &AssetId) -> bool {
        self.downloaded.contains(asset_id)
    }

    pub fn is_downloading(&self, asset_id: &AssetId) -> bool {
        self.tasks.contains_key(asset_id)
    }

    /// The local file for `asset_id` if it exists and is not empty.
    pub async fn verified_local_file(&self, asset_id: &AssetId) -> Option<PathBuf> {
        let path = self.local_path(asset_id);
        match self.fs.metadata(&path).await {
            Ok(meta) if !meta.is_directory && meta.size > 0 => Some(path),
            _ => None,
        }
    }

    /// Active state, the completed download, or the last terminal outcome.
    pub fn download_state(&self, asset_id: &AssetId) -> Option<DownloadState> {
        if let Some(task) = self.tasks.get(asset_id) {
            return Some(task.state.clone());
        }
        if self.downloaded.contains(asset_id) {
            return Some(DownloadState::Completed {
                local_path: self.local_path(asset_id),
            });
        }
        self.last_outcome.get(asset_id).cloned()
    }

    /// Tasks not yet in a terminal state, oldest first.
    pub fn active_downloads(&self) -> Vec<DownloadTask> {
        let mut tasks: Vec<_> = self.tasks.values().cloned().collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.transfer.0.cmp(&b.transfer.0)));
        tasks
    }

    pub fn downloaded_assets(&self) -> Vec<AssetId> {
        let mut ids: Vec<_> = self.downloaded.iter().cloned().collect();
        ids.sort();
        ids
    }

    pub fn metadata(&self, asset_id: &AssetId) -> Option<&DownloadedAssetMetadata> {
        self.metadata.get(asset_id)
    }

    #[instrument(skip(self, request), fields(asset_id = %request.asset_id))]
    pub fn request_download(&mut self, request: DownloadRequest) -> Result<RequestOutcome> {
        if self.downloaded.contains(&request.asset_id) {
            debug!("Already downloaded");
            return Ok(RequestOutcome::AlreadyDownloaded);
        }
        if self.tasks.contains_key(&request.asset_id) {
            debug!("Already downloading");
            return Ok(RequestOutcome::AlreadyInProgress);
        }

        let url = source::validate_remote_url(&request.source_url)?;

        self.next_transfer += 1;
        let transfer = TransferId(self.next_transfer);
        let cancel = CancellationToken::new();
        let final_name = path::file_name(&request.asset_id, self.config.file_stem_length);
        let partial_path = self
            .directory
            .join(path::partial_name(&final_name, transfer.0));

        let job = TransferJob {
            asset_id: request.asset_id.clone(),
            transfer,
            url: url.clone(),
            partial_path,
            http: self.http.clone(),
            fs: self.fs.clone(),
            slots: self.slots.clone(),
            cancel: cancel.clone(),
            events: self.events.clone(),
        };
        tokio::spawn(job.run());

        let task = DownloadTask {
            asset_id: request.asset_id.clone(),
            source_url: url,
            state: DownloadState::Queued,
            title: request.title.clone(),
            collection_title: request.collection_title,
            collection_source_url: request.collection_source_url,
            created_at: self.clock.now(),
            transfer,
            cancel,
        };
        self.tasks.insert(request.asset_id.clone(), task);
        self.last_outcome.remove(&request.asset_id);

        info!(title = %request.title, "Download queued");
        self.emit(DownloadEvent::Queued {
            asset_id: request.asset_id.to_string(),
            title: request.title,
        });
        Ok(RequestOutcome::Enqueued)
    }

    /// Stops an active download. Returns whether one was running.
    #[instrument(skip(self))]
    pub fn cancel_download(&mut self, asset_id: &AssetId) -> bool {
        let Some(task) = self.tasks.remove(asset_id) else {
            return false;
        };

        task.cancel.cancel();
        self.last_outcome
            .insert(asset_id.clone(), DownloadState::Cancelled);
        info!("Download cancelled");
        self.emit(DownloadEvent::Cancelled {
            asset_id: asset_id.to_string(),
        });
        true
    }

    /// Removes a completed download's file and records. Deleting an asset
    /// that is not downloaded is a no-op.
    #[instrument(skip(self))]
    pub async fn delete_download(&mut self, asset_id: &AssetId) -> Result<()> {
        let path = self.local_path(asset_id);
        match self.fs.delete_file(&path).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(PlaybackError::filesystem(e)),
        }

        let was_recorded =
            self.downloaded.contains(asset_id) || self.metadata.contains_key(asset_id);
        if was_recorded {
            let mut downloaded = self.downloaded.clone();
            let mut metadata = self.metadata.clone();
            downloaded.remove(asset_id);
            metadata.remove(asset_id);
            self.persist(&downloaded, &metadata).await?;
            self.downloaded = downloaded;
            self.metadata = metadata;

            info!("Deleted download");
            self.emit(DownloadEvent::Deleted {
                asset_id: asset_id.to_string(),
            });
        }
        self.last_outcome.remove(asset_id);
        Ok(())
    }

    /// Applies one transfer event. Events from transfers that are no longer
    /// tracked are dropped, and any file they left behind is removed.
    pub async fn handle_transfer_event(&mut self, event: TransferEvent) {
        let current = self
            .tasks
            .get(event.asset_id())
            .is_some_and(|task| task.transfer == event.transfer());
        if !current {
            debug!(
                asset_id = %event.asset_id(),
                transfer = %event.transfer(),
                "Ignoring stale transfer event"
            );
            if let TransferEvent::Finished { partial_path, .. } = &event {
                self.remove_file(partial_path).await;
            }
            return;
        }

        match event {
            TransferEvent::Started { asset_id, .. } => {
                if let Some(task) = self.tasks.get_mut(&asset_id) {
                    task.state = DownloadState::InProgress { progress: 0.0 };
                }
            }
            TransferEvent::Progress {
                asset_id, progress, ..
            } => {
                if let Some(task) = self.tasks.get_mut(&asset_id) {
                    task.state = DownloadState::InProgress { progress };
                }
                self.emit(DownloadEvent::Progress {
                    asset_id: asset_id.to_string(),
                    percent: (progress * 100.0).round().clamp(0.0, 100.0) as u8,
                });
            }
            TransferEvent::Finished {
                asset_id,
                partial_path,
                ..
            } => {
                self.complete(asset_id, partial_path).await;
            }
            TransferEvent::Failed {
                asset_id, reason, ..
            } => {
                let error = PlaybackError::TransferFailure(reason);
                self.fail(asset_id, error);
            }
            TransferEvent::Cancelled { asset_id, .. } => {
                self.tasks.remove(&asset_id);
                self.last_outcome.insert(asset_id.clone(), DownloadState::Cancelled);
                self.emit(DownloadEvent::Cancelled {
                    asset_id: asset_id.to_string(),
                });
            }
        }
    }

    async fn complete(&mut self, asset_id: AssetId, partial_path: PathBuf) {
        let destination = self.local_path(&asset_id);

        match self.install(&asset_id, &partial_path, &destination).await {
            Ok(file_size) => {
                self.tasks.remove(&asset_id);
                self.last_outcome.insert(
                    asset_id.clone(),
                    DownloadState::Completed {
                        local_path: destination.clone(),
                    },
                );
                info!(
                    asset_id = %asset_id,
                    local_path = %file_label(&destination),
                    file_size,
                    "Download completed"
                );
                self.emit(DownloadEvent::Completed {
                    asset_id: asset_id.to_string(),
                    file_size,
                });
            }
            Err(error) => {
                self.remove_file(&partial_path).await;
                self.remove_file(&destination).await;
                self.fail(asset_id, error);
            }
        }
    }

    async fn install(
        &mut self,
        asset_id: &AssetId,
        partial_path: &Path,
        destination: &Path,
    ) -> Result<u64> {
        match self.fs.delete_file(destination).await {
            Ok(()) => debug!("Replaced stale download"),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(PlaybackError::filesystem(e)),
        }

        self.fs
            .rename(partial_path, destination)
            .await
            .map_err(PlaybackError::filesystem)?;

        let file_size = self
            .fs
            .metadata(destination)
            .await
            .map_err(PlaybackError::filesystem)?
            .size;
        if file_size == 0 {
            return Err(PlaybackError::FilesystemFailure(
                "downloaded file is empty".to_string(),
            ));
        }

        let task = self
            .tasks
            .get(asset_id)
            .ok_or_else(|| PlaybackError::Internal(format!("no task for {asset_id}")))?;
        let record = DownloadedAssetMetadata {
            asset_id: asset_id.clone(),
            title: task.title.clone(),
            collection_title: task.collection_title.clone(),
            collection_source_url: task.collection_source_url.clone(),
            downloaded_at: self.clock.now(),
            file_size,
        };

        let mut downloaded = self.downloaded.clone();
        let mut metadata = self.metadata.clone();
        downloaded.insert(asset_id.clone());
        metadata.insert(asset_id.clone(), record);
        self.persist(&downloaded, &metadata).await?;

        self.downloaded = downloaded;
        self.metadata = metadata;
        Ok(file_size)
    }

    fn fail(&mut self, asset_id: AssetId, error: PlaybackError) {
        self.tasks.remove(&asset_id);
        let reason = error.to_string();
        warn!(asset_id = %asset_id, error = %reason, "Download failed");
        self.last_outcome.insert(
            asset_id.clone(),
            DownloadState::Failed {
                reason: reason.clone(),
            },
        );
        self.emit(DownloadEvent::Failed {
            asset_id: asset_id.to_string(),
            reason,
        });
    }

    async fn restore(&mut self) -> Result<()> {
        let ids: Vec<AssetId> = self.read_setting(DOWNLOADED_ASSETS_KEY).await?.unwrap_or_default();
        let stored_metadata: HashMap<AssetId, DownloadedAssetMetadata> = self
            .read_setting(DOWNLOADED_METADATA_KEY)
            .await?
            .unwrap_or_default();

        let mut downloaded = HashSet::new();
        let mut pruned = 0usize;
        for id in ids {
            if self.verified_local_file(&id).await.is_some() {
                downloaded.insert(id);
            } else {
                debug!(asset_id = %id, "Pruning download whose file is missing");
                pruned += 1;
            }
        }

        let before = stored_metadata.len();
        let metadata: HashMap<_, _> = stored_metadata
            .into_iter()
            .filter(|(id, _)| downloaded.contains(id))
            .collect();
        pruned += before - metadata.len();

        if pruned > 0 {
            info!(pruned, "Removed stale download records");
            self.persist(&downloaded, &metadata).await?;
        }

        info!(count = downloaded.len(), "Restored downloads");
        self.downloaded = downloaded;
        self.metadata = metadata;
        Ok(())
    }

    async fn read_setting<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self
            .settings
            .get_string(key)
            .await
            .map_err(PlaybackError::persistence)?
        else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, error = %e, "Discarding undecodable download records");
                Ok(None)
            }
        }
    }

    async fn persist(
        &self,
        downloaded: &HashSet<AssetId>,
        metadata: &HashMap<AssetId, DownloadedAssetMetadata>,
    ) -> Result<()> {
        let mut ids: Vec<_> = downloaded.iter().collect();
        ids.sort();
        let ids_json = serde_json::to_string(&ids)?;
        let metadata_json = serde_json::to_string(metadata)?;

        let mut tx = self
            .settings
            .begin_transaction()
            .await
            .map_err(PlaybackError::persistence)?;

        let staged = match tx.set_string(DOWNLOADED_ASSETS_KEY, &ids_json).await {
            Ok(()) => tx.set_string(DOWNLOADED_METADATA_KEY, &metadata_json).await,
            Err(e) => Err(e),
        };
        if let Err(e) = staged {
            if let Err(rollback) = tx.rollback().await {
                warn!(error = %rollback, "Failed to roll back download records");
            }
            return Err(PlaybackError::persistence(e));
        }

        tx.commit().await.map_err(PlaybackError::persistence)
    }

    /// Partial files from a previous run are never resumed.
    async fn remove_stale_partials(&self) {
        let entries = match self.fs.list_directory(&self.directory).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Failed to list downloads directory");
                return;
            }
        };

        for entry in entries {
            if entry.extension().and_then(|ext| ext.to_str()) == Some("partial") {
                self.remove_file(&entry).await;
            }
        }
    }

    async fn remove_file(&self, path: &Path) {
        match self.fs.delete_file(path).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!(
                path = %file_label(path),
                error = %e,
                "Failed to remove download file"
            ),
        }
    }

    fn emit(&self, event: DownloadEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Download(event));
        }
    }
}

impl std::fmt::Debug for DownloadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadManager")
            .field("directory", &self.directory)
            .field("active", &self.tasks.len())
            .field("downloaded", &self.downloaded.len())
            .finish()
    }
}
