//! Shared fakes for the playback integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_desktop::{SqliteSettingsStore, TokioFileSystem};
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    BridgeError, DownloadStream, FileMetadata, FileSystemAccess, HttpClient, HttpRequest,
    HttpResponse, ManualClock, MediaPlayer, MediaSource, NowPlayingCenter, NowPlayingInfo,
    PlayerEventSender, PlayerItemId, SettingsStore, SettingsTransaction,
};
use bytes::Bytes;
use core_playback::download::TransferEventReceiver;
use core_playback::session::PlayerEventReceiver;
use core_playback::{
    AssetId, DownloadConfig, DownloadManager, HistoryConfig, PlaybackConfig,
    PlaybackHistoryStore, PlaybackSessionManager, TransferEvent,
};
use parking_lot::Mutex;
use tokio::io::DuplexStream;
use uuid::Uuid;

// ============================================================================
// Fake Media Player
// ============================================================================

#[derive(Default)]
pub struct FakePlayerState {
    pub opened: Vec<(PlayerItemId, MediaSource)>,
    pub released: Vec<PlayerItemId>,
    pub seeks: Vec<(f64, u64)>,
    pub plays: usize,
    pub pauses: usize,
    pub position: f64,
    pub fail_open: bool,
}

#[derive(Default)]
pub struct FakePlayer {
    pub state: Mutex<FakePlayerState>,
}

impl FakePlayer {
    pub fn last_item(&self) -> PlayerItemId {
        self.state.lock().opened.last().map(|(item, _)| *item).unwrap()
    }

    pub fn last_source(&self) -> MediaSource {
        self.state.lock().opened.last().map(|(_, s)| s.clone()).unwrap()
    }

    pub fn set_position(&self, seconds: f64) {
        self.state.lock().position = seconds;
    }

    pub fn last_seek(&self) -> Option<(f64, u64)> {
        self.state.lock().seeks.last().copied()
    }
}

#[async_trait]
impl MediaPlayer for FakePlayer {
    async fn open(
        &self,
        item: PlayerItemId,
        source: MediaSource,
        _events: PlayerEventSender,
    ) -> BridgeResult<()> {
        let mut state = self.state.lock();
        if state.fail_open {
            return Err(BridgeError::OperationFailed("unsupported container".into()));
        }
        state.opened.push((item, source));
        state.position = 0.0;
        Ok(())
    }

    async fn play(&self, _item: PlayerItemId) -> BridgeResult<()> {
        self.state.lock().plays += 1;
        Ok(())
    }

    async fn pause(&self, _item: PlayerItemId) -> BridgeResult<()> {
        self.state.lock().pauses += 1;
        Ok(())
    }

    async fn seek(&self, _item: PlayerItemId, position: f64, token: u64) -> BridgeResult<()> {
        let mut state = self.state.lock();
        state.seeks.push((position, token));
        state.position = position;
        Ok(())
    }

    async fn current_time(&self, _item: PlayerItemId) -> BridgeResult<f64> {
        Ok(self.state.lock().position)
    }

    async fn release(&self, item: PlayerItemId) -> BridgeResult<()> {
        self.state.lock().released.push(item);
        Ok(())
    }
}

// ============================================================================
// Recording Now Playing Center
// ============================================================================

#[derive(Default)]
pub struct RecordingNowPlaying {
    pub published: Mutex<Vec<NowPlayingInfo>>,
    pub cleared: Mutex<usize>,
}

impl RecordingNowPlaying {
    pub fn last(&self) -> Option<NowPlayingInfo> {
        self.published.lock().last().cloned()
    }
}

impl NowPlayingCenter for RecordingNowPlaying {
    fn publish(&self, info: NowPlayingInfo) -> BridgeResult<()> {
        self.published.lock().push(info);
        Ok(())
    }

    fn clear(&self) -> BridgeResult<()> {
        *self.cleared.lock() += 1;
        Ok(())
    }
}

// ============================================================================
// Scripted HTTP Client
// ============================================================================

#[derive(Clone)]
pub enum Script {
    Body(Bytes),
    /// Advertise a length but send nothing.
    Empty,
    Status(u16),
    /// Never finishes.
    Hang,
}

#[derive(Default)]
pub struct ScriptedHttp {
    scripts: Mutex<HashMap<String, Script>>,
    held_writers: Mutex<Vec<DuplexStream>>,
    pub requests: Mutex<Vec<String>>,
}

impl ScriptedHttp {
    pub fn with(self, url: &str, script: Script) -> Self {
        self.scripts.lock().insert(url.to_string(), script);
        self
    }
}

#[async_trait]
impl HttpClient for ScriptedHttp {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        Err(BridgeError::NotAvailable(format!(
            "unexpected request to {}",
            request.url
        )))
    }

    async fn download_stream(&self, url: String) -> BridgeResult<DownloadStream> {
        self.requests.lock().push(url.clone());
        let script = self.scripts.lock().get(&url).cloned();
        match script {
            Some(Script::Body(body)) => Ok(DownloadStream::new(
                Some(body.len() as u64),
                Box::new(std::io::Cursor::new(body.to_vec())),
            )),
            Some(Script::Empty) => Ok(DownloadStream::new(
                None,
                Box::new(std::io::Cursor::new(Vec::new())),
            )),
            Some(Script::Status(status)) => Err(BridgeError::HttpStatus { status, url }),
            Some(Script::Hang) => {
                let (reader, writer) = tokio::io::duplex(64);
                self.held_writers.lock().push(writer);
                Ok(DownloadStream::new(Some(1024), Box::new(reader)))
            }
            None => Err(BridgeError::HttpStatus { status: 404, url }),
        }
    }
}

// ============================================================================
// Failure Injection
// ============================================================================

/// Real filesystem whose `rename` can be made to fail.
pub struct FlakyFileSystem {
    inner: Arc<TokioFileSystem>,
    pub fail_rename: AtomicBool,
}

impl FlakyFileSystem {
    pub fn new(inner: Arc<TokioFileSystem>) -> Self {
        Self {
            inner,
            fail_rename: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl FileSystemAccess for FlakyFileSystem {
    async fn get_cache_directory(&self) -> BridgeResult<PathBuf> {
        self.inner.get_cache_directory().await
    }

    async fn get_data_directory(&self) -> BridgeResult<PathBuf> {
        self.inner.get_data_directory().await
    }

    async fn exists(&self, path: &Path) -> BridgeResult<bool> {
        self.inner.exists(path).await
    }

    async fn metadata(&self, path: &Path) -> BridgeResult<FileMetadata> {
        self.inner.metadata(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> BridgeResult<()> {
        self.inner.create_dir_all(path).await
    }

    async fn read_file(&self, path: &Path) -> BridgeResult<Bytes> {
        self.inner.read_file(path).await
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> BridgeResult<()> {
        self.inner.write_file(path, data).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> BridgeResult<()> {
        if self.fail_rename.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("cross-device link".into()));
        }
        self.inner.rename(from, to).await
    }

    async fn delete_file(&self, path: &Path) -> BridgeResult<()> {
        self.inner.delete_file(path).await
    }

    async fn delete_dir_all(&self, path: &Path) -> BridgeResult<()> {
        self.inner.delete_dir_all(path).await
    }

    async fn list_directory(&self, path: &Path) -> BridgeResult<Vec<PathBuf>> {
        self.inner.list_directory(path).await
    }

    async fn open_write_stream(
        &self,
        path: &Path,
    ) -> BridgeResult<Box<dyn tokio::io::AsyncWrite + Send + Unpin>> {
        self.inner.open_write_stream(path).await
    }
}

/// Settings store whose transactions can be made to fail at commit.
pub struct FlakySettings {
    inner: Arc<SqliteSettingsStore>,
    pub fail_commit: Arc<AtomicBool>,
}

impl FlakySettings {
    pub fn new(inner: Arc<SqliteSettingsStore>) -> Self {
        Self {
            inner,
            fail_commit: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl SettingsStore for FlakySettings {
    async fn set_string(&self, key: &str, value: &str) -> BridgeResult<()> {
        self.inner.set_string(key, value).await
    }

    async fn get_string(&self, key: &str) -> BridgeResult<Option<String>> {
        self.inner.get_string(key).await
    }

    async fn set_bool(&self, key: &str, value: bool) -> BridgeResult<()> {
        self.inner.set_bool(key, value).await
    }

    async fn get_bool(&self, key: &str) -> BridgeResult<Option<bool>> {
        self.inner.get_bool(key).await
    }

    async fn set_i64(&self, key: &str, value: i64) -> BridgeResult<()> {
        self.inner.set_i64(key, value).await
    }

    async fn get_i64(&self, key: &str) -> BridgeResult<Option<i64>> {
        self.inner.get_i64(key).await
    }

    async fn delete(&self, key: &str) -> BridgeResult<()> {
        self.inner.delete(key).await
    }

    async fn has_key(&self, key: &str) -> BridgeResult<bool> {
        self.inner.has_key(key).await
    }

    async fn list_keys(&self) -> BridgeResult<Vec<String>> {
        self.inner.list_keys().await
    }

    async fn clear_all(&self) -> BridgeResult<()> {
        self.inner.clear_all().await
    }

    async fn begin_transaction(&self) -> BridgeResult<Box<dyn SettingsTransaction + Send>> {
        Ok(Box::new(FlakyTransaction {
            inner: self.inner.begin_transaction().await?,
            fail_commit: self.fail_commit.clone(),
        }))
    }
}

struct FlakyTransaction {
    inner: Box<dyn SettingsTransaction + Send>,
    fail_commit: Arc<AtomicBool>,
}

#[async_trait]
impl SettingsTransaction for FlakyTransaction {
    async fn set_string(&mut self, key: &str, value: &str) -> BridgeResult<()> {
        self.inner.set_string(key, value).await
    }

    async fn delete(&mut self, key: &str) -> BridgeResult<()> {
        self.inner.delete(key).await
    }

    async fn commit(self: Box<Self>) -> BridgeResult<()> {
        if self.fail_commit.load(Ordering::SeqCst) {
            self.inner.rollback().await?;
            return Err(BridgeError::DatabaseError("database is locked".into()));
        }
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> BridgeResult<()> {
        self.inner.rollback().await
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub struct Harness {
    pub root: PathBuf,
    pub fs: Arc<TokioFileSystem>,
    pub settings: Arc<SqliteSettingsStore>,
    pub clock: Arc<ManualClock>,
    pub http: Arc<ScriptedHttp>,
}

impl Harness {
    pub async fn new(http: ScriptedHttp) -> Self {
        let root = std::env::temp_dir().join(format!("core-playback-it-{}", Uuid::new_v4()));
        Self {
            fs: Arc::new(TokioFileSystem::with_directories(
                root.join("cache"),
                root.join("data"),
            )),
            settings: Arc::new(SqliteSettingsStore::in_memory().await.unwrap()),
            clock: Arc::new(ManualClock::default()),
            http: Arc::new(http),
            root,
        }
    }

    pub async fn downloads(&self) -> (DownloadManager, TransferEventReceiver) {
        self.downloads_with(self.fs.clone(), self.settings.clone()).await
    }

    /// A manager over substitute storage, sharing this harness's HTTP and clock.
    pub async fn downloads_with(
        &self,
        fs: Arc<dyn FileSystemAccess>,
        settings: Arc<dyn SettingsStore>,
    ) -> (DownloadManager, TransferEventReceiver) {
        DownloadManager::open(
            fs,
            self.http.clone(),
            settings,
            self.clock.clone(),
            DownloadConfig::default(),
        )
        .await
        .unwrap()
    }

    pub async fn history(&self) -> PlaybackHistoryStore {
        PlaybackHistoryStore::load(
            self.settings.clone(),
            self.clock.clone(),
            HistoryConfig::default(),
        )
        .await
        .unwrap()
    }

    pub fn session(
        &self,
        player: Arc<FakePlayer>,
        now_playing: Arc<RecordingNowPlaying>,
    ) -> (PlaybackSessionManager, PlayerEventReceiver) {
        PlaybackSessionManager::new(player, now_playing, PlaybackConfig::default()).unwrap()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

/// Feeds transfer events to the manager until `asset_id` is no longer active.
pub async fn drive_transfers(
    manager: &mut DownloadManager,
    events: &mut TransferEventReceiver,
    asset_id: &AssetId,
) -> Vec<TransferEvent> {
    let mut seen = Vec::new();
    while manager.is_downloading(asset_id) {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("transfer stalled")
            .expect("transfer channel closed");
        seen.push(event.clone());
        manager.handle_transfer_event(event).await;
    }
    seen
}
