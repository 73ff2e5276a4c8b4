//! Cloneable front door to the engine task.

use core_playback::download::TransferEventReceiver;
use core_playback::session::PlayerEventReceiver;
use core_playback::{
    AssetId, DownloadManager, DownloadRequest, DownloadState, DownloadTask,
    DownloadedAssetMetadata, LoadOutcome, LoadRequest, PlaybackHistoryItem, PlaybackHistoryStore,
    PlaybackSessionManager, RemoteCommand, RequestOutcome, SessionSnapshot,
};
use tokio::sync::{mpsc, oneshot, watch};

use crate::engine::{Engine, EngineCommand};
use crate::error::{CoreError, Result};

/// Number of entries [`EngineHandle::recently_played`] returns by default.
pub const DEFAULT_RECENT_LIMIT: usize = 3;

const COMMAND_BUFFER: usize = 32;

/// Talks to the engine task over a command channel.
///
/// Every method is a round trip; calls made from one task are applied in
/// order. Once the engine has stopped every call returns
/// [`CoreError::EngineStopped`].
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<EngineCommand>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl EngineHandle {
    /// Spawns the engine task on the current runtime.
    pub fn spawn(
        session: (PlaybackSessionManager, PlayerEventReceiver),
        downloads: (DownloadManager, TransferEventReceiver),
        history: PlaybackHistoryStore,
    ) -> Self {
        let snapshots = session.0.subscribe();
        let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);

        let engine = Engine::new(session, downloads, history, receiver);
        tokio::spawn(engine.run());

        Self {
            commands,
            snapshots,
        }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> EngineCommand,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| CoreError::EngineStopped)?;
        response.await.map_err(|_| CoreError::EngineStopped)
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    /// Loads an episode and waits until the player is ready with it.
    ///
    /// Returns [`LoadOutcome::AlreadyLoaded`] when the episode is already
    /// the current session. Fails with `LoadSuperseded` if another load or a
    /// stop replaces it first.
    pub async fn load(&self, request: LoadRequest) -> Result<LoadOutcome> {
        Ok(self
            .request(|reply| EngineCommand::Load { request, reply })
            .await??)
    }

    pub async fn play(&self) -> Result<()> {
        Ok(self.request(|reply| EngineCommand::Play { reply }).await??)
    }

    pub async fn pause(&self) -> Result<()> {
        Ok(self.request(|reply| EngineCommand::Pause { reply }).await??)
    }

    pub async fn toggle_play_pause(&self) -> Result<()> {
        Ok(self
            .request(|reply| EngineCommand::TogglePlayPause { reply })
            .await??)
    }

    pub async fn seek(&self, position: f64) -> Result<()> {
        self.request(|reply| EngineCommand::Seek { position, reply })
            .await
    }

    /// Skips ahead by `seconds`, or the configured interval.
    pub async fn skip_forward(&self, seconds: Option<f64>) -> Result<()> {
        self.remote_command(RemoteCommand::SkipForward(seconds)).await
    }

    pub async fn skip_backward(&self, seconds: Option<f64>) -> Result<()> {
        self.remote_command(RemoteCommand::SkipBackward(seconds))
            .await
    }

    pub async fn stop(&self) -> Result<()> {
        self.request(|reply| EngineCommand::Stop { reply }).await
    }

    pub async fn remote_command(&self, command: RemoteCommand) -> Result<()> {
        Ok(self
            .request(|reply| EngineCommand::Remote { command, reply })
            .await??)
    }

    /// The latest published session state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Watches session state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    // ------------------------------------------------------------------
    // Downloads
    // ------------------------------------------------------------------

    pub async fn request_download(&self, request: DownloadRequest) -> Result<RequestOutcome> {
        Ok(self
            .request(|reply| EngineCommand::RequestDownload { request, reply })
            .await??)
    }

    /// Returns whether an active download was cancelled.
    pub async fn cancel_download(&self, asset_id: AssetId) -> Result<bool> {
        self.request(|reply| EngineCommand::CancelDownload { asset_id, reply })
            .await
    }

    pub async fn delete_download(&self, asset_id: AssetId) -> Result<()> {
        Ok(self
            .request(|reply| EngineCommand::DeleteDownload { asset_id, reply })
            .await??)
    }

    pub async fn download_state(&self, asset_id: AssetId) -> Result<Option<DownloadState>> {
        self.request(|reply| EngineCommand::DownloadState { asset_id, reply })
            .await
    }

    pub async fn is_downloaded(&self, asset_id: AssetId) -> Result<bool> {
        Ok(matches!(
            self.download_state(asset_id).await?,
            Some(DownloadState::Completed { .. })
        ))
    }

    pub async fn active_downloads(&self) -> Result<Vec<DownloadTask>> {
        self.request(|reply| EngineCommand::ActiveDownloads { reply })
            .await
    }

    pub async fn downloaded_assets(&self) -> Result<Vec<AssetId>> {
        self.request(|reply| EngineCommand::DownloadedAssets { reply })
            .await
    }

    pub async fn download_metadata(
        &self,
        asset_id: AssetId,
    ) -> Result<Option<DownloadedAssetMetadata>> {
        self.request(|reply| EngineCommand::DownloadMetadata { asset_id, reply })
            .await
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    pub async fn playback_position(&self, asset_id: AssetId) -> Result<Option<f64>> {
        self.request(|reply| EngineCommand::PlaybackPosition { asset_id, reply })
            .await
    }

    pub async fn history_item(&self, asset_id: AssetId) -> Result<Option<PlaybackHistoryItem>> {
        self.request(|reply| EngineCommand::HistoryItem { asset_id, reply })
            .await
    }

    /// Most recent unfinished episodes, newest first.
    pub async fn recently_played(&self, limit: Option<usize>) -> Result<Vec<PlaybackHistoryItem>> {
        let limit = limit.unwrap_or(DEFAULT_RECENT_LIMIT);
        self.request(|reply| EngineCommand::RecentlyPlayed {
            limit,
            excluding_finished: true,
            reply,
        })
        .await
    }

    pub async fn remove_from_history(&self, asset_id: AssetId) -> Result<()> {
        Ok(self
            .request(|reply| EngineCommand::RemoveFromHistory { asset_id, reply })
            .await??)
    }

    pub async fn clear_history(&self) -> Result<()> {
        Ok(self
            .request(|reply| EngineCommand::ClearHistory { reply })
            .await??)
    }

    /// Saves progress, cancels transfers and stops the engine task.
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        let _ = self.request(|reply| EngineCommand::Shutdown { reply }).await;
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }
}
