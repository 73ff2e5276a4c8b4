//! Playback session manager.
//!
//! Drives a single [`MediaPlayer`] item through
//! `Idle -> Loading -> Ready -> Playing/Paused -> Idle`, with `Failed`
//! reachable from any loaded state. Player callbacks arrive as
//! [`PlayerEvent`]s tagged with the item they belong to; events for anything
//! but the current item are ignored.
//!
//! The manager does not own the download manager or the history store. The
//! owner passes them in, so all three can live on one task without locks.

use std::sync::Arc;

use bridge_traits::{
    MediaPlayer, MediaSource, NowPlayingCenter, NowPlayingInfo, PlayerEvent, PlayerItemId,
};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use core_runtime::logging::{file_label, strip_query};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

use super::remote::RemoteCommand;
use super::state::{LoadOutcome, LoadRequest, SessionSnapshot, SessionState};
use crate::asset::AssetId;
use crate::config::PlaybackConfig;
use crate::download::{DownloadManager, DownloadRequest};
use crate::error::{PlaybackError, Result};
use crate::history::{PlaybackHistoryStore, PlaybackUpdate};
use crate::source;

pub type PlayerEventReceiver = mpsc::UnboundedReceiver<PlayerEvent>;

/// How a player item's preparation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemStatus {
    Ready { item: PlayerItemId },
    Failed { item: PlayerItemId, reason: String },
}

#[derive(Debug, Clone, Copy)]
struct PendingSeek {
    token: u64,
    target: f64,
}

pub struct PlaybackSessionManager {
    player: Arc<dyn MediaPlayer>,
    now_playing: Arc<dyn NowPlayingCenter>,
    config: PlaybackConfig,
    player_events: mpsc::UnboundedSender<PlayerEvent>,
    session: SessionSnapshot,
    item: Option<PlayerItemId>,
    /// Remote URL from the load request, kept for history and downloads.
    source_url: String,
    seek_generation: u64,
    pending_seek: Option<PendingSeek>,
    queued_seek: Option<f64>,
    autoplay_on_ready: bool,
    unsaved_listening: f64,
    snapshots: watch::Sender<SessionSnapshot>,
    event_bus: Option<EventBus>,
}

impl PlaybackSessionManager {
    pub fn new(
        player: Arc<dyn MediaPlayer>,
        now_playing: Arc<dyn NowPlayingCenter>,
        config: PlaybackConfig,
    ) -> Result<(Self, PlayerEventReceiver)> {
        config.validate().map_err(PlaybackError::Internal)?;

        let (player_events, receiver) = mpsc::unbounded_channel();
        let (snapshots, _) = watch::channel(SessionSnapshot::default());

        Ok((
            Self {
                player,
                now_playing,
                config,
                player_events,
                session: SessionSnapshot::default(),
                item: None,
                source_url: String::new(),
                seek_generation: 0,
                pending_seek: None,
                queued_seek: None,
                autoplay_on_ready: false,
                unsaved_listening: 0.0,
                snapshots,
                event_bus: None,
            },
            receiver,
        ))
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn snapshot(&self) -> &SessionSnapshot {
        &self.session
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn current_item(&self) -> Option<PlayerItemId> {
        self.item
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Makes `request` the current session.
    ///
    /// Prefers a verified local download over the stream. Returns
    /// [`LoadOutcome::Pending`] once the player item is opening; readiness
    /// arrives later as a player event.
    #[instrument(skip(self, request, downloads, history), fields(asset_id = %request.asset_id))]
    pub async fn load(
        &mut self,
        request: LoadRequest,
        downloads: &mut DownloadManager,
        history: &mut PlaybackHistoryStore,
    ) -> Result<LoadOutcome> {
        if self.session.asset_id.as_ref() == Some(&request.asset_id)
            && !matches!(self.session.state, SessionState::Failed | SessionState::Idle)
        {
            debug!("Asset already loaded");
            self.session.presented = true;
            if request.autoplay {
                if self.session.state == SessionState::Loading {
                    self.autoplay_on_ready = true;
                } else if self.session.state != SessionState::Playing {
                    self.play(downloads).await?;
                }
            }
            self.changed();
            return Ok(LoadOutcome::AlreadyLoaded);
        }

        self.teardown(history).await;

        self.session = SessionSnapshot {
            asset_id: Some(request.asset_id.clone()),
            title: request.title.clone(),
            collection_title: request.collection_title.clone(),
            collection_id: request.collection_id.clone(),
            state: SessionState::Loading,
            is_buffering: true,
            presented: true,
            ..SessionSnapshot::default()
        };
        self.source_url = request.source_url.trim().to_string();
        self.queued_seek = request.start_at.map(|t| t.max(0.0));
        self.autoplay_on_ready = request.autoplay;
        self.unsaved_listening = 0.0;

        let source = match downloads.verified_local_file(&request.asset_id).await {
            Some(path) => MediaSource::LocalFile(path),
            None => match source::validate_remote_url(&request.source_url) {
                Ok(url) => MediaSource::Remote(url),
                Err(e) => {
                    self.fail(e.to_string());
                    return Err(e);
                }
            },
        };

        let location = match &source {
            MediaSource::LocalFile(path) => file_label(path),
            MediaSource::Remote(url) => strip_query(url).to_string(),
        };
        info!(title = %request.title, source = %location, "Loading episode");
        self.session.source = Some(source.clone());
        self.emit(PlaybackEvent::Loading {
            asset_id: request.asset_id.to_string(),
            title: request.title,
            local: !source.is_remote(),
        });

        let item = PlayerItemId::new();
        self.item = Some(item);
        self.changed();

        if let Err(e) = self.player.open(item, source, self.player_events.clone()).await {
            let message = format!("Playback failed: {e}");
            self.fail(message.clone());
            return Err(PlaybackError::DecodeFailure(message));
        }

        Ok(LoadOutcome::Pending)
    }

    /// Releases the current item, saving progress first if any was made.
    async fn teardown(&mut self, history: &mut PlaybackHistoryStore) {
        if self.session.asset_id.is_some()
            && self.session.state != SessionState::Failed
            && self.session.current_time > 0.0
        {
            self.save_progress(history).await;
        }
        self.release_item().await;
    }

    async fn release_item(&mut self) {
        if let Some(item) = self.item.take() {
            if let Err(e) = self.player.release(item).await {
                warn!(item = %item, error = %e, "Failed to release player item");
            }
        }
        self.pending_seek = None;
        self.queued_seek = None;
    }

    // ------------------------------------------------------------------
    // Player events
    // ------------------------------------------------------------------

    pub async fn handle_player_event(
        &mut self,
        event: PlayerEvent,
        downloads: &mut DownloadManager,
        history: &mut PlaybackHistoryStore,
    ) -> Option<ItemStatus> {
        if self.item != Some(event.item()) {
            debug!(item = %event.item(), "Ignoring event for released player item");
            return None;
        }

        match event {
            PlayerEvent::Ready { item, duration } => {
                if self.session.state != SessionState::Loading {
                    return None;
                }
                self.on_ready(item, duration, downloads, history).await;
                Some(ItemStatus::Ready { item })
            }
            PlayerEvent::Failed { item, reason } => {
                let message = format!("Playback failed: {reason}");
                self.fail(message);
                if let Err(e) = self.player.release(item).await {
                    debug!(error = %e, "Failed to release failed player item");
                }
                Some(ItemStatus::Failed { item, reason })
            }
            PlayerEvent::SeekCompleted {
                token, finished, ..
            } => {
                self.on_seek_completed(token, finished);
                None
            }
            PlayerEvent::Ended { .. } => {
                self.on_ended(history).await;
                None
            }
        }
    }

    async fn on_ready(
        &mut self,
        item: PlayerItemId,
        duration: f64,
        downloads: &mut DownloadManager,
        history: &mut PlaybackHistoryStore,
    ) {
        let Some(asset_id) = self.session.asset_id.clone() else {
            return;
        };

        self.session.state = SessionState::Ready;
        self.session.is_buffering = false;
        self.session.duration = if duration.is_finite() && duration > 0.0 {
            duration
        } else {
            0.0
        };

        let resumed_at = history
            .playback_position(&asset_id)
            .filter(|position| *position > 0.0);
        let target = self.queued_seek.take().or(resumed_at);
        if let Some(target) = target {
            self.issue_seek(item, target).await;
        }

        info!(
            asset_id = %asset_id,
            duration = self.session.duration,
            resumed_at = ?resumed_at,
            "Episode ready"
        );
        self.emit(PlaybackEvent::Ready {
            asset_id: asset_id.to_string(),
            duration_ms: (self.session.duration > 0.0).then(|| millis(self.session.duration)),
            resumed_at_ms: target.map(millis),
        });

        if std::mem::take(&mut self.autoplay_on_ready) {
            if let Err(e) = self.play(downloads).await {
                warn!(error = %e, "Autoplay failed");
            }
        }

        self.save_progress(history).await;
        self.changed();
    }

    fn on_seek_completed(&mut self, token: u64, finished: bool) {
        let Some(pending) = self.pending_seek else {
            return;
        };
        if pending.token != token {
            debug!(token, latest = pending.token, "Dropping superseded seek");
            return;
        }

        self.pending_seek = None;
        if !finished {
            // Sampling resumes from wherever the player stopped.
            debug!(token, "Seek interrupted");
            return;
        }
        self.session.current_time = pending.target;
        self.emit(PlaybackEvent::Seeked {
            asset_id: self.asset_string(),
            position_ms: millis(pending.target),
        });
        self.changed();
    }

    async fn on_ended(&mut self, history: &mut PlaybackHistoryStore) {
        if self.session.duration > 0.0 {
            self.session.current_time = self.session.duration;
        }
        self.session.is_playing = false;
        self.session.state = SessionState::Paused;
        self.pending_seek = None;

        info!(asset_id = %self.asset_string(), "Episode finished");
        self.save_progress(history).await;
        self.emit(PlaybackEvent::Ended {
            asset_id: self.asset_string(),
        });
        self.changed();
    }

    // ------------------------------------------------------------------
    // Transport controls
    // ------------------------------------------------------------------

    /// Starts playback. Streaming an episode also queues its download when
    /// `auto_download_on_play` is set.
    pub async fn play(&mut self, downloads: &mut DownloadManager) -> Result<()> {
        let Some(item) = self.controllable_item() else {
            return Ok(());
        };
        if self.session.state == SessionState::Playing {
            return Ok(());
        }

        if let Err(e) = self.player.play(item).await {
            let message = format!("Playback failed: {e}");
            self.fail(message.clone());
            return Err(PlaybackError::DecodeFailure(message));
        }

        self.session.state = SessionState::Playing;
        self.session.is_playing = true;
        self.emit(PlaybackEvent::Playing {
            asset_id: self.asset_string(),
            position_ms: millis(self.session.current_time),
        });
        self.changed();

        self.maybe_start_download(downloads);
        Ok(())
    }

    pub async fn pause(&mut self, history: &mut PlaybackHistoryStore) -> Result<()> {
        let Some(item) = self.controllable_item() else {
            return Ok(());
        };
        if self.session.state != SessionState::Playing {
            return Ok(());
        }

        if let Err(e) = self.player.pause(item).await {
            let message = format!("Playback failed: {e}");
            self.fail(message.clone());
            return Err(PlaybackError::DecodeFailure(message));
        }

        self.session.state = SessionState::Paused;
        self.session.is_playing = false;
        self.emit(PlaybackEvent::Paused {
            asset_id: self.asset_string(),
            position_ms: millis(self.session.current_time),
        });
        self.save_progress(history).await;
        self.changed();
        Ok(())
    }

    pub async fn toggle_play_pause(
        &mut self,
        downloads: &mut DownloadManager,
        history: &mut PlaybackHistoryStore,
    ) -> Result<()> {
        if self.session.state == SessionState::Playing {
            self.pause(history).await
        } else {
            self.play(downloads).await
        }
    }

    /// Seeks to `time` seconds, clamped to the known duration. While loading
    /// the target is applied once the item is ready.
    pub async fn seek(&mut self, time: f64) {
        if !time.is_finite() {
            return;
        }
        if self.session.state == SessionState::Loading {
            self.queued_seek = Some(time.max(0.0));
            return;
        }
        let Some(item) = self.controllable_item() else {
            return;
        };
        self.issue_seek(item, time).await;
        self.changed();
    }

    pub async fn skip_forward(&mut self, seconds: f64) {
        let base = self.effective_position();
        self.seek(base + seconds).await;
    }

    pub async fn skip_backward(&mut self, seconds: f64) {
        let base = self.effective_position();
        self.seek(base - seconds).await;
    }

    async fn issue_seek(&mut self, item: PlayerItemId, time: f64) {
        let mut target = time.max(0.0);
        if self.session.duration > 0.0 {
            target = target.min(self.session.duration);
        }

        self.seek_generation += 1;
        let token = self.seek_generation;
        self.pending_seek = Some(PendingSeek { token, target });
        self.session.current_time = target;

        if let Err(e) = self.player.seek(item, target, token).await {
            warn!(error = %e, target, "Seek failed");
            self.pending_seek = None;
        }
    }

    /// Where playback is headed: the outstanding seek target if any.
    fn effective_position(&self) -> f64 {
        if self.session.state == SessionState::Loading {
            if let Some(queued) = self.queued_seek {
                return queued;
            }
        }
        self.pending_seek
            .map(|pending| pending.target)
            .unwrap_or(self.session.current_time)
    }

    // ------------------------------------------------------------------
    // Periodic sampling
    // ------------------------------------------------------------------

    /// Samples the player clock. Call every `tick_interval` while playing.
    pub async fn tick(&mut self, history: &mut PlaybackHistoryStore) {
        if self.session.state != SessionState::Playing || self.pending_seek.is_some() {
            return;
        }
        let Some(item) = self.item else {
            return;
        };

        let sampled = match self.player.current_time(item).await {
            Ok(time) if time.is_finite() => time,
            Ok(_) => return,
            Err(e) => {
                debug!(error = %e, "Failed to sample playback position");
                return;
            }
        };
        let sampled = if self.session.duration > 0.0 {
            sampled.min(self.session.duration)
        } else {
            sampled
        };

        let delta = sampled - self.session.current_time;
        if delta <= self.config.time_update_threshold {
            return;
        }

        self.session.current_time = sampled;
        self.unsaved_listening += delta;
        if self.unsaved_listening >= self.config.history_save_interval {
            self.save_progress(history).await;
        }
        self.changed();
    }

    // ------------------------------------------------------------------
    // Stop and remote commands
    // ------------------------------------------------------------------

    /// Saves progress, releases the player item and returns to `Idle`.
    pub async fn stop(&mut self, history: &mut PlaybackHistoryStore) {
        let Some(asset_id) = self.session.asset_id.clone() else {
            return;
        };
        let position = self.session.current_time;

        if self.session.state != SessionState::Failed {
            self.save_progress(history).await;
        }
        self.release_item().await;
        self.session = SessionSnapshot::default();
        self.source_url.clear();
        self.autoplay_on_ready = false;
        self.unsaved_listening = 0.0;

        if let Err(e) = self.now_playing.clear() {
            debug!(error = %e, "Failed to clear now playing");
        }
        info!(asset_id = %asset_id, "Playback stopped");
        self.emit(PlaybackEvent::Stopped {
            asset_id: asset_id.to_string(),
            position_ms: millis(position),
        });
        self.snapshots.send_replace(self.session.clone());
    }

    pub async fn remote_command(
        &mut self,
        command: RemoteCommand,
        downloads: &mut DownloadManager,
        history: &mut PlaybackHistoryStore,
    ) -> Result<()> {
        debug!(?command, "Remote command");
        match command {
            RemoteCommand::Play => self.play(downloads).await,
            RemoteCommand::Pause => self.pause(history).await,
            RemoteCommand::TogglePlayPause => self.toggle_play_pause(downloads, history).await,
            RemoteCommand::SkipForward(seconds) => {
                let seconds = seconds.unwrap_or(self.config.skip_interval);
                self.skip_forward(seconds).await;
                Ok(())
            }
            RemoteCommand::SkipBackward(seconds) => {
                let seconds = seconds.unwrap_or(self.config.skip_interval);
                self.skip_backward(seconds).await;
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn controllable_item(&self) -> Option<PlayerItemId> {
        if self.session.state.accepts_controls() {
            self.item
        } else {
            None
        }
    }

    fn maybe_start_download(&self, downloads: &mut DownloadManager) {
        if !self.config.auto_download_on_play {
            return;
        }
        let (Some(asset_id), Some(MediaSource::Remote(url))) =
            (self.session.asset_id.as_ref(), self.session.source.as_ref())
        else {
            return;
        };
        if downloads.is_downloaded(asset_id) || downloads.is_downloading(asset_id) {
            return;
        }

        let request = DownloadRequest {
            asset_id: asset_id.clone(),
            source_url: url.clone(),
            title: self.session.title.clone(),
            collection_title: self.session.collection_title.clone(),
            collection_source_url: None,
        };
        if let Err(e) = downloads.request_download(request) {
            warn!(asset_id = %asset_id, error = %e, "Automatic download request failed");
        }
    }

    async fn save_progress(&mut self, history: &mut PlaybackHistoryStore) {
        let Some(asset_id) = self.session.asset_id.clone() else {
            return;
        };
        self.unsaved_listening = 0.0;

        let source_location = if self.source_url.is_empty() {
            self.session
                .source
                .as_ref()
                .map(MediaSource::location)
                .unwrap_or_default()
        } else {
            self.source_url.clone()
        };
        let update = PlaybackUpdate {
            asset_id: asset_id.clone(),
            title: self.session.title.clone(),
            collection_title: self.session.collection_title.clone(),
            collection_id: self.session.collection_id.clone(),
            source_location,
            current_time: self.session.current_time,
            duration: self.session.duration,
        };

        match history.update_playback(update).await {
            Ok(item) => self.emit(PlaybackEvent::ProgressSaved {
                asset_id: asset_id.to_string(),
                position_ms: millis(item.current_time),
                duration_ms: millis(item.duration),
                finished: item.is_finished,
            }),
            Err(e) => warn!(asset_id = %asset_id, error = %e, "Failed to save listening progress"),
        }
    }

    fn fail(&mut self, message: String) {
        warn!(asset_id = ?self.session.asset_id, error = %message, "Playback failed");
        self.session.state = SessionState::Failed;
        self.session.is_playing = false;
        self.session.is_buffering = false;
        self.session.last_error = Some(message.clone());
        self.pending_seek = None;
        self.queued_seek = None;
        self.autoplay_on_ready = false;

        self.emit(PlaybackEvent::Error {
            asset_id: self.session.asset_id.as_ref().map(AssetId::to_string),
            message,
            recoverable: true,
        });
        self.changed();
    }

    /// Publishes the snapshot to watchers and the now-playing surface.
    fn changed(&self) {
        self.snapshots.send_replace(self.session.clone());

        if self.session.asset_id.is_none() {
            return;
        }
        let info = NowPlayingInfo {
            title: self.session.title.clone(),
            artist: self.session.collection_title.clone(),
            duration: self.session.duration,
            elapsed: self.session.current_time,
            rate: if self.session.is_playing { 1.0 } else { 0.0 },
        };
        if let Err(e) = self.now_playing.publish(info) {
            debug!(error = %e, "Failed to publish now playing");
        }
    }

    fn asset_string(&self) -> String {
        self.session
            .asset_id
            .as_ref()
            .map(AssetId::to_string)
            .unwrap_or_default()
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Playback(event));
        }
    }
}

fn millis(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1000.0).round() as u64
}
