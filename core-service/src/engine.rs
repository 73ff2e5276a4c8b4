//! The engine task.
//!
//! One task owns the playback session, the download manager and the
//! listening history. Everything that touches them arrives here as a
//! message: handle commands, player callbacks, transfer progress and the
//! sampling tick. Nothing is shared, so nothing is locked.

use std::time::Duration;

use bridge_traits::{PlayerEvent, PlayerItemId};
use core_playback::download::TransferEventReceiver;
use core_playback::session::PlayerEventReceiver;
use core_playback::{
    AssetId, DownloadManager, DownloadRequest, DownloadState, DownloadTask,
    DownloadedAssetMetadata, ItemStatus, LoadOutcome, LoadRequest, PlaybackError,
    PlaybackHistoryItem, PlaybackHistoryStore, PlaybackSessionManager, RemoteCommand,
    RequestOutcome,
};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

type Reply<T> = oneshot::Sender<T>;
type PlaybackResult<T> = core_playback::Result<T>;

/// Messages from an [`EngineHandle`](crate::EngineHandle) to the engine task.
pub(crate) enum EngineCommand {
    // Playback
    Load {
        request: LoadRequest,
        reply: Reply<PlaybackResult<LoadOutcome>>,
    },
    Play {
        reply: Reply<PlaybackResult<()>>,
    },
    Pause {
        reply: Reply<PlaybackResult<()>>,
    },
    TogglePlayPause {
        reply: Reply<PlaybackResult<()>>,
    },
    Seek {
        position: f64,
        reply: Reply<()>,
    },
    Stop {
        reply: Reply<()>,
    },
    Remote {
        command: RemoteCommand,
        reply: Reply<PlaybackResult<()>>,
    },

    // Downloads
    RequestDownload {
        request: DownloadRequest,
        reply: Reply<PlaybackResult<RequestOutcome>>,
    },
    CancelDownload {
        asset_id: AssetId,
        reply: Reply<bool>,
    },
    DeleteDownload {
        asset_id: AssetId,
        reply: Reply<PlaybackResult<()>>,
    },
    DownloadState {
        asset_id: AssetId,
        reply: Reply<Option<DownloadState>>,
    },
    ActiveDownloads {
        reply: Reply<Vec<DownloadTask>>,
    },
    DownloadedAssets {
        reply: Reply<Vec<AssetId>>,
    },
    DownloadMetadata {
        asset_id: AssetId,
        reply: Reply<Option<DownloadedAssetMetadata>>,
    },

    // History
    PlaybackPosition {
        asset_id: AssetId,
        reply: Reply<Option<f64>>,
    },
    HistoryItem {
        asset_id: AssetId,
        reply: Reply<Option<PlaybackHistoryItem>>,
    },
    RecentlyPlayed {
        limit: usize,
        excluding_finished: bool,
        reply: Reply<Vec<PlaybackHistoryItem>>,
    },
    RemoveFromHistory {
        asset_id: AssetId,
        reply: Reply<PlaybackResult<()>>,
    },
    ClearHistory {
        reply: Reply<PlaybackResult<()>>,
    },

    /// Persist progress, cancel transfers and exit.
    Shutdown { reply: Reply<()> },
}

/// A load waiting for its player item to report readiness.
struct PendingLoad {
    item: PlayerItemId,
    reply: Reply<PlaybackResult<LoadOutcome>>,
}

pub(crate) struct Engine {
    session: PlaybackSessionManager,
    downloads: DownloadManager,
    history: PlaybackHistoryStore,
    commands: mpsc::Receiver<EngineCommand>,
    player_events: PlayerEventReceiver,
    transfer_events: TransferEventReceiver,
    tick_interval: Duration,
    pending_load: Option<PendingLoad>,
}

impl Engine {
    pub(crate) fn new(
        session: (PlaybackSessionManager, PlayerEventReceiver),
        downloads: (DownloadManager, TransferEventReceiver),
        history: PlaybackHistoryStore,
        commands: mpsc::Receiver<EngineCommand>,
    ) -> Self {
        let (session, player_events) = session;
        let (downloads, transfer_events) = downloads;
        let tick_interval = session.config().tick_interval;

        Self {
            session,
            downloads,
            history,
            commands,
            player_events,
            transfer_events,
            tick_interval,
            pending_load: None,
        }
    }

    pub(crate) async fn run(mut self) {
        info!(tick_ms = self.tick_interval.as_millis() as u64, "Media engine started");

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let shutdown_reply = loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(EngineCommand::Shutdown { reply }) => break Some(reply),
                    Some(command) => self.handle_command(command).await,
                    None => break None,
                },
                Some(event) = self.player_events.recv() => {
                    self.handle_player_event(event).await;
                }
                Some(event) = self.transfer_events.recv() => {
                    self.downloads.handle_transfer_event(event).await;
                }
                _ = ticker.tick() => {
                    self.session.tick(&mut self.history).await;
                }
            }
        };

        self.shutdown().await;
        if let Some(reply) = shutdown_reply {
            let _ = reply.send(());
        }
    }

    async fn shutdown(&mut self) {
        self.session.stop(&mut self.history).await;
        self.settle_superseded_load();

        for task in self.downloads.active_downloads() {
            self.downloads.cancel_download(&task.asset_id);
        }
        info!("Media engine stopped");
    }

    async fn handle_command(&mut self, command: EngineCommand) {
        let Self {
            session,
            downloads,
            history,
            ..
        } = &mut *self;

        match command {
            EngineCommand::Load { request, reply } => {
                let result = session.load(request, downloads, history).await;
                self.settle_superseded_load();
                match (result, self.session.current_item()) {
                    (Ok(LoadOutcome::Pending), Some(item)) => {
                        self.pending_load = Some(PendingLoad { item, reply });
                    }
                    (result, _) => {
                        let _ = reply.send(result);
                    }
                }
                return;
            }
            EngineCommand::Play { reply } => {
                let _ = reply.send(session.play(downloads).await);
            }
            EngineCommand::Pause { reply } => {
                let _ = reply.send(session.pause(history).await);
            }
            EngineCommand::TogglePlayPause { reply } => {
                let _ = reply.send(session.toggle_play_pause(downloads, history).await);
            }
            EngineCommand::Seek { position, reply } => {
                session.seek(position).await;
                let _ = reply.send(());
            }
            EngineCommand::Stop { reply } => {
                session.stop(history).await;
                let _ = reply.send(());
            }
            EngineCommand::Remote { command, reply } => {
                let _ = reply.send(session.remote_command(command, downloads, history).await);
            }
            EngineCommand::RequestDownload { request, reply } => {
                let _ = reply.send(downloads.request_download(request));
            }
            EngineCommand::CancelDownload { asset_id, reply } => {
                let _ = reply.send(downloads.cancel_download(&asset_id));
            }
            EngineCommand::DeleteDownload { asset_id, reply } => {
                let _ = reply.send(downloads.delete_download(&asset_id).await);
            }
            EngineCommand::DownloadState { asset_id, reply } => {
                let _ = reply.send(downloads.download_state(&asset_id));
            }
            EngineCommand::ActiveDownloads { reply } => {
                let _ = reply.send(downloads.active_downloads());
            }
            EngineCommand::DownloadedAssets { reply } => {
                let _ = reply.send(downloads.downloaded_assets());
            }
            EngineCommand::DownloadMetadata { asset_id, reply } => {
                let _ = reply.send(downloads.metadata(&asset_id).cloned());
            }
            EngineCommand::PlaybackPosition { asset_id, reply } => {
                let _ = reply.send(history.playback_position(&asset_id));
            }
            EngineCommand::HistoryItem { asset_id, reply } => {
                let _ = reply.send(history.history_item(&asset_id).cloned());
            }
            EngineCommand::RecentlyPlayed {
                limit,
                excluding_finished,
                reply,
            } => {
                let _ = reply.send(history.recently_played(limit, excluding_finished));
            }
            EngineCommand::RemoveFromHistory { asset_id, reply } => {
                let _ = reply.send(history.remove_from_history(&asset_id).await);
            }
            EngineCommand::ClearHistory { reply } => {
                let _ = reply.send(history.clear().await);
            }
            EngineCommand::Shutdown { reply } => {
                // Handled by the run loop.
                let _ = reply.send(());
            }
        }

        self.settle_superseded_load();
    }

    async fn handle_player_event(&mut self, event: PlayerEvent) {
        let status = self
            .session
            .handle_player_event(event, &mut self.downloads, &mut self.history)
            .await;

        let Some(status) = status else {
            return;
        };
        let item = match &status {
            ItemStatus::Ready { item } | ItemStatus::Failed { item, .. } => *item,
        };
        if self.pending_load.as_ref().map(|pending| pending.item) != Some(item) {
            return;
        }
        let Some(pending) = self.pending_load.take() else {
            return;
        };

        let result = match status {
            ItemStatus::Ready { .. } => Ok(LoadOutcome::Loaded),
            ItemStatus::Failed { reason, .. } => Err(PlaybackError::DecodeFailure(format!(
                "Playback failed: {reason}"
            ))),
        };
        let _ = pending.reply.send(result);
    }

    /// Fails a pending load whose player item is no longer current.
    fn settle_superseded_load(&mut self) {
        let current = self.session.current_item();
        let superseded = self
            .pending_load
            .as_ref()
            .is_some_and(|pending| Some(pending.item) != current);
        if !superseded {
            return;
        }

        if let Some(pending) = self.pending_load.take() {
            debug!(item = %pending.item, "Load superseded before it became ready");
            if pending.reply.send(Err(PlaybackError::LoadSuperseded)).is_err() {
                warn!(item = %pending.item, "Load caller went away");
            }
        }
    }
}
