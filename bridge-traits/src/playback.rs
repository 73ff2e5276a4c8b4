//! Playback bridge traits and supporting media types.
//!
//! These abstractions let the engine drive a platform audio engine (AVPlayer,
//! ExoPlayer, a desktop decoder) without knowing how it decodes or renders.
//! The engine addresses one player item at a time; asynchronous outcomes such
//! as readiness, failures, seek completion and end of stream are reported back
//! over a [`PlayerEventSender`] rather than through callbacks.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Where the audio for a player item comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "location", rename_all = "snake_case")]
pub enum MediaSource {
    /// Completed download on local storage.
    LocalFile(PathBuf),
    /// Remote HTTP(S) stream.
    Remote(String),
}

impl MediaSource {
    /// Determine whether the source represents remote content.
    pub fn is_remote(&self) -> bool {
        matches!(self, MediaSource::Remote(_))
    }

    /// Human-readable location (path or URL).
    pub fn location(&self) -> String {
        match self {
            MediaSource::LocalFile(path) => path.display().to_string(),
            MediaSource::Remote(url) => url.clone(),
        }
    }
}

/// Identifier of a single player item.
///
/// A new item is opened for every load; events carry the id of the item they
/// belong to so that events from a released item can be recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayerItemId(Uuid);

impl PlayerItemId {
    /// Generate a new item identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Borrow the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PlayerItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Asynchronous notifications emitted by a [`MediaPlayer`].
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// The item can start playing. `duration` is in seconds and may be
    /// non-finite or zero for live or malformed streams.
    Ready { item: PlayerItemId, duration: f64 },
    /// The item hit a terminal error and will not become playable.
    Failed { item: PlayerItemId, reason: String },
    /// A seek issued with `token` finished. `finished` is false when the
    /// player interrupted it.
    SeekCompleted {
        item: PlayerItemId,
        token: u64,
        finished: bool,
    },
    /// Playback reached the end of the item.
    Ended { item: PlayerItemId },
}

impl PlayerEvent {
    /// The item this event belongs to.
    pub fn item(&self) -> PlayerItemId {
        match self {
            PlayerEvent::Ready { item, .. }
            | PlayerEvent::Failed { item, .. }
            | PlayerEvent::SeekCompleted { item, .. }
            | PlayerEvent::Ended { item } => *item,
        }
    }
}

/// Channel on which a player reports [`PlayerEvent`]s.
pub type PlayerEventSender = mpsc::UnboundedSender<PlayerEvent>;

/// Platform audio engine.
///
/// All positions are in seconds.
#[async_trait]
pub trait MediaPlayer: Send + Sync {
    /// Start preparing `source` as player item `item`.
    ///
    /// Returns once preparation has been started; readiness or failure is
    /// reported later on `events`.
    async fn open(
        &self,
        item: PlayerItemId,
        source: MediaSource,
        events: PlayerEventSender,
    ) -> Result<()>;

    /// Begin or resume playback.
    async fn play(&self, item: PlayerItemId) -> Result<()>;

    /// Pause playback without releasing the item.
    async fn pause(&self, item: PlayerItemId) -> Result<()>;

    /// Start seeking to `position`; completion is reported as
    /// [`PlayerEvent::SeekCompleted`] carrying `token`.
    async fn seek(&self, item: PlayerItemId, position: f64, token: u64) -> Result<()>;

    /// Current playback position of the item.
    async fn current_time(&self, item: PlayerItemId) -> Result<f64>;

    /// Release decoder resources. No events for `item` may be emitted afterwards.
    async fn release(&self, item: PlayerItemId) -> Result<()>;
}

/// Metadata published to system now-playing surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NowPlayingInfo {
    pub title: String,
    /// Podcast (collection) title.
    pub artist: String,
    pub duration: f64,
    pub elapsed: f64,
    /// 1.0 while playing, 0.0 otherwise.
    pub rate: f64,
}

/// System now-playing surface (lock screen, media keys overlay).
pub trait NowPlayingCenter: Send + Sync {
    fn publish(&self, info: NowPlayingInfo) -> Result<()>;

    fn clear(&self) -> Result<()>;
}
