//! # Core Playback
//!
//! The stateful half of the media engine:
//!
//! - [`session`]: the single playback session driving a platform
//!   [`MediaPlayer`](bridge_traits::MediaPlayer).
//! - [`download`]: background episode downloads for offline listening.
//! - [`history`]: remembered listening positions.
//!
//! None of these types lock internally. They are meant to be owned by one
//! task that feeds them commands and the events they produce.

pub mod asset;
pub mod config;
pub mod download;
pub mod error;
pub mod history;
pub mod session;
pub mod source;

pub use asset::AssetId;
pub use config::{DownloadConfig, HistoryConfig, PlaybackConfig};
pub use download::{
    DownloadManager, DownloadRequest, DownloadState, DownloadTask, DownloadedAssetMetadata,
    RequestOutcome, TransferEvent,
};
pub use error::{PlaybackError, Result};
pub use history::{PlaybackHistoryItem, PlaybackHistoryStore, PlaybackUpdate};
pub use session::{
    ItemStatus, LoadOutcome, LoadRequest, PlaybackSessionManager, RemoteCommand, SessionSnapshot,
    SessionState,
};
