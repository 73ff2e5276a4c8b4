//! Offline downloads: request, track, complete and delete episode files.

mod manager;
mod metadata;
pub mod path;
mod task;
mod transfer;

pub use manager::{DownloadManager, DOWNLOADED_ASSETS_KEY, DOWNLOADED_METADATA_KEY};
pub use metadata::{DownloadRequest, DownloadedAssetMetadata};
pub use task::{DownloadState, DownloadTask, RequestOutcome};
pub use transfer::{TransferEvent, TransferEventReceiver, TransferEventSender, TransferId};
