use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::transfer::TransferId;
use crate::asset::AssetId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DownloadState {
    Queued,
    /// `progress` is between 0.0 and 1.0.
    InProgress { progress: f64 },
    Completed { local_path: PathBuf },
    Failed { reason: String },
    Cancelled,
}

impl DownloadState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DownloadState::Completed { .. }
                | DownloadState::Failed { .. }
                | DownloadState::Cancelled
        )
    }
}

/// Answer to a download request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Enqueued,
    AlreadyDownloaded,
    AlreadyInProgress,
}

/// A download that has not reached a terminal state.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub asset_id: AssetId,
    pub source_url: String,
    pub state: DownloadState,
    pub title: String,
    pub collection_title: String,
    pub collection_source_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub(crate) transfer: TransferId,
    pub(crate) cancel: CancellationToken,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!DownloadState::Queued.is_terminal());
        assert!(!DownloadState::InProgress { progress: 0.5 }.is_terminal());
        assert!(DownloadState::Cancelled.is_terminal());
        assert!(DownloadState::Failed { reason: "x".into() }.is_terminal());
        assert!(DownloadState::Completed {
            local_path: PathBuf::from("a.mp3")
        }
        .is_terminal());
    }
}
