//! Background transfers.
//!
//! A transfer streams one URL into a partial file and reports back to the
//! download manager over a channel. It never touches manager state; the
//! manager decides what each event means.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use bridge_traits::{FileSystemAccess, HttpClient};
use core_runtime::logging::file_label;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::asset::AssetId;

const READ_CHUNK_BYTES: usize = 64 * 1024;

/// Identifies one transfer attempt. Events from an attempt the manager no
/// longer tracks are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferId(pub(crate) u64);

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    Started {
        asset_id: AssetId,
        transfer: TransferId,
    },
    Progress {
        asset_id: AssetId,
        transfer: TransferId,
        progress: f64,
    },
    /// All bytes are in `partial_path`.
    Finished {
        asset_id: AssetId,
        transfer: TransferId,
        partial_path: PathBuf,
        bytes_written: u64,
    },
    Failed {
        asset_id: AssetId,
        transfer: TransferId,
        reason: String,
    },
    Cancelled {
        asset_id: AssetId,
        transfer: TransferId,
    },
}

impl TransferEvent {
    pub fn asset_id(&self) -> &AssetId {
        match self {
            TransferEvent::Started { asset_id, .. }
            | TransferEvent::Progress { asset_id, .. }
            | TransferEvent::Finished { asset_id, .. }
            | TransferEvent::Failed { asset_id, .. }
            | TransferEvent::Cancelled { asset_id, .. } => asset_id,
        }
    }

    pub fn transfer(&self) -> TransferId {
        match self {
            TransferEvent::Started { transfer, .. }
            | TransferEvent::Progress { transfer, .. }
            | TransferEvent::Finished { transfer, .. }
            | TransferEvent::Failed { transfer, .. }
            | TransferEvent::Cancelled { transfer, .. } => *transfer,
        }
    }
}

pub type TransferEventSender = mpsc::UnboundedSender<TransferEvent>;
pub type TransferEventReceiver = mpsc::UnboundedReceiver<TransferEvent>;

enum TransferError {
    Cancelled,
    Failed(String),
}

pub(crate) struct TransferJob {
    pub asset_id: AssetId,
    pub transfer: TransferId,
    pub url: String,
    pub partial_path: PathBuf,
    pub http: Arc<dyn HttpClient>,
    pub fs: Arc<dyn FileSystemAccess>,
    pub slots: Arc<Semaphore>,
    pub cancel: CancellationToken,
    pub events: TransferEventSender,
}

impl TransferJob {
    pub async fn run(self) {
        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                self.send(TransferEvent::Cancelled {
                    asset_id: self.asset_id.clone(),
                    transfer: self.transfer,
                });
                return;
            }
            permit = self.slots.clone().acquire_owned() => permit,
        };
        let _permit = match permit {
            Ok(permit) => permit,
            Err(_) => {
                self.send(TransferEvent::Failed {
                    asset_id: self.asset_id.clone(),
                    transfer: self.transfer,
                    reason: "transfer queue closed".to_string(),
                });
                return;
            }
        };

        self.send(TransferEvent::Started {
            asset_id: self.asset_id.clone(),
            transfer: self.transfer,
        });
        debug!(asset_id = %self.asset_id, transfer = %self.transfer, "Transfer started");

        let event = match self.copy_to_partial().await {
            Ok(bytes_written) => TransferEvent::Finished {
                asset_id: self.asset_id.clone(),
                transfer: self.transfer,
                partial_path: self.partial_path.clone(),
                bytes_written,
            },
            Err(TransferError::Cancelled) => {
                self.remove_partial().await;
                TransferEvent::Cancelled {
                    asset_id: self.asset_id.clone(),
                    transfer: self.transfer,
                }
            }
            Err(TransferError::Failed(reason)) => {
                self.remove_partial().await;
                TransferEvent::Failed {
                    asset_id: self.asset_id.clone(),
                    transfer: self.transfer,
                    reason,
                }
            }
        };
        self.send(event);
    }

    async fn copy_to_partial(&self) -> Result<u64, TransferError> {
        let stream = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(TransferError::Cancelled),
            stream = self.http.download_stream(self.url.clone()) => {
                stream.map_err(|e| TransferError::Failed(e.to_string()))?
            }
        };

        let expected = stream.content_length.filter(|len| *len > 0);
        let mut reader = stream.reader;
        let mut writer = self
            .fs
            .open_write_stream(&self.partial_path)
            .await
            .map_err(|e| TransferError::Failed(e.to_string()))?;

        let mut buffer = vec![0u8; READ_CHUNK_BYTES];
        let mut written: u64 = 0;
        let mut reported_percent: u64 = 0;

        loop {
            let read = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(TransferError::Cancelled),
                read = reader.read(&mut buffer) => {
                    read.map_err(|e| TransferError::Failed(e.to_string()))?
                }
            };
            if read == 0 {
                break;
            }

            writer
                .write_all(&buffer[..read])
                .await
                .map_err(|e| TransferError::Failed(e.to_string()))?;
            written += read as u64;

            if let Some(total) = expected {
                let percent = (written.saturating_mul(100) / total).min(100);
                if percent > reported_percent {
                    reported_percent = percent;
                    self.send(TransferEvent::Progress {
                        asset_id: self.asset_id.clone(),
                        transfer: self.transfer,
                        progress: (written as f64 / total as f64).min(1.0),
                    });
                }
            }
        }

        writer
            .shutdown()
            .await
            .map_err(|e| TransferError::Failed(e.to_string()))?;

        if self.cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        Ok(written)
    }

    async fn remove_partial(&self) {
        match self.fs.delete_file(&self.partial_path).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!(
                path = %file_label(&self.partial_path),
                error = %e,
                "Failed to remove partial download"
            ),
        }
    }

    fn send(&self, event: TransferEvent) {
        if self.events.send(event).is_err() {
            debug!(asset_id = %self.asset_id, "Download manager gone, dropping transfer event");
        }
    }
}
