//! # Playback Error Types
//!
//! Errors raised by the playback session, the download manager and the
//! listening history.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur during playback and download operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// No usable audio location for the asset.
    #[error("{0}")]
    InvalidSource(String),

    /// The media player could not open or decode the item.
    #[error("{0}")]
    DecodeFailure(String),

    /// A newer load replaced this one before it became ready.
    #[error("Load superseded by a newer request")]
    LoadSuperseded,

    // ========================================================================
    // Download Errors
    // ========================================================================
    /// The network transfer failed.
    #[error("Download failed: {0}")]
    TransferFailure(String),

    /// Moving, verifying or removing a downloaded file failed.
    #[error("File operation failed: {0}")]
    FilesystemFailure(String),

    // ========================================================================
    // Storage Errors
    // ========================================================================
    /// Reading or writing the settings store failed.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Persisted state could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if retrying the operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::TransferFailure(_) | PlaybackError::LoadSuperseded
        )
    }

    /// Returns `true` if this error is due to network issues.
    pub fn is_network_error(&self) -> bool {
        matches!(self, PlaybackError::TransferFailure(_))
    }

    pub(crate) fn persistence(err: BridgeError) -> Self {
        PlaybackError::Persistence(err.to_string())
    }

    pub(crate) fn filesystem(err: BridgeError) -> Self {
        PlaybackError::FilesystemFailure(err.to_string())
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
