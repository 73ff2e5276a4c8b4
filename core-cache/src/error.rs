//! Error types for the disk caches.
//!
//! Readers never see these: lookups turn every failure into a miss. They are
//! returned from writes and maintenance operations so callers can log them.

use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    // ========================================================================
    // Storage Errors
    // ========================================================================
    #[error("Cache storage error: {0}")]
    Storage(#[from] BridgeError),

    #[error("Cache entry {key} is corrupt: {reason}")]
    Corrupt { key: String, reason: String },

    // ========================================================================
    // Encoding Errors
    // ========================================================================
    #[error("Cache serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    // ========================================================================
    // Fetch Errors
    // ========================================================================
    #[error("Fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Remote fetching is not configured")]
    FetchUnavailable,

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    #[error("Invalid cache configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;
