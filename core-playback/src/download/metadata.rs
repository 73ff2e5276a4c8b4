use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::asset::AssetId;

/// What to download and how to describe it once it is on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub asset_id: AssetId,
    pub source_url: String,
    pub title: String,
    pub collection_title: String,
    pub collection_source_url: Option<String>,
}

/// Durable record of a completed, verified download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadedAssetMetadata {
    pub asset_id: AssetId,
    pub title: String,
    pub collection_title: String,
    pub collection_source_url: Option<String>,
    pub downloaded_at: DateTime<Utc>,
    pub file_size: u64,
}
