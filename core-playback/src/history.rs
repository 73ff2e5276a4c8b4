//! Listening history.
//!
//! A most-recent-first list of partially played episodes, persisted as one
//! JSON document in the settings store. Finishing an episode drops it from the
//! list, so the first few entries double as "continue listening".

use std::sync::Arc;

use bridge_traits::{Clock, SettingsStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::asset::AssetId;
use crate::config::HistoryConfig;
use crate::error::{PlaybackError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackHistoryItem {
    pub asset_id: AssetId,
    pub title: String,
    pub collection_title: String,
    pub collection_id: String,
    /// Stream URL or local path the episode was played from.
    pub source_location: String,
    pub current_time: f64,
    pub duration: f64,
    pub last_played_at: DateTime<Utc>,
    pub is_finished: bool,
}

impl PlaybackHistoryItem {
    /// Fraction played, or 0 when the duration is unknown.
    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 {
            self.current_time / self.duration
        } else {
            0.0
        }
    }
}

/// A position report for one episode.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackUpdate {
    pub asset_id: AssetId,
    pub title: String,
    pub collection_title: String,
    pub collection_id: String,
    pub source_location: String,
    pub current_time: f64,
    pub duration: f64,
}

pub struct PlaybackHistoryStore {
    settings: Arc<dyn SettingsStore>,
    clock: Arc<dyn Clock>,
    config: HistoryConfig,
    items: Vec<PlaybackHistoryItem>,
}

impl PlaybackHistoryStore {
    /// Loads the persisted list. A list that no longer decodes is discarded.
    pub async fn load(
        settings: Arc<dyn SettingsStore>,
        clock: Arc<dyn Clock>,
        config: HistoryConfig,
    ) -> Result<Self> {
        config.validate().map_err(PlaybackError::Internal)?;

        let items = match settings
            .get_string(&config.settings_key)
            .await
            .map_err(PlaybackError::persistence)?
        {
            Some(raw) => match serde_json::from_str::<Vec<PlaybackHistoryItem>>(&raw) {
                Ok(items) => items,
                Err(e) => {
                    warn!(error = %e, "Discarding undecodable playback history");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        debug!(count = items.len(), "Loaded playback history");
        Ok(Self {
            settings,
            clock,
            config,
            items,
        })
    }

    pub fn is_finished(&self, current_time: f64, duration: f64) -> bool {
        duration > 0.0 && current_time >= duration * self.config.finished_ratio
    }

    /// Records a position. Unfinished episodes move to the front; finished
    /// ones leave the list.
    #[instrument(skip(self, update), fields(asset_id = %update.asset_id))]
    pub async fn update_playback(&mut self, update: PlaybackUpdate) -> Result<PlaybackHistoryItem> {
        let is_finished = self.is_finished(update.current_time, update.duration);
        let item = PlaybackHistoryItem {
            asset_id: update.asset_id,
            title: update.title,
            collection_title: update.collection_title,
            collection_id: update.collection_id,
            source_location: update.source_location,
            current_time: update.current_time,
            duration: update.duration,
            last_played_at: self.clock.now(),
            is_finished,
        };

        self.items.retain(|existing| existing.asset_id != item.asset_id);
        if !is_finished {
            self.items.insert(0, item.clone());
        }
        self.items.truncate(self.config.max_items);

        self.persist().await?;
        debug!(
            position = item.current_time,
            duration = item.duration,
            finished = is_finished,
            "Updated playback history"
        );
        Ok(item)
    }

    pub fn playback_position(&self, asset_id: &AssetId) -> Option<f64> {
        self.history_item(asset_id).map(|item| item.current_time)
    }

    pub fn history_item(&self, asset_id: &AssetId) -> Option<&PlaybackHistoryItem> {
        self.items.iter().find(|item| &item.asset_id == asset_id)
    }

    pub async fn remove_from_history(&mut self, asset_id: &AssetId) -> Result<()> {
        let before = self.items.len();
        self.items.retain(|item| &item.asset_id != asset_id);
        if self.items.len() != before {
            self.persist().await?;
        }
        Ok(())
    }

    /// The most recent `limit` entries, optionally skipping finished ones.
    pub fn recently_played(
        &self,
        limit: usize,
        excluding_finished: bool,
    ) -> Vec<PlaybackHistoryItem> {
        self.items
            .iter()
            .filter(|item| !(excluding_finished && item.is_finished))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn items(&self) -> &[PlaybackHistoryItem] {
        &self.items
    }

    pub async fn clear(&mut self) -> Result<()> {
        self.items.clear();
        self.settings
            .delete(&self.config.settings_key)
            .await
            .map_err(PlaybackError::persistence)?;
        info!("Cleared playback history");
        Ok(())
    }

    async fn persist(&self) -> Result<()> {
        let encoded = serde_json::to_string(&self.items)?;
        self.settings
            .set_string(&self.config.settings_key, &encoded)
            .await
            .map_err(PlaybackError::persistence)
    }
}
