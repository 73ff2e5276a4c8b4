use bridge_traits::MediaSource;
use serde::{Deserialize, Serialize};

use crate::asset::AssetId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Failed,
}

impl SessionState {
    /// Whether transport controls act in this state.
    pub fn accepts_controls(&self) -> bool {
        matches!(
            self,
            SessionState::Ready | SessionState::Playing | SessionState::Paused
        )
    }
}

/// Observable state of the single playback session. Times are in seconds;
/// a `duration` of 0 means unknown.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub asset_id: Option<AssetId>,
    pub title: String,
    pub collection_title: String,
    pub collection_id: String,
    pub source: Option<MediaSource>,
    pub state: SessionState,
    pub current_time: f64,
    pub duration: f64,
    pub is_playing: bool,
    pub is_buffering: bool,
    pub last_error: Option<String>,
    /// Whether the mini player should be shown.
    pub presented: bool,
}

impl SessionSnapshot {
    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 {
            (self.current_time / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self.source, Some(MediaSource::LocalFile(_)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub asset_id: AssetId,
    pub title: String,
    pub collection_title: String,
    pub collection_id: String,
    pub source_url: String,
    pub autoplay: bool,
    /// Position to start from instead of the remembered one.
    pub start_at: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The asset was already the current session.
    AlreadyLoaded,
    /// A player item was opened; readiness is reported later.
    Pending,
    /// The new player item became ready.
    Loaded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controls_only_act_once_ready() {
        assert!(!SessionState::Idle.accepts_controls());
        assert!(!SessionState::Loading.accepts_controls());
        assert!(!SessionState::Failed.accepts_controls());
        assert!(SessionState::Ready.accepts_controls());
        assert!(SessionState::Paused.accepts_controls());
    }

    #[test]
    fn progress_handles_unknown_duration() {
        let mut snapshot = SessionSnapshot {
            current_time: 30.0,
            ..Default::default()
        };
        assert_eq!(snapshot.progress(), 0.0);

        snapshot.duration = 60.0;
        assert_eq!(snapshot.progress(), 0.5);
    }
}
