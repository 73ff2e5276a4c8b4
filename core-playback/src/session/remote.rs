use serde::{Deserialize, Serialize};

/// Commands from lock-screen, headset or media-key surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "seconds", rename_all = "snake_case")]
pub enum RemoteCommand {
    Play,
    Pause,
    TogglePlayPause,
    /// Seconds to skip; `None` uses the configured interval.
    SkipForward(Option<f64>),
    SkipBackward(Option<f64>),
}
