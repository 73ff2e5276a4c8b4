//! The single active playback session.

mod manager;
mod remote;
mod state;

pub use manager::{ItemStatus, PlayerEventReceiver, PlaybackSessionManager};
pub use remote::RemoteCommand;
pub use state::{LoadOutcome, LoadRequest, SessionSnapshot, SessionState};
