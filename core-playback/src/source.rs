//! Validation of remote audio locations.

use url::Url;

use crate::error::{PlaybackError, Result};

pub const NO_AUDIO_URL: &str = "No audio URL available for this episode";
pub const INVALID_AUDIO_URL: &str = "Invalid audio URL";

/// Returns the trimmed URL if it is an absolute http(s) URL.
pub fn validate_remote_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PlaybackError::InvalidSource(NO_AUDIO_URL.to_string()));
    }

    let parsed = Url::parse(trimmed)
        .map_err(|_| PlaybackError::InvalidSource(INVALID_AUDIO_URL.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") || !parsed.has_host() {
        return Err(PlaybackError::InvalidSource(INVALID_AUDIO_URL.to_string()));
    }

    Ok(trimmed.to_string())
}
