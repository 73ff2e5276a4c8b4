//! Stable asset identifiers.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Identifier shared by playback, downloads and history for one audio asset.
///
/// Usually the trimmed stream URL. Episodes without a URL are identified by a
/// digest of their title, prefixed with `title-sha256:` so the scheme is
/// visible in persisted data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derives an id from the stream URL, falling back to the title.
    pub fn from_source(audio_url: Option<&str>, title: &str) -> Self {
        match audio_url.map(str::trim).filter(|url| !url.is_empty()) {
            Some(url) => Self(url.to_string()),
            None => Self::from_title(title),
        }
    }

    pub fn from_title(title: &str) -> Self {
        let digest = Sha256::digest(title.as_bytes());
        Self(format!("title-sha256:{}", hex::encode(digest)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for AssetId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for AssetId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_trimmed() {
        let id = AssetId::from_source(Some("  https://cdn.example.com/ep1.mp3\n"), "Episode 1");
        assert_eq!(id.as_str(), "https://cdn.example.com/ep1.mp3");
    }

    #[test]
    fn missing_url_falls_back_to_title_digest() {
        let a = AssetId::from_source(None, "Episode 1");
        let b = AssetId::from_source(Some("   "), "Episode 1");
        let c = AssetId::from_source(None, "Episode 2");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.as_str().starts_with("title-sha256:"));
        assert_eq!(a.as_str().len(), "title-sha256:".len() + 64);
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = AssetId::new("ep-42");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"ep-42\"");
        let back: AssetId = serde_json::from_str("\"ep-42\"").unwrap();
        assert_eq!(back, id);
    }
}
