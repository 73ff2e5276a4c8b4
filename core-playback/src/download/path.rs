//! File names for completed downloads.
//!
//! Names are a pure function of the asset id: a readable stem taken from the
//! id, a short digest of the full id to keep distinct ids apart, and an
//! audio extension.

use sha2::{Digest, Sha256};

use crate::asset::AssetId;

const DEFAULT_EXTENSION: &str = "mp3";
const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "m4a", "m4b", "aac", "mp4", "ogg", "oga", "opus", "wav", "flac",
];
const DIGEST_BYTES: usize = 6;

/// File name under the downloads directory for `asset_id`.
pub fn file_name(asset_id: &AssetId, stem_length: usize) -> String {
    let id = asset_id.as_str().trim();
    let without_scheme = id.split_once("://").map_or(id, |(_, rest)| rest);
    let location = without_scheme
        .split(['?', '#'])
        .next()
        .unwrap_or(without_scheme);

    let extension = audio_extension(location);
    let stem_source = match extension {
        Some(ext) => &location[..location.len() - ext.len() - 1],
        None => location,
    };

    let stem: String = stem_source
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .take(stem_length)
        .collect();

    let digest = Sha256::digest(asset_id.as_str().as_bytes());
    format!(
        "{}-{}.{}",
        stem,
        hex::encode(&digest[..DIGEST_BYTES]),
        extension.map_or(DEFAULT_EXTENSION.to_string(), str::to_ascii_lowercase)
    )
}

/// Name of the in-flight file for one transfer of `final_name`.
pub fn partial_name(final_name: &str, transfer: u64) -> String {
    format!("{final_name}.{transfer}.partial")
}

fn audio_extension(location: &str) -> Option<&str> {
    let last_segment = location.rsplit('/').next()?;
    let (_, ext) = last_segment.rsplit_once('.')?;
    AUDIO_EXTENSIONS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(ext))
        .then_some(ext)
}
