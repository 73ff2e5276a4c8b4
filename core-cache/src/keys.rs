//! Cache key helpers.
//!
//! Keys are free-form strings; [`file_stem`] maps them onto a safe file name.
//! The constructors below name the namespaces the rest of the engine uses.

use sha2::{Digest, Sha256};

/// Smallest configurable key length. Leaves room for the digest suffix.
pub const MIN_KEY_LENGTH: usize = 32;

const DIGEST_SUFFIX_LEN: usize = 16;

const RESERVED: &[char] = &['/', ':', '?', '&', '\\', '*', '"', '<', '>', '|', '%'];

/// Maps an arbitrary key onto a file stem.
///
/// Reserved path characters and whitespace become `_`. Stems longer than
/// `max_len` keep their first characters and gain `-<digest>` computed over
/// the original key, so distinct long keys do not collide.
pub fn file_stem(key: &str, max_len: usize) -> String {
    let mut stem: String = key
        .chars()
        .map(|c| {
            if RESERVED.contains(&c) || c.is_whitespace() || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    if stem.is_empty() || stem.chars().all(|c| c == '.') {
        stem = format!("_{stem}");
    }

    if stem.chars().count() <= max_len {
        return stem;
    }

    let keep = max_len.saturating_sub(DIGEST_SUFFIX_LEN + 1);
    let prefix: String = stem.chars().take(keep).collect();
    format!("{}-{}", prefix, &digest_hex(key)[..DIGEST_SUFFIX_LEN])
}

/// Lowercase hex SHA-256 of `input`.
pub fn digest_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn podcasts(listing: &str) -> String {
    format!("podcasts_{listing}")
}

pub fn episodes(feed_url: &str) -> String {
    format!("episodes_{feed_url}")
}

pub fn genre(genre_id: &str) -> String {
    format!("genre_{genre_id}")
}

pub fn search(query: &str) -> String {
    format!("search_{query}")
}
