//! # Core Cache
//!
//! Disk-backed caches shared by the media engine:
//!
//! - [`ExpiringDiskCache`]: JSON values with a per-entry lifetime, used for
//!   feed listings, search results and parsed episode lists.
//! - [`ImageCache`]: artwork bytes behind a bounded in-memory LRU.
//!
//! Both treat every read failure as a miss.

pub mod config;
pub mod disk;
pub mod entry;
pub mod error;
pub mod image;
pub mod keys;
pub mod ttl;

pub use config::{CacheConfig, ImageCacheConfig};
pub use disk::ExpiringDiskCache;
pub use entry::CacheEntry;
pub use error::{CacheError, Result};
pub use image::ImageCache;
pub use ttl::CacheTtl;
