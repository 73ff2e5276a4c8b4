//! Workspace placeholder crate.
//!
//! Re-exports the engine facade so host applications can depend on
//! `echonotes-media-engine` and pick platform shims through features instead
//! of wiring each workspace crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
