//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the media engine:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the cache, playback and
//! service crates depend on. It establishes the logging conventions, the
//! fail-fast configuration rules and the event broadcasting mechanism used
//! throughout the workspace.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
