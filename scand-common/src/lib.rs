//! # scand-common
//!
//! Shared code for the `scand` media scanner daemon, CLI client, and scan
//! engine:
//! - Error types
//! - Database pool initialization and schema-version migrations
//! - Charset conversion (tag bytes -> UTF-8)
//! - Event types and the broadcast event bus used for SSE progress
//! - Root-folder / config-file resolution
//! - Mount-table change monitoring

pub mod charset;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod mount;
pub mod sse;

pub use error::{Error, Result};
