//! Scan-engine error type.
//!
//! Wraps [`scand_common::Error`] with the scan-specific outcomes the
//! driver's per-file dispatch distinguishes: a parse failure only ever
//! loses one file, a comm failure can abort the whole scan.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Common(#[from] scand_common::Error),

    /// A parser plugin failed on this file. Non-fatal: the file's `files`
    /// row is removed and the walk continues.
    #[error("parse failed: {0}")]
    ParseFailed(String),

    /// The worker process did not reply in time or its pipe broke.
    /// Fatal if it recurs immediately after a respawn.
    #[error("worker communication failed: {0}")]
    CommFailed(String),

    /// The worker was killed after exceeding the per-file timeout.
    #[error("worker killed after timeout processing {0}")]
    Killed(std::path::PathBuf),

    /// Migration or bookkeeping table setup failed. Fatal at startup.
    #[error("schema error: {0}")]
    SchemaError(String),

    /// No parser plugins are registered, or a startup argument is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScanError>;
