//! Database pool initialization.
//!
//! Two pools are opened against the same file with different access modes,
//! mirroring the scan engine's read-only-driver / read-write-worker split:
//! cross-process write contention never arises because only the worker
//! ever opens the database writable.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// Open a read-write pool, creating the database file and parent
/// directories if necessary. Sets the pragmas the storage layer relies on:
/// foreign keys (for cascade triggers) and case-sensitive, bytewise `LIKE`.
pub async fn init_read_write(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        crate::config::ensure_dir(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .pragma("case_sensitive_like", "ON");

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Open a read-only pool against an existing database. Used by the scan
/// driver, which only ever issues the "files under this prefix" select.
pub async fn init_read_only(db_path: &Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .read_only(true)
        .pragma("case_sensitive_like", "ON");

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Run `VACUUM` against the database. Called by the daemon's post-scan
/// maintenance when `--vacuum` is configured.
pub async fn vacuum(pool: &SqlitePool) -> Result<()> {
    sqlx::query("VACUUM").execute(pool).await?;
    Ok(())
}
