//! Directory walk and per-file status decision.
//!
//! Mirrors the original's entry classification: a candidate path is
//! compared against its last-known `files` row (if any) on `size`/`mtime`
//! to decide whether it's new, outdated, up to date, or (having once been
//! tombstoned) revived. Paths present under a root but absent from disk
//! at the end of the walk are reported as deletions by the caller, not by
//! this module — `walk_root` only streams what it finds.

use scand_common::db::FileRow;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// What should happen to a candidate path, decided by comparing its
/// on-disk stat against any existing `files` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileDecision {
    /// Never seen before.
    New,
    /// Seen before, `mtime`/`size` unchanged: nothing to do.
    UpToDate,
    /// Seen before, stat changed: needs re-parsing.
    Outdated,
    /// Was tombstoned, has reappeared: needs re-parsing like `Outdated`.
    Revived,
}

#[derive(Debug, Clone)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub size: i64,
    pub mtime: i64,
    pub existing: Option<FileRow>,
    pub decision: FileDecision,
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

fn decide(existing: Option<&FileRow>, size: i64, mtime: i64) -> FileDecision {
    match existing {
        None => FileDecision::New,
        Some(row) if !row.is_present() => FileDecision::Revived,
        Some(row) if row.size == size && row.mtime == mtime => FileDecision::UpToDate,
        Some(_) => FileDecision::Outdated,
    }
}

/// Walk `top`, yielding one [`WalkEntry`] per regular file not hidden by
/// a dotfile/dotdir component, looking up each against `pool`.
///
/// `top` is canonicalized first so that relative roots and symlinked
/// mount points are recorded consistently across runs.
pub async fn walk_root(pool: &SqlitePool, top: &Path) -> crate::error::Result<Vec<WalkEntry>> {
    let canonical = std::fs::canonicalize(top).map_err(crate::error::ScanError::Io)?;

    let mut entries = Vec::new();
    let walker = WalkDir::new(&canonical)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(_) => continue,
        };
        let size = metadata.len() as i64;
        let mtime = mtime_seconds(&metadata);

        let existing = crate::storage::lookup_file(pool, entry.path()).await?;
        let decision = decide(existing.as_ref(), size, mtime);

        entries.push(WalkEntry {
            path: entry.path().to_path_buf(),
            size,
            mtime,
            existing,
            decision,
        });
    }

    Ok(entries)
}

#[cfg(unix)]
fn mtime_seconds(metadata: &std::fs::Metadata) -> i64 {
    use std::os::unix::fs::MetadataExt;
    metadata.mtime()
}

#[cfg(not(unix))]
fn mtime_seconds(metadata: &std::fs::Metadata) -> i64 {
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
    use scand_common::db::FileRow;

    fn row(size: i64, mtime: i64, dtime: i64) -> FileRow {
        FileRow {
            id: 1,
            path: b"/x".to_vec(),
            mtime,
            dtime,
            itime: 0,
            size,
            update_id: 1,
        }
    }

    #[test]
    fn decides_new_when_no_existing_row() {
        assert_eq!(decide(None, 10, 10), FileDecision::New);
    }

    #[test]
    fn decides_up_to_date_when_stat_unchanged() {
        let existing = row(10, 10, 0);
        assert_eq!(decide(Some(&existing), 10, 10), FileDecision::UpToDate);
    }

    #[test]
    fn decides_outdated_when_size_changed() {
        let existing = row(10, 10, 0);
        assert_eq!(decide(Some(&existing), 20, 10), FileDecision::Outdated);
    }

    #[test]
    fn decides_revived_when_tombstoned() {
        let existing = row(10, 10, 500);
        assert_eq!(decide(Some(&existing), 10, 10), FileDecision::Revived);
    }

    #[tokio::test]
    async fn walk_root_skips_hidden_entries_and_finds_visible_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("visible.mp3"), b"data").unwrap();
        std::fs::create_dir(dir.path().join(".hidden")).unwrap();
        std::fs::write(dir.path().join(".hidden").join("nope.mp3"), b"data").unwrap();
        std::fs::write(dir.path().join(".dotfile.mp3"), b"data").unwrap();

        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::storage::run_migrations(&pool).await.unwrap();

        let entries = walk_root(&pool, dir.path()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].decision, FileDecision::New);
    }
}
