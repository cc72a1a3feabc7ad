//! Driver side of the two-process scan engine: walks a root, dispatches
//! each candidate file to a `scand-worker` child process over the
//! length-prefixed pipe protocol, and reports per-file `ScanStatus` to a
//! caller-supplied sink. Metadata parsing and domain-table writes happen
//! only inside the worker; the driver's own pool is used solely for the
//! lightweight `files`-row bookkeeping (`mark_up_to_date`/`mark_deleted`)
//! that doesn't require a parse.

use crate::config::{DirectorySpec, ProcessMode, ScanConfig};
use crate::error::{Result, ScanError};
use crate::protocol::{self, ReplyStatus, Request};
use crate::storage;
use crate::walk::{self, FileDecision};
use scand_common::db::path_to_bytes;
use scand_common::events::ScanStatus;
use sqlx::SqlitePool;
use std::path::Path;
use std::process::Stdio;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::{timeout, Duration};

/// Path to the `scand-worker` binary, resolved the same way `std::env::current_exe`
/// resolves sibling binaries in a cargo-built workspace.
fn worker_binary_path() -> std::io::Result<std::path::PathBuf> {
    let mut exe = std::env::current_exe()?;
    exe.pop();
    exe.push("scand-worker");
    Ok(exe)
}

struct WorkerProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
}

impl WorkerProcess {
    async fn spawn(db_path: &Path) -> Result<Self> {
        let binary = worker_binary_path().map_err(ScanError::Io)?;
        let mut child = Command::new(binary)
            .arg("--db-path")
            .arg(db_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(ScanError::Io)?;
        let stdin = child.stdin.take().ok_or_else(|| {
            ScanError::CommFailed("worker process has no stdin handle".into())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            ScanError::CommFailed("worker process has no stdout handle".into())
        })?;
        Ok(Self { child, stdin, stdout })
    }

    async fn kill(mut self) {
        let _ = self.child.kill().await;
        let _ = self.child.wait().await;
    }
}

/// A single scan root to process, tagged with its category.
pub type ScanRoot<'a> = &'a DirectorySpec;

/// Sink the driver reports each file's final status to, as it happens.
pub trait ProgressSink {
    fn report(&mut self, category: &str, path: &Path, status: ScanStatus);
}

/// Run a full scan of `roots` against `db_path`, dispatching through one
/// (or, across respawns, several) worker processes.
///
/// `stop: impl Fn() -> bool` is polled between files so a caller can
/// cooperatively cancel an in-flight scan; this mirrors the original's
/// `stop_processing` flag rather than using task cancellation, since a
/// worker mid-parse must still be drained/killed cleanly either way.
pub async fn run_scan(
    pool: &SqlitePool,
    db_path: &Path,
    roots: &[DirectorySpec],
    config: &ScanConfig,
    update_id: i64,
    sink: &mut dyn ProgressSink,
    stop: &dyn Fn() -> bool,
) -> Result<()> {
    if config.process_mode == ProcessMode::Mono {
        return run_scan_mono(pool, roots, config, update_id, sink, stop).await;
    }

    let mut worker = WorkerProcess::spawn(db_path).await?;

    for (base_index, root) in roots.iter().enumerate() {
        let entries = walk::walk_root(pool, &root.path).await?;
        let mut seen = std::collections::HashSet::new();

        for entry in &entries {
            if stop() {
                worker.kill().await;
                return Ok(());
            }
            seen.insert(path_to_bytes(&entry.path));

            if entry.decision == FileDecision::UpToDate {
                if let Some(row) = &entry.existing {
                    storage::mark_up_to_date(pool, row.id, update_id).await?;
                }
                sink.report(&root.category, &entry.path, ScanStatus::UpToDate);
                continue;
            }

            let request = Request::Process {
                base_index: base_index as u32,
                update_id,
                path: path_to_bytes(&entry.path),
            };
            let outcome =
                dispatch_with_respawn(&mut worker, db_path, &request, config.slave_timeout).await?;

            let scan_status = match outcome {
                DispatchOutcome::Replied(ReplyStatus::Processed) => ScanStatus::Processed,
                DispatchOutcome::Replied(ReplyStatus::ParseError) => ScanStatus::ErrorParse,
                DispatchOutcome::Replied(ReplyStatus::Skipped) => ScanStatus::Skipped,
                DispatchOutcome::Killed => ScanStatus::Killed,
            };
            sink.report(&root.category, &entry.path, scan_status);
        }

        report_deletions(pool, &root.category, &root.path, &seen, sink).await?;
    }

    protocol::write_request(&mut worker.stdin, &Request::Shutdown)
        .await
        .map_err(ScanError::Io)?;
    worker.kill().await;
    Ok(())
}

/// Outcome of dispatching one request: either the worker replied, or it
/// had to be killed for exceeding the per-file timeout (the file is left
/// outdated and picked up again on the next scan).
enum DispatchOutcome {
    Replied(ReplyStatus),
    Killed,
}

/// Dispatch one request, killing and respawning the worker on timeout or
/// a broken pipe. A per-file timeout (`Killed`) is retried once against a
/// fresh worker and, if it recurs, reported as `Killed` rather than
/// retried further — the file stays outdated for the next scan. A comm
/// failure (`CommFailed`, e.g. a broken pipe) is also retried once; if
/// the replacement worker fails the same way, the scan aborts fatally,
/// matching the original's "kill+restart once, abort scan fatally if the
/// replacement also fails" contract.
async fn dispatch_with_respawn(
    worker: &mut WorkerProcess,
    db_path: &Path,
    request: &Request,
    slave_timeout: Duration,
) -> Result<DispatchOutcome> {
    match dispatch_once(worker, request, slave_timeout).await {
        Ok(status) => Ok(DispatchOutcome::Replied(status)),
        Err(ScanError::Killed(_)) | Err(ScanError::CommFailed(_)) => {
            let mut old = std::mem::replace(worker, WorkerProcess::spawn(db_path).await?);
            old.kill().await;
            match dispatch_once(worker, request, slave_timeout).await {
                Ok(status) => Ok(DispatchOutcome::Replied(status)),
                Err(ScanError::Killed(_)) => Ok(DispatchOutcome::Killed),
                Err(other) => Err(other),
            }
        }
        Err(other) => Err(other),
    }
}

async fn dispatch_once(
    worker: &mut WorkerProcess,
    request: &Request,
    slave_timeout: Duration,
) -> Result<ReplyStatus> {
    protocol::write_request(&mut worker.stdin, request)
        .await
        .map_err(ScanError::Io)?;

    let path = match request {
        Request::Process { path, .. } => scand_common::db::bytes_to_path(path),
        Request::Shutdown => std::path::PathBuf::new(),
    };

    match timeout(slave_timeout, protocol::read_reply(&mut worker.stdout)).await {
        Ok(Ok(Some(status))) => Ok(status),
        Ok(Ok(None)) => Err(ScanError::CommFailed("worker closed its stdout".into())),
        Ok(Err(e)) => Err(ScanError::Io(e)),
        Err(_) => Err(ScanError::Killed(path)),
    }
}

/// Files known under `root` but not seen in this walk are tombstoned.
async fn report_deletions(
    pool: &SqlitePool,
    category: &str,
    root: &Path,
    seen: &std::collections::HashSet<Vec<u8>>,
    sink: &mut dyn ProgressSink,
) -> Result<()> {
    let known = storage::select_files_under(pool, root).await?;
    let now = chrono::Utc::now().timestamp();
    for row in known {
        if row.is_present() && !seen.contains(&row.path) {
            storage::mark_deleted(pool, row.id, now).await?;
            let path = scand_common::db::bytes_to_path(&row.path);
            sink.report(category, &path, ScanStatus::Deleted);
        }
    }
    Ok(())
}

/// Single-process fallback used when `process_mode == Mono`: parses
/// in-process instead of spawning a worker, for debugging and platforms
/// without a spawnable `scand-worker` binary.
async fn run_scan_mono(
    pool: &SqlitePool,
    roots: &[DirectorySpec],
    config: &ScanConfig,
    update_id: i64,
    sink: &mut dyn ProgressSink,
    stop: &dyn Fn() -> bool,
) -> Result<()> {
    let registry = crate::parsers::Registry::built_in();
    for root in roots {
        let entries = walk::walk_root(pool, &root.path).await?;
        let mut seen = std::collections::HashSet::new();

        for entry in &entries {
            if stop() {
                return Ok(());
            }
            seen.insert(path_to_bytes(&entry.path));

            let status = if entry.decision == FileDecision::UpToDate {
                if let Some(row) = &entry.existing {
                    storage::mark_up_to_date(pool, row.id, update_id).await?;
                }
                ScanStatus::UpToDate
            } else {
                match crate::worker::process_one(
                    pool,
                    &registry,
                    config,
                    &entry.path,
                    entry.size,
                    entry.mtime,
                    update_id,
                )
                .await?
                {
                    ReplyStatus::Processed => ScanStatus::Processed,
                    ReplyStatus::ParseError => ScanStatus::ErrorParse,
                    ReplyStatus::Skipped => ScanStatus::Skipped,
                }
            };
            sink.report(&root.category, &entry.path, status);
        }

        report_deletions(pool, &root.category, &root.path, &seen, sink).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingSink {
        events: Vec<(String, std::path::PathBuf, ScanStatus)>,
    }

    impl ProgressSink for RecordingSink {
        fn report(&mut self, category: &str, path: &Path, status: ScanStatus) {
            self.events.push((category.to_string(), path.to_path_buf(), status));
        }
    }

    #[tokio::test]
    async fn mono_scan_reports_new_file_as_processed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.m3u"), b"/music/a.mp3\n").unwrap();

        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        storage::run_migrations(&pool).await.unwrap();

        let root = DirectorySpec { category: "playlist".into(), path: dir.path().to_path_buf() };
        let config = ScanConfig { process_mode: ProcessMode::Mono, ..ScanConfig::default() };
        let mut sink = RecordingSink { events: Vec::new() };

        run_scan_mono(&pool, &[root], &config, 1, &mut sink, &|| false)
            .await
            .unwrap();

        assert_eq!(sink.events.len(), 1);
        assert_eq!(sink.events[0].2, ScanStatus::Processed);
    }

    #[tokio::test]
    async fn mono_scan_reports_vanished_file_as_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("a.m3u");
        std::fs::write(&file_path, b"/music/a.mp3\n").unwrap();

        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        storage::run_migrations(&pool).await.unwrap();

        let root = DirectorySpec { category: "playlist".into(), path: dir.path().to_path_buf() };
        let config = ScanConfig { process_mode: ProcessMode::Mono, ..ScanConfig::default() };
        let mut sink = RecordingSink { events: Vec::new() };
        run_scan_mono(&pool, &[root.clone()], &config, 1, &mut sink, &|| false)
            .await
            .unwrap();

        std::fs::remove_file(&file_path).unwrap();
        let mut sink2 = RecordingSink { events: Vec::new() };
        run_scan_mono(&pool, &[root], &config, 2, &mut sink2, &|| false)
            .await
            .unwrap();

        assert_eq!(sink2.events.len(), 1);
        assert_eq!(sink2.events[0].2, ScanStatus::Deleted);
    }
}
