//! The daemon's single-threaded coordinator loop: one dedicated
//! `tokio::task` owns `ScanState`/`WriteLock`/the pending queue and is the
//! only thing that mutates them, driven by an `mpsc` command channel from
//! the HTTP handlers and signaled back to by the scanner task and the
//! mount watcher — the async rendering of section 5's "idle callback
//! queue" model.

use crate::error::{DaemonError, Result};
use crate::state::{MountSnapshot, ScanRequest, ScanState, WriteLock};
use scand_common::events::{CategoryInfo, DaemonEvent, DaemonStatus, EventBus, ScanCounters, ScanStatus};
use scand_engine::config::ScanConfig;
use scand_engine::driver::{self, ProgressSink};
use scand_engine::parsers::Registry;
use futures::StreamExt;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};

/// Progress events are coalesced to at most one every
/// `SCAN_PROGRESS_UPDATE_COUNT` files or `SCAN_PROGRESS_UPDATE_TIMEOUT`,
/// whichever comes first; the final event for a run is always emitted.
const SCAN_PROGRESS_UPDATE_COUNT: u64 = 50;
const SCAN_PROGRESS_UPDATE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(1);

pub enum Command {
    Scan { request: ScanRequest, reply: oneshot::Sender<Result<()>> },
    Stop { reply: oneshot::Sender<Result<()>> },
    AcquireWriteLock { client_id: String, reply: oneshot::Sender<Result<()>> },
    ReleaseWriteLock { client_id: String, reply: oneshot::Sender<Result<()>> },
    Status { reply: oneshot::Sender<DaemonStatus> },
    ClientDisconnected { client_id: String },
}

enum ScannerEvent {
    Progress { category: String, path: std::path::PathBuf, status: ScanStatus },
    Done { counters: ScanCounters, duration_seconds: u64 },
}

/// Handle cloned into every HTTP handler to talk to the coordinator task.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    pub async fn scan(&self, request: ScanRequest) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(Command::Scan { request, reply }).await;
        rx.await.unwrap_or(Err(DaemonError::NotScanning))
    }

    pub async fn stop(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(Command::Stop { reply }).await;
        rx.await.unwrap_or(Err(DaemonError::NotScanning))
    }

    pub async fn acquire_write_lock(&self, client_id: String) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(Command::AcquireWriteLock { client_id, reply }).await;
        rx.await.unwrap_or(Err(DaemonError::AlreadyLocked))
    }

    pub async fn release_write_lock(&self, client_id: String) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(Command::ReleaseWriteLock { client_id, reply }).await;
        rx.await.unwrap_or(Err(DaemonError::NotLocked))
    }

    pub async fn status(&self) -> DaemonStatus {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(Command::Status { reply }).await;
        rx.await.unwrap_or(DaemonStatus {
            db_path: String::new(),
            is_scanning: false,
            write_locked: false,
            update_id: 0,
            categories: HashMap::new(),
        })
    }
}

pub struct CoordinatorOptions {
    pub db_path: std::path::PathBuf,
    pub scan_config: ScanConfig,
    pub omit_scan_progress: bool,
    pub delete_older_than_days: i64,
    pub vacuum: bool,
    /// The `lms_internal['update_id']` value read back at startup, so the
    /// in-memory counter resumes from the last persisted generation
    /// instead of always restarting at 0.
    pub initial_update_id: i64,
}

/// Build the `/status` category surface from the configured roots and the
/// plugins enabled for them: `dirs` per category from `config.directories`,
/// `parsers` from each plugin's declared `categories()`, filtered by
/// `config.parser_enabled`.
fn build_categories(config: &ScanConfig, registry: &Registry) -> HashMap<String, CategoryInfo> {
    let mut categories: HashMap<String, CategoryInfo> = HashMap::new();
    for spec in &config.directories {
        categories.entry(spec.category.clone()).or_default().dirs.push(spec.path.display().to_string());
    }
    for (name, plugin_categories) in registry.plugin_categories() {
        if !config.parser_enabled(name, plugin_categories) {
            continue;
        }
        for category in plugin_categories {
            categories.entry((*category).to_string()).or_default().parsers.push(name.to_string());
        }
    }
    categories
}

/// Spawn the coordinator task and return a handle plus the event bus it
/// publishes to.
pub fn spawn(
    pool: SqlitePool,
    options: CoordinatorOptions,
    bus: EventBus,
) -> CoordinatorHandle {
    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(run(pool, options, bus, rx));
    CoordinatorHandle { tx }
}

async fn run(
    pool: SqlitePool,
    options: CoordinatorOptions,
    bus: EventBus,
    mut commands: mpsc::Receiver<Command>,
) {
    let mut state = ScanState::Idle;
    let mut write_lock = WriteLock::default();
    let mut pending: Option<ScanRequest> = None;
    let mut update_id: i64 = options.initial_update_id;
    let stop_flag = Arc::new(Mutex::new(false));
    let (scanner_tx, mut scanner_rx) = mpsc::channel::<ScannerEvent>(256);
    let mut scanner_tx_holder: Option<mpsc::Sender<ScannerEvent>> = None;
    let mut mount_snapshot = MountSnapshot::default();
    let mut mounts = scand_common::mount::watch_mount_changes();
    let registry = Registry::built_in();
    let categories = build_categories(&options.scan_config, &registry);

    if options.scan_config.directories.is_empty() {
        tracing::warn!("no directories configured; scans will be no-ops until requested");
    }

    loop {
        tokio::select! {
            Some(command) = commands.recv() => {
                match command {
                    Command::Scan { request, reply } => {
                        let result = start_or_queue_scan(
                            request,
                            &mut state,
                            &mut pending,
                            &write_lock,
                            &mut update_id,
                            &mut scanner_tx_holder,
                            &scanner_tx,
                            &pool,
                            &options,
                            &stop_flag,
                        );
                        let _ = reply.send(result);
                        publish_status(&bus, &options.db_path, state, write_lock.is_held(), update_id, &categories);
                    }
                    Command::Stop { reply } => {
                        match state {
                            ScanState::Scanning => {
                                *stop_flag.lock().await = true;
                                state = ScanState::Stopping;
                                let _ = reply.send(Ok(()));
                            }
                            ScanState::Stopping => {
                                let _ = reply.send(Err(DaemonError::AlreadyStopping));
                            }
                            ScanState::Idle => {
                                let _ = reply.send(Err(DaemonError::NotScanning));
                            }
                        }
                        publish_status(&bus, &options.db_path, state, write_lock.is_held(), update_id, &categories);
                    }
                    Command::AcquireWriteLock { client_id, reply } => {
                        let result = if write_lock.try_acquire(&client_id) {
                            Ok(())
                        } else {
                            Err(DaemonError::AlreadyLocked)
                        };
                        let _ = reply.send(result);
                        publish_status(&bus, &options.db_path, state, write_lock.is_held(), update_id, &categories);
                    }
                    Command::ReleaseWriteLock { client_id, reply } => {
                        let result = if write_lock.release(&client_id) {
                            Ok(())
                        } else {
                            Err(DaemonError::NotLocked)
                        };
                        let _ = reply.send(result);
                        publish_status(&bus, &options.db_path, state, write_lock.is_held(), update_id, &categories);
                    }
                    Command::Status { reply } => {
                        let _ = reply.send(DaemonStatus {
                            db_path: options.db_path.display().to_string(),
                            is_scanning: state != ScanState::Idle,
                            write_locked: write_lock.is_held(),
                            update_id,
                            categories: categories.clone(),
                        });
                    }
                    Command::ClientDisconnected { client_id } => {
                        write_lock.release_on_disconnect(&client_id);
                        publish_status(&bus, &options.db_path, state, write_lock.is_held(), update_id, &categories);
                    }
                }
            }

            Some(event) = scanner_rx.recv() => {
                match event {
                    ScannerEvent::Progress { category, path, status } => {
                        if !options.omit_scan_progress {
                            publish_progress(&bus, &category, &path, status);
                        }
                    }
                    ScannerEvent::Done { counters, duration_seconds } => {
                        // The throttled `ChannelSink` only flushes every
                        // `SCAN_PROGRESS_UPDATE_COUNT` files or
                        // `SCAN_PROGRESS_UPDATE_TIMEOUT`, so the run's tail
                        // can still be unpublished here. Flush the
                        // aggregated counters unconditionally before
                        // anything else observes completion.
                        bus.publish(DaemonEvent::ScanCompleted {
                            category: "all".to_string(),
                            counters,
                            duration_seconds,
                            timestamp: chrono::Utc::now(),
                        });

                        scanner_tx_holder = None;
                        state = ScanState::Idle;
                        *stop_flag.lock().await = false;

                        if options.delete_older_than_days >= 0 {
                            let cutoff = chrono::Utc::now().timestamp()
                                - options.delete_older_than_days * 86_400;
                            if let Ok(purged) = scand_engine::storage::purge_tombstones_older_than(&pool, cutoff).await {
                                if purged > 0 {
                                    tracing::info!(purged, "purged aged tombstones");
                                }
                            }
                        }
                        if options.vacuum {
                            let _ = scand_common::db::vacuum(&pool).await;
                        }

                        if let Some(next) = pending.take() {
                            state = ScanState::Scanning;
                            scanner_tx_holder = Some(scanner_tx.clone());
                            update_id += 1;
                            spawn_scan(pool.clone(), &options, next, update_id, stop_flag.clone(), scanner_tx.clone());
                        }
                        publish_status(&bus, &options.db_path, state, write_lock.is_held(), update_id, &categories);
                    }
                }
            }

            Some(new_mounts) = mounts.next() => {
                let added: Vec<_> = new_mounts.difference(&mount_snapshot.mounts).cloned().collect();
                let removed: Vec<_> = mount_snapshot.mounts.difference(&new_mounts).cloned().collect();
                mount_snapshot.mounts = new_mounts;
                if !removed.is_empty() {
                    tracing::info!(?removed, "mount removed");
                }
                if !added.is_empty() {
                    tracing::info!(?added, "mount added");

                    let mut raw: HashMap<String, Vec<String>> = HashMap::new();
                    for mount in &added {
                        for spec in &options.scan_config.directories {
                            if spec.path.starts_with(mount) {
                                raw.entry(spec.category.clone())
                                    .or_default()
                                    .push(spec.path.display().to_string());
                            }
                        }
                    }

                    if !raw.is_empty() {
                        let request = ScanRequest::canonicalize(raw);
                        let result = start_or_queue_scan(
                            request,
                            &mut state,
                            &mut pending,
                            &write_lock,
                            &mut update_id,
                            &mut scanner_tx_holder,
                            &scanner_tx,
                            &pool,
                            &options,
                            &stop_flag,
                        );
                        if let Err(error) = result {
                            tracing::warn!(%error, "mount-triggered scan rejected");
                        }
                        publish_status(&bus, &options.db_path, state, write_lock.is_held(), update_id, &categories);
                    }
                }
            }
        }
    }
}

/// Shared start-or-queue decision for `Command::Scan` and mount-triggered
/// scans: reject while the write lock is held or a stop is pending, reject
/// explicit paths outside the category's configured roots, otherwise start
/// immediately from `Idle` or accumulate into the pending queue.
#[allow(clippy::too_many_arguments)]
fn start_or_queue_scan(
    request: ScanRequest,
    state: &mut ScanState,
    pending: &mut Option<ScanRequest>,
    write_lock: &WriteLock,
    update_id: &mut i64,
    scanner_tx_holder: &mut Option<mpsc::Sender<ScannerEvent>>,
    scanner_tx: &mpsc::Sender<ScannerEvent>,
    pool: &SqlitePool,
    options: &CoordinatorOptions,
    stop_flag: &Arc<Mutex<bool>>,
) -> Result<()> {
    if write_lock.is_held() {
        return Err(DaemonError::WriteLocked);
    }
    request
        .validate_against_roots(&options.scan_config.directories)
        .map_err(DaemonError::InvalidRequest)?;

    match state {
        ScanState::Idle => {
            *state = ScanState::Scanning;
            *scanner_tx_holder = Some(scanner_tx.clone());
            *update_id += 1;
            spawn_scan(pool.clone(), options, request, *update_id, stop_flag.clone(), scanner_tx.clone());
            Ok(())
        }
        ScanState::Scanning => {
            match pending {
                Some(existing) => existing.merge(request),
                None => *pending = Some(request),
            }
            Ok(())
        }
        ScanState::Stopping => Err(DaemonError::AlreadyStopping),
    }
}

fn spawn_scan(
    pool: SqlitePool,
    options: &CoordinatorOptions,
    request: ScanRequest,
    update_id: i64,
    stop_flag: Arc<Mutex<bool>>,
    events: mpsc::Sender<ScannerEvent>,
) {
    let db_path = options.db_path.clone();
    let defaults = options.scan_config.directories.clone();
    let config = options.scan_config.clone();

    tokio::spawn(async move {
        let roots = request.into_directory_specs(&defaults);
        let started = std::time::Instant::now();
        let mut sink = ChannelSink {
            events: events.clone(),
            counters: ScanCounters::default(),
            since_publish: 0,
            last_publish: std::time::Instant::now(),
        };

        let stop = move || {
            let stop_flag = stop_flag.clone();
            futures::executor::block_on(async move { *stop_flag.lock().await })
        };

        if let Err(error) = driver::run_scan(&pool, &db_path, &roots, &config, update_id, &mut sink, &stop).await {
            tracing::error!(%error, "scan failed");
        }

        let _ = events
            .send(ScannerEvent::Done {
                counters: sink.counters,
                duration_seconds: started.elapsed().as_secs(),
            })
            .await;
    });
}

struct ChannelSink {
    events: mpsc::Sender<ScannerEvent>,
    counters: ScanCounters,
    since_publish: u64,
    last_publish: std::time::Instant,
}

impl ProgressSink for ChannelSink {
    fn report(&mut self, category: &str, path: &Path, status: ScanStatus) {
        self.counters.record(status);
        self.since_publish += 1;

        let due = self.since_publish >= SCAN_PROGRESS_UPDATE_COUNT
            || self.last_publish.elapsed() >= SCAN_PROGRESS_UPDATE_TIMEOUT;
        if due {
            self.since_publish = 0;
            self.last_publish = std::time::Instant::now();
            let _ = self.events.try_send(ScannerEvent::Progress {
                category: category.to_string(),
                path: path.to_path_buf(),
                status,
            });
        }
    }
}

fn publish_status(
    bus: &EventBus,
    db_path: &Path,
    state: ScanState,
    write_locked: bool,
    update_id: i64,
    categories: &HashMap<String, CategoryInfo>,
) {
    bus.publish(DaemonEvent::PropertyChanged {
        status: DaemonStatus {
            db_path: db_path.display().to_string(),
            is_scanning: state != ScanState::Idle,
            write_locked,
            update_id,
            categories: categories.clone(),
        },
        timestamp: chrono::Utc::now(),
    });
}

fn publish_progress(bus: &EventBus, category: &str, path: &Path, status: ScanStatus) {
    let mut counters = ScanCounters::default();
    counters.record(status);
    bus.publish(DaemonEvent::ScanProgress {
        category: category.to_string(),
        path: path.display().to_string(),
        counters,
        timestamp: chrono::Utc::now(),
    });
}
