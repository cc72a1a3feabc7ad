//! Single-shot scan/query CLI, run directly against a database file with
//! no daemon involved — for scripting and debugging. Mirrors the original
//! `lightmediascannerctl`/test binary's flag set.

use clap::Parser;
use scand_common::events::ScanStatus;
use scand_engine::config::{DirectorySpec, ProcessMode, ScanConfig};
use scand_engine::driver::{self, ProgressSink};
use scand_engine::parsers::Registry;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "scand-scan")]
struct Args {
    /// Database file to operate on.
    #[arg(short = 'p', long = "db-path")]
    db_path: PathBuf,

    /// Scan CATEGORY:PATH (repeatable).
    #[arg(short = 's', long = "scan")]
    scan: Vec<String>,

    /// Query known media under PATH instead of scanning.
    #[arg(short = 'S', long = "query")]
    query: Option<PathBuf>,

    /// List registered parsers, optionally filtered by category.
    #[arg(short = 'P', long = "list-parsers")]
    list_parsers: bool,

    #[arg(short = 'c', long = "commit-interval", default_value_t = scand_engine::config::DEFAULT_COMMIT_INTERVAL)]
    commit_interval: u32,

    #[arg(short = 't', long = "slave-timeout", default_value_t = scand_engine::config::DEFAULT_SLAVE_TIMEOUT_MS)]
    slave_timeout_ms: u64,

    #[arg(short = 'C', long = "charset")]
    charsets: Vec<String>,

    /// `mono` parses in-process; `dual` spawns `scand-worker` (the default).
    #[arg(short = 'm', long = "mode", default_value = "dual")]
    mode: String,

    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

struct StdoutSink;

impl ProgressSink for StdoutSink {
    fn report(&mut self, category: &str, path: &Path, status: ScanStatus) {
        println!("{category}\t{:?}\t{}", status, path.display());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(level))
        .init();

    if args.list_parsers {
        let registry = Registry::built_in();
        for name in registry.names() {
            println!("{name}");
        }
        return Ok(());
    }

    let pool = scand_common::db::init_read_write(&args.db_path).await?;
    scand_engine::storage::run_migrations(&pool).await?;

    if let Some(prefix) = &args.query {
        let rows = scand_engine::storage::select_files_under(&pool, prefix).await?;
        for row in rows {
            println!("{}", scand_common::db::bytes_to_path(&row.path).display());
        }
        return Ok(());
    }

    let roots: Vec<DirectorySpec> = args
        .scan
        .iter()
        .filter_map(|entry| {
            entry.split_once(':').map(|(category, path)| DirectorySpec {
                category: category.to_string(),
                path: PathBuf::from(path),
            })
        })
        .collect();

    let config = ScanConfig {
        commit_interval: args.commit_interval,
        slave_timeout: std::time::Duration::from_millis(args.slave_timeout_ms),
        process_mode: if args.mode == "mono" { ProcessMode::Mono } else { ProcessMode::Dual },
        charsets: args.charsets,
        ..ScanConfig::default()
    };

    let mut sink = StdoutSink;
    driver::run_scan(&pool, &args.db_path, &roots, &config, 1, &mut sink, &|| false).await?;

    Ok(())
}
