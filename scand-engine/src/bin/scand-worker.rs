//! Thin entry point for the worker side of the scan pipeline. Spawned by
//! the driver via `tokio::process::Command`; talks to its parent over
//! stdin/stdout using the framing in `scand_engine::protocol`.

use clap::Parser;
use scand_engine::config::ScanConfig;
use scand_engine::parsers::Registry;
use scand_engine::worker;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "scand-worker")]
struct Args {
    #[arg(short = 'p', long = "db-path")]
    db_path: PathBuf,

    #[arg(short = 'c', long = "commit-interval", default_value_t = scand_engine::config::DEFAULT_COMMIT_INTERVAL)]
    commit_interval: u32,

    #[arg(short = 'C', long = "charset")]
    charsets: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    worker::lower_priority();

    let args = Args::parse();
    let pool = scand_common::db::init_read_write(&args.db_path).await?;
    scand_engine::storage::run_migrations(&pool).await?;

    let registry = Registry::built_in();
    registry.setup_all();
    registry.start_all();

    let config = ScanConfig {
        commit_interval: args.commit_interval,
        charsets: args.charsets,
        ..ScanConfig::default()
    };

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();
    let result = worker::run_loop(stdin, stdout, &pool, &registry, &config).await;

    registry.finish_all();
    registry.close_all();

    result.map_err(Into::into)
}
