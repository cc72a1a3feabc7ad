//! Media scan coordinator daemon: owns the database, the scan state
//! machine, the write lock, and the bus surface other processes talk to.

mod api;
mod config;
mod coordinator;
mod error;
mod state;

use clap::Parser;
use coordinator::CoordinatorOptions;
use scand_common::events::EventBus;
use tracing::info;

const EVENT_BUS_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = config::DaemonArgs::parse();
    let db_path = args.resolve_db_path()?;
    info!(?db_path, "opening database");

    let pool = scand_common::db::init_read_write(&db_path).await?;
    scand_engine::storage::run_migrations(&pool).await?;

    let initial_update_id = scand_common::db::get_update_id(&pool).await?;
    info!(initial_update_id, "resuming scan-generation counter");

    let bus = EventBus::new(EVENT_BUS_CAPACITY);

    let options = CoordinatorOptions {
        db_path: db_path.clone(),
        scan_config: args.scan_config(),
        omit_scan_progress: args.omit_scan_progress,
        delete_older_than_days: args.delete_older_than_days,
        vacuum: args.vacuum,
        initial_update_id,
    };

    let coordinator = coordinator::spawn(pool, options, bus.clone());

    if args.startup_scan {
        let request = state::ScanRequest::canonicalize(Default::default());
        if let Err(error) = coordinator.scan(request).await {
            tracing::warn!(%error, "startup scan failed to start");
        }
    }

    let app = api::router(api::ApiState { coordinator, bus });

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    info!(listen = %args.listen, "scand-daemon listening");
    axum::serve(listener, app).await?;

    Ok(())
}
