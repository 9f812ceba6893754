//! # Raceday Ingestion Service
//!
//! Continuously polls the upstream tote API for active races, normalizes
//! each payload and writes the resulting entities plus time-series
//! observations to PostgreSQL. Also serves a small read-side HTTP API for
//! the UI.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin raceday-ingest
//! cargo run --bin raceday-ingest -- --migrate-only
//! ```
//!
//! Press Ctrl+C to stop gracefully.

use anyhow::Result;
use clap::Parser;
use raceday_ingest::database;
use raceday_ingest::http as http_server;
use raceday_ingest::metrics;
use raceday_ingest::partitions;
use raceday_ingest::scheduler::Scheduler;
use raceday_ingest::settings::Settings;
use raceday_ingest::transform::TransformWorkerPool;
use raceday_ingest::upstream_client::UpstreamClient;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "raceday-ingest", about = "Tote race-data ingestion service")]
struct Cli {
    /// Path to an alternate config file (defaults to ./Config.toml).
    #[arg(long)]
    config: Option<String>,

    /// Run schema migration/partition setup then exit, without starting the
    /// scheduler or HTTP server.
    #[arg(long, default_value_t = false)]
    migrate_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    if let Some(config_path) = &cli.config {
        std::env::set_var("RACEDAY_CONFIG_PATH", config_path);
    }

    let settings = Arc::new(Settings::new()?);
    init_tracing(&settings.log);
    metrics::describe_metrics();

    tracing::info!("starting raceday ingestion service");

    let db_pool = database::connect(
        &settings.database.url,
        settings.database.max_connections,
        settings.database.connect_retries,
    )
    .await?;

    let mut startup_tx = db_pool.begin().await?;
    partitions::ensure_upcoming_partitions(&mut startup_tx, "money_flow_history").await?;
    partitions::ensure_upcoming_partitions(&mut startup_tx, "odds_history").await?;
    startup_tx.commit().await?;

    if cli.migrate_only {
        tracing::info!("migrate-only: schema and partitions ready, exiting");
        return Ok(());
    }

    let upstream = Arc::new(UpstreamClient::new(settings.upstream.clone())?);
    let transform_pool = Arc::new(TransformWorkerPool::new(settings.worker_pool.size));
    let scheduler = Scheduler::new(
        Arc::clone(&settings),
        Arc::clone(&upstream),
        Arc::clone(&transform_pool),
        db_pool.clone(),
    );

    let scheduler_handle = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        async move { scheduler.run_loop().await }
    });

    let router = http_server::build_router(db_pool.clone(), settings.http.compression_threshold_bytes);
    let listener = tokio::net::TcpListener::bind(&settings.http.bind).await?;
    tracing::info!(bind = %settings.http.bind, "HTTP read-side listening");
    let http_handle = tokio::spawn(async move {
        axum::serve(listener, router).await.map_err(|e| anyhow::anyhow!(e))
    });

    println!("Service running. Press Ctrl+C to stop gracefully...");
    signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    scheduler.stop().await;
    scheduler_handle.abort();
    http_handle.abort();

    tracing::info!("shutdown complete");
    Ok(())
}

fn init_tracing(log: &raceday_ingest::settings::Log) {
    let filter = EnvFilter::try_new(&log.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if log.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
