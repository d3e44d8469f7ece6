//! # Fennec Ingest
//!
//! The single background ingest process: discovers video files under the
//! watch roots, maintains the durable enrichment queue, and drives each
//! file through the staged enrichment sequence. Crash recovery reclaims
//! orphaned queue rows at startup.

mod scheduler;

use clap::Parser;
use fennec_core::models::ModelHosts;
use fennec_core::types::progress::ScanProgressTracker;
use fennec_core::{Pipeline, Scanner, Store};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scheduler::Scheduler;

#[derive(Parser, Debug)]
#[command(name = "fennec-ingest")]
#[command(about = "Background ingest service for Fennec video search")]
struct Args {
    /// PostgreSQL connection string (requires the pgvector extension)
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Directory for posters and other derived artifacts
    #[arg(long, env = "FENNEC_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Inference sidecar base URL
    #[arg(long, env = "FENNEC_INFERENCE_URL", default_value = "http://127.0.0.1:8500")]
    inference_url: String,

    /// Comma-separated absolute watch roots, overriding config
    #[arg(long, env = "FENNEC_WATCH_FOLDERS")]
    watch_folders: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fennec_ingest=info,fennec_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = Store::connect(&args.database_url).await?;
    store.migrate().await?;

    // Reclaim jobs orphaned by a previous crash or restart.
    let reclaimed = store.queue().reset_processing().await?;
    if reclaimed > 0 {
        info!(reclaimed, "reclaimed in-flight jobs from previous run");
    }

    std::fs::create_dir_all(args.data_dir.join("posters"))?;

    let env_watch_roots = args
        .watch_folders
        .as_deref()
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    if !env_watch_roots.is_empty() {
        info!(roots = ?env_watch_roots, "watch roots from environment");
    }

    let hosts = ModelHosts::remote(&args.inference_url);
    let progress = Arc::new(ScanProgressTracker::new());
    let scanner = Scanner::new(store.clone(), progress.clone());
    let pipeline = Pipeline::new(store.clone(), hosts, args.data_dir.clone());

    let scheduler = Scheduler::new(store, scanner, pipeline, progress, env_watch_roots);

    info!("ingest loop starting");
    tokio::select! {
        result = scheduler.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested; in-flight work will be reclaimed on next start");
        }
    }

    Ok(())
}
