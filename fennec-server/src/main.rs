//! # Fennec Server
//!
//! The read-oriented query/API service. Serves browse, search, scene
//! detail, stats, queue and scan snapshots, config, admin actions, and
//! EDL export over JSON. Owns its own visual and sentence encoder hosts
//! for query-side encoding; all durable state arrives through the store
//! shared with the ingest process.

mod errors;
mod handlers;

use axum::{
    Router,
    routing::{get, post, put},
};
use clap::Parser;
use fennec_core::{QueryEngine, Store, models::ModelHosts};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use handlers::AppState;

#[derive(Parser, Debug)]
#[command(name = "fennec-server")]
#[command(about = "Query and API service for Fennec video search")]
struct Args {
    /// PostgreSQL connection string (requires the pgvector extension)
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Bind address
    #[arg(long, env = "FENNEC_BIND", default_value = "0.0.0.0:8400")]
    bind: SocketAddr,

    /// Inference sidecar base URL for query-side encoders
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
                .unwrap_or_else(|_| "fennec_server=info,fennec_core=info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = Store::connect(&args.database_url).await?;
    store.migrate().await?;
    info!("database ready");

    // Query-side hosts, independent of the ingest process's copies.
    let hosts = ModelHosts::remote(&args.inference_url);
    let engine = Arc::new(QueryEngine::new(
        store.clone(),
        hosts.visual.clone(),
        hosts.sentence.clone(),
    ));

    let env_watch_roots = args
        .watch_folders
        .as_deref()
        .map(parse_watch_folders)
        .unwrap_or_default();

    let state = AppState {
        engine,
        env_watch_roots,
    };

    let app = Router::new()
        .route("/health", get(handlers::stats::health))
        .route("/api/scenes", get(handlers::scenes::browse))
        .route("/api/scenes/{id}", get(handlers::scenes::detail))
        .route("/api/search", post(handlers::scenes::search))
        .route("/api/stats", get(handlers::stats::library))
        .route("/api/stats/vectors", get(handlers::stats::vectors))
        .route("/api/queue", get(handlers::queue::snapshot))
        .route("/api/scan/status", get(handlers::queue::scan_status))
        .route("/api/config", get(handlers::config::list))
        .route("/api/config/{key}", get(handlers::config::get))
        .route("/api/config/{key}", put(handlers::config::set))
        .route("/api/watch-folders", get(handlers::stats::watch_folders))
        .route("/api/admin/reset-failed", post(handlers::admin::reset_failed))
        .route(
            "/api/admin/reset-processing",
            post(handlers::admin::reset_processing),
        )
        .route(
            "/api/admin/purge-deleted",
            post(handlers::admin::purge_deleted),
        )
        .route(
            "/api/admin/purge-orphans",
            post(handlers::admin::purge_orphans),
        )
        .route("/api/admin/wipe", post(handlers::admin::wipe))
        .route("/api/admin/restart", post(handlers::admin::restart_ingest))
        .route("/api/export/edl", post(handlers::export::edl))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    info!("listening on {}", args.bind);
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn parse_watch_folders(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_folder_parsing_trims_and_drops_empties() {
        assert_eq!(
            parse_watch_folders("/media/a, /media/b ,,/media/c"),
            vec!["/media/a", "/media/b", "/media/c"]
        );
        assert!(parse_watch_folders("").is_empty());
    }
}
