//! CI Dashboard — GitHub Actions pipeline tracker.
//!
//! Receives signed `workflow_run` webhooks, reconciles commits, pipeline runs
//! and per-attempt job history into a datastore, and serves list and detail
//! views of the stored runs as JSON.

mod config;
mod metrics;
mod migration;
mod models;
mod routes;
mod schema;
mod services;
mod store;
#[cfg(test)]
mod test_utils;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;

use crate::services::github_service::GitHubClient;
use crate::store::{MemoryStore, PgStore, PipelineStore};

#[derive(Parser)]
#[command(name = "ci-dashboard", about = "GitHub Actions pipeline dashboard backend")]
struct Cli {
    /// Server port
    #[arg(short, long, env = "PORT", default_value = "8080")]
    port: u16,

    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Keep state in process memory instead of PostgreSQL
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
    }

    let cli = Cli::parse();
    let config = config::DashboardConfig::from_env();

    tracing::info!("Starting CI Dashboard...");

    let store: Arc<dyn PipelineStore> = if cli.in_memory {
        tracing::warn!("Running with the in-memory store; state is lost on exit");
        Arc::new(MemoryStore::new())
    } else {
        let db_url = cli
            .database_url
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required unless --in-memory is set"))?;
        let pg = PgStore::connect(&db_url, config.database_max_connections)?;

        {
            let mut conn = pg.conn().await?;
            tracing::info!("Running database migration...");
            migration::run_migration(&mut conn).await?;
            tracing::info!("Database migration completed.");
        }

        Arc::new(pg)
    };

    let jobs = Arc::new(GitHubClient::new(
        &config.github_api_url,
        &config.github_token,
        config.job_fetch_timeout,
    )?);

    let state = routes::DashboardState {
        store,
        jobs,
        config,
    };
    let app = routes::dashboard_router(state);

    // Initialize metrics
    metrics::init_metrics();

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    tracing::info!("CI Dashboard listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
