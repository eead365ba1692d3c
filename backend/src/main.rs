//! Security Incident Dashboard - Backend Server

use std::{net::SocketAddr, sync::Arc, time::Duration};

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use incident_dashboard_backend::services::export::RenderOptions;
use incident_dashboard_backend::services::{PgReportStore, ReportQueue, ReportSettings};
use incident_dashboard_backend::{create_app, AppState, Config};

const DEFAULT_LOG_FILTER: &str =
    "idb_server=debug,incident_dashboard_backend=debug,tower_http=debug,sqlx=warn";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Security Incident Dashboard server");
    tracing::info!("Environment: {}", config.environment);

    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database.url)
        .await?;
    tracing::info!("Database connection established");

    if config.is_development() {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&db_pool).await?;
        tracing::info!("Migrations completed");
    }

    tokio::fs::create_dir_all(&config.reports.output_dir).await?;
    let (reports, _worker) = ReportQueue::start(
        Arc::new(PgReportStore::new(db_pool.clone())),
        ReportSettings {
            output_dir: config.reports.output_dir.clone(),
            render: RenderOptions {
                pdf_font_path: config.reports.pdf_font_path.clone(),
            },
        },
        config.reports.queue_capacity,
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let state = AppState {
        db: db_pool,
        config: Arc::new(config),
        reports,
    };

    let app = create_app(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
