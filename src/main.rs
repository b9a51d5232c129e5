use axum::{
    routing::{get, post},
    Router,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod config;
mod db;
mod error;
mod handlers;
mod models;
mod services;

use config::Config;
use services::local_store::LocalStore;
use services::reconciliation::{ReconciliationService, SyncSettings};
use services::remote::RemoteSnapshotStore;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<Config>,
    pub service: ReconciliationService,
}

impl AppState {
    pub fn new(db: SqlitePool, config: Arc<Config>) -> anyhow::Result<Self> {
        let remote = RemoteSnapshotStore::new(config.remote.clone())?;
        let settings = SyncSettings {
            cache_expiry: config.cache_expiry(),
            sync_interval: config.sync_interval(),
        };
        let service = ReconciliationService::new(LocalStore::new(db.clone()), remote, settings);

        Ok(Self {
            db,
            config,
            service,
        })
    }
}

fn build_router(state: AppState) -> anyhow::Result<Router> {
    let mut origins = vec![state
        .config
        .frontend_url
        .parse::<axum::http::HeaderValue>()?];
    // In dev, also allow LAN access (e.g. testing from another device)
    if let Ok(extra) = std::env::var("CORS_EXTRA_ORIGINS") {
        for o in extra.split(',') {
            if let Ok(hv) = o.trim().parse::<axum::http::HeaderValue>() {
                origins.push(hv);
            }
        }
    }
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ]);

    let journal_routes = Router::new()
        .route(
            "/api/entries",
            get(handlers::entries::list_entries)
                .post(handlers::entries::create_entry)
                .delete(handlers::entries::clear_entries),
        )
        // One segment name for both shapes: a date on GET, a row id on PUT/DELETE
        .route(
            "/api/entries/:key",
            get(handlers::entries::get_entry)
                .put(handlers::entries::update_entry)
                .delete(handlers::entries::delete_entry),
        )
        .route("/api/stats", get(handlers::entries::get_stats))
        .route(
            "/api/backup",
            get(handlers::backup::export_backup).post(handlers::backup::import_backup),
        );

    let sync_routes = Router::new()
        .route("/api/sync", post(handlers::sync::force_sync))
        .route("/api/sync/publish", post(handlers::sync::publish))
        .route("/api/sync/status", get(handlers::sync::status))
        .route("/api/sync/cache/clear", post(handlers::sync::clear_cache))
        .route(
            "/api/sync/entries",
            get(handlers::sync::list_sync_entries).post(handlers::sync::ingest_sync_entries),
        )
        .route("/api/remote/metadata", get(handlers::sync::remote_metadata))
        .route("/api/remote/stats", get(handlers::sync::remote_stats))
        .route("/api/remote/entries", get(handlers::sync::remote_entries))
        .route("/api/remote/entries/:date", get(handlers::sync::remote_entry));

    Ok(Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/readyz", get(handlers::health::readyz))
        .merge(journal_routes)
        .merge(sync_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "moodlog_api=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    let config = Arc::new(Config::from_env());

    // Database (migrations run on connect)
    let db = db::create_pool(&config.database_url).await?;
    tracing::info!("Database migrations applied");

    if config.remote.edge_config.is_empty() {
        tracing::warn!("EDGE_CONFIG not set, remote snapshot reads will come back empty");
    }

    let state = AppState::new(db, config.clone())?;
    let app = build_router(state)?;

    let addr = config.listen_addr();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
