mod actions;
mod analysis;
mod config;
mod db;
mod errors;
mod mail;
mod models;
mod routes;
mod state;
mod store;
mod sync;
mod triage;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::cache::AnalysisCache;
use crate::analysis::client::HttpAnalysisClient;
use crate::config::Config;
use crate::db::{create_pool, ensure_schema};
use crate::mail::HttpMailClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::PgStateStore;
use crate::sync::SettingsSync;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Sift API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL and the per-user state schema
    let pool = create_pool(&config.database_url).await?;
    ensure_schema(&pool).await?;
    let store = Arc::new(PgStateStore::new(pool));

    // Mail platform client
    let mail = Arc::new(HttpMailClient::new(config.mail_api_url.clone()));
    info!("Mail client initialized ({})", config.mail_api_url);

    // Analysis service client + in-process TTL cache
    let analysis = Arc::new(HttpAnalysisClient::new(
        config.analysis_api_url.clone(),
        config.analysis_api_key.clone(),
    ));
    let cache = Arc::new(AnalysisCache::new());
    info!("Analysis client initialized ({})", config.analysis_api_url);

    // Best-effort settings-sync collaborator
    let settings_sync = SettingsSync::new(config.settings_sync_url.clone());
    if config.settings_sync_url.is_none() {
        info!("Settings sync disabled (SETTINGS_SYNC_URL not set)");
    }

    // Build app state
    let state = AppState {
        store,
        mail,
        analysis,
        cache,
        settings_sync,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
