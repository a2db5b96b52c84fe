mod config;
mod db;
mod dify;
mod errors;
mod extractors;
mod fetch;
mod generation;
mod llm_client;
mod models;
mod repository;
mod routes;
mod state;
mod storage;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::{ClientFactory, ConnectionManager};
use crate::dify::DifyClient;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::{ImageStore, MemoryImageStore, S3ImageStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Newsroom API v{}", env!("CARGO_PKG_VERSION"));
    info!("Database settings: {:?}", config.db);

    // Database: connection manager, plus migrations when a real database is configured
    let db = Arc::new(ConnectionManager::new(ClientFactory::new(config.db.clone())));
    if config.db.use_mock_mode {
        info!("Mock database mode: serving seeded in-memory data");
    } else {
        match db.acquire("bootstrap").await {
            Some(handle) => {
                handle.migrate().await?;
                info!("Database migrations applied");
            }
            None => warn!("Database unreachable at startup; requests will retry"),
        }
    }

    // Image storage
    let storage: Arc<dyn ImageStore> = if config.storage.s3_enabled() {
        let store = S3ImageStore::new(config.storage.clone()).await;
        info!("S3 storage initialized (bucket: {})", config.storage.bucket);
        Arc::new(store)
    } else {
        warn!("S3 credentials not configured; uploads are kept in memory");
        Arc::new(MemoryImageStore::new(config.storage.clone()))
    };

    // LLM + Dify clients
    let llm = LlmClient::new(&config.llm)?;
    match (llm.provider(), llm.model()) {
        (Some(provider), Some(model)) => {
            info!("LLM client initialized ({provider:?}, model: {model})")
        }
        _ => warn!("No LLM provider configured; /api/ai/generate will fail"),
    }
    let dify = DifyClient::new(config.dify.clone())?;
    if dify.is_configured() {
        info!(
            app_id = ?config.dify.app_id,
            workflow_id = ?config.dify.workflow_id,
            "Dify client initialized ({})",
            config.dify.endpoint
        );
    } else {
        warn!("DIFY_API_KEY not set; Dify routes will fail");
    }

    let state = AppState {
        db,
        storage,
        llm,
        dify,
        config: Arc::new(config.clone()),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
