use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns service status, version and the connection cache state.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let connections = state.db.stats().await;
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "newsroom-api",
        "connections": connections,
        "storage": state.storage.backend(),
        "bucket": state.config.storage.bucket,
        "llm_provider": state.llm.provider(),
        "dify_configured": state.dify.is_configured(),
    }))
}
