pub mod articles;
pub mod dify;
pub mod health;
pub mod hot_topics;
pub mod meta;
pub mod templates;
pub mod upload;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};

use crate::extractors::request_id_middleware;
use crate::generation::handlers as ai;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/meta/statuses", get(meta::handle_statuses))
        // Articles
        .route(
            "/api/articles",
            get(articles::handle_list).post(articles::handle_create),
        )
        .route(
            "/api/articles/:id",
            get(articles::handle_get)
                .put(articles::handle_update)
                .delete(articles::handle_delete),
        )
        // Templates
        .route(
            "/api/templates",
            get(templates::handle_list).post(templates::handle_create),
        )
        .route(
            "/api/templates/:id",
            get(templates::handle_get)
                .put(templates::handle_update)
                .delete(templates::handle_delete)
                .patch(templates::handle_increment_usage),
        )
        // Hot topics
        .route(
            "/api/hot-topics",
            get(hot_topics::handle_list).post(hot_topics::handle_create),
        )
        .route(
            "/api/hot-topics/:id",
            get(hot_topics::handle_get)
                .put(hot_topics::handle_update)
                .delete(hot_topics::handle_delete)
                .patch(hot_topics::handle_adjust_volume),
        )
        // AI
        .route("/api/ai/generate", post(ai::handle_generate))
        .route("/api/ai/tasks", get(ai::handle_list_tasks))
        .route(
            "/api/ai/tasks/:id",
            get(ai::handle_get_task).delete(ai::handle_delete_task),
        )
        // Dify
        .route("/api/dify/workflows/run", post(dify::handle_run_workflow))
        .route(
            "/api/dify/workflows/tasks/:task_id/stop",
            post(dify::handle_stop_task),
        )
        .route(
            "/api/dify/workflows/run/:run_id",
            get(dify::handle_run_status),
        )
        .route("/api/dify/workflows/logs", get(dify::handle_logs))
        .route("/api/dify/parameters", get(dify::handle_parameters))
        .route("/api/dify/callback", post(dify::handle_callback))
        // Upload
        .route(
            "/api/upload",
            post(upload::handle_upload).layer(DefaultBodyLimit::max(upload::UPLOAD_BODY_LIMIT)),
        )
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}
