//! Axum route handlers for the AI API.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::errors::AppError;
use crate::extractors::{Db, JsonBody, QueryParams};
use crate::generation::{generate, GenerateRequest, GenerateResponse};
use crate::models::ai_task::{AiTask, AiTaskQuery};
use crate::models::Paginated;
use crate::repository::ai_tasks;
use crate::state::AppState;

/// POST /api/ai/generate
///
/// Dispatches on `type` (title, summary, content, keywords, cover) and returns
/// the result together with the completed AI task.
pub async fn handle_generate(
    State(state): State<AppState>,
    Db(db): Db,
    JsonBody(request): JsonBody<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    let response = generate(db.as_ref(), &state.llm, request).await?;
    Ok(Json(response))
}

/// GET /api/ai/tasks
pub async fn handle_list_tasks(
    Db(db): Db,
    QueryParams(query): QueryParams<AiTaskQuery>,
) -> Result<Json<Paginated<AiTask>>, AppError> {
    Ok(Json(ai_tasks::list(db.as_ref(), query).await?))
}

/// GET /api/ai/tasks/:id
pub async fn handle_get_task(
    Db(db): Db,
    Path(id): Path<String>,
) -> Result<Json<AiTask>, AppError> {
    Ok(Json(ai_tasks::get(db.as_ref(), &id).await?))
}

/// DELETE /api/ai/tasks/:id
pub async fn handle_delete_task(
    Db(db): Db,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    ai_tasks::delete(db.as_ref(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
