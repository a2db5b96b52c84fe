//! Dify workflow proxy. Blocking runs and callbacks are recorded as AI tasks.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::extractors::{Db, JsonBody, QueryParams};
use crate::models::ai_task::AiTask;
use crate::models::status::{AiTaskStatus, AiTaskType};
use crate::repository::{ai_tasks, parse_uuid};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RunWorkflowRequest {
    #[serde(default)]
    pub inputs: Value,
    #[serde(default)]
    pub user: Option<String>,
    /// Task name recorded for the run.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub task_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RunWorkflowResponse {
    pub task: AiTask,
    pub workflow_run_id: String,
    pub dify_task_id: Option<String>,
    pub status: String,
    pub outputs: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StopRequest {
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackPayload {
    /// Our AI task id.
    pub task_id: String,
    pub status: String,
    #[serde(default)]
    pub outputs: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// POST /api/dify/workflows/run
///
/// Runs the configured workflow in blocking mode. The run is tracked as an AI
/// task that ends completed with the workflow outputs or failed with its error.
pub async fn handle_run_workflow(
    State(state): State<AppState>,
    Db(db): Db,
    JsonBody(request): JsonBody<RunWorkflowRequest>,
) -> Result<Json<RunWorkflowResponse>, AppError> {
    if !state.dify.is_configured() {
        return Err(crate::dify::DifyError::NotConfigured.into());
    }
    let task_type = match request.task_type.as_deref() {
        Some(raw) => ai_tasks::parse_type(raw)?,
        None => AiTaskType::Content,
    };
    let inputs = if request.inputs.is_null() {
        json!({})
    } else {
        request.inputs
    };
    let name = request
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| "Dify workflow run".to_string());

    let task = ai_tasks::create(db.as_ref(), &name, task_type, json!({ "inputs": inputs })).await?;
    let task = ai_tasks::start(db.as_ref(), task.id).await?;

    let run = match state.dify.run_workflow(inputs, request.user.as_deref()).await {
        Ok(run) => run,
        Err(e) => {
            ai_tasks::fail(db.as_ref(), task.id, &e.to_string()).await?;
            return Err(e.into());
        }
    };

    let task = if run.data.succeeded() {
        let result = json!({
            "workflow_run_id": run.workflow_run_id,
            "outputs": run.data.outputs,
            "total_tokens": run.data.total_tokens,
        });
        ai_tasks::complete(db.as_ref(), task.id, result).await?
    } else {
        let message = run
            .data
            .error
            .clone()
            .unwrap_or_else(|| format!("workflow ended with status {}", run.data.status));
        ai_tasks::fail(db.as_ref(), task.id, &message).await?
    };

    Ok(Json(RunWorkflowResponse {
        task,
        workflow_run_id: run.workflow_run_id,
        dify_task_id: run.task_id,
        status: run.data.status,
        outputs: run.data.outputs,
    }))
}

/// POST /api/dify/workflows/tasks/:task_id/stop
pub async fn handle_stop_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    body: Option<Json<StopRequest>>,
) -> Result<Json<Value>, AppError> {
    let user = body.and_then(|Json(b)| b.user);
    Ok(Json(state.dify.stop_task(&task_id, user.as_deref()).await?))
}

/// GET /api/dify/workflows/run/:run_id
pub async fn handle_run_status(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    Ok(Json(state.dify.run_status(&run_id).await?))
}

/// GET /api/dify/workflows/logs
///
/// Query parameters are forwarded as-is.
pub async fn handle_logs(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<BTreeMap<String, String>>,
) -> Result<Json<Value>, AppError> {
    Ok(Json(state.dify.logs(&query).await?))
}

/// GET /api/dify/parameters
pub async fn handle_parameters(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    Ok(Json(state.dify.parameters().await?))
}

/// POST /api/dify/callback
///
/// Completes or fails the referenced AI task. A task still pending is started
/// first so the lifecycle is preserved.
pub async fn handle_callback(
    Db(db): Db,
    JsonBody(payload): JsonBody<CallbackPayload>,
) -> Result<Json<AiTask>, AppError> {
    let id = parse_uuid("task_id", &payload.task_id)?;
    let succeeded = match payload.status.trim().to_ascii_lowercase().as_str() {
        "succeeded" | "success" | "completed" => true,
        "failed" | "error" | "stopped" => false,
        other => {
            return Err(AppError::Validation(format!(
                "unknown callback status '{other}'"
            )))
        }
    };

    let current = ai_tasks::get(db.as_ref(), &payload.task_id).await?;
    if current.status == AiTaskStatus::Pending {
        ai_tasks::start(db.as_ref(), id).await?;
    }

    let task = if succeeded {
        let result = payload.outputs.unwrap_or(Value::Null);
        ai_tasks::complete(db.as_ref(), id, result).await?
    } else {
        let message = payload
            .error
            .unwrap_or_else(|| format!("workflow {}", payload.status.trim()));
        warn!(task_id = %id, "Dify reported failure");
        ai_tasks::fail(db.as_ref(), id, &message).await?
    };

    info!(task_id = %id, status = %task.status, "Dify callback applied");
    Ok(Json(task))
}
