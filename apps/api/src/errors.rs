use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::db::StoreError;
use crate::dify::DifyError;
use crate::llm_client::LlmError;
use crate::repository::RepoError;
use crate::storage::StorageError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
/// Every variant renders as `{"error", "message", "code", "detail"?}`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error("{0}")]
    Validation(String),

    #[error("File exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Database is unavailable")]
    DatabaseUnavailable,

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Dify(#[from] DifyError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Repo(err.into())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl AppError {
    /// Stable machine-readable code carried in both `error` and `code`.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Repo(e) => match e {
                RepoError::InvalidUuid { .. } => "INVALID_UUID_FORMAT",
                RepoError::Validation(_) => "VALIDATION_ERROR",
                RepoError::InvalidStatus { .. } => "INVALID_STATUS",
                RepoError::InvalidTransition { .. } => "INVALID_STATUS_TRANSITION",
                RepoError::NotFound { .. } => "NOT_FOUND",
                RepoError::MissingReference { .. } => "REFERENCE_NOT_FOUND",
                RepoError::Store(_) => "DATABASE_ERROR",
            },
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            AppError::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            AppError::DatabaseUnavailable => "DATABASE_UNAVAILABLE",
            AppError::Llm(_) => "LLM_ERROR",
            AppError::Dify(_) => "DIFY_ERROR",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Repo(e) => match e {
                RepoError::InvalidUuid { .. }
                | RepoError::Validation(_)
                | RepoError::InvalidStatus { .. }
                | RepoError::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
                RepoError::NotFound { .. } | RepoError::MissingReference { .. } => {
                    StatusCode::NOT_FOUND
                }
                RepoError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::Llm(LlmError::Api { .. }) | AppError::Dify(DifyError::Api { .. }) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::DatabaseUnavailable
            | AppError::Llm(_)
            | AppError::Dify(_)
            | AppError::Storage(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> Option<Value> {
        match self {
            AppError::Repo(RepoError::InvalidUuid { field, value }) => {
                Some(json!({ "field": field, "value": value }))
            }
            AppError::Repo(RepoError::MissingReference { field, id }) => {
                Some(json!({ "field": field, "id": id }))
            }
            AppError::Repo(RepoError::InvalidTransition { from, to, .. }) => {
                Some(json!({ "from": from, "to": to }))
            }
            AppError::PayloadTooLarge { limit } => Some(json!({ "limit": limit })),
            AppError::Llm(LlmError::Api { status, .. })
            | AppError::Dify(DifyError::Api { status, .. }) => {
                Some(json!({ "upstream_status": status }))
            }
            _ => None,
        }
    }

    /// Upstream failures are logged in full; the client gets the upstream text
    /// except for database and internal errors.
    fn message(&self) -> String {
        match self {
            AppError::Repo(RepoError::Store(e)) => {
                tracing::error!("Database error: {e}");
                "A database error occurred".to_string()
            }
            AppError::DatabaseUnavailable => {
                tracing::error!("No database handle could be acquired");
                self.to_string()
            }
            AppError::Llm(e) => {
                tracing::error!("LLM error: {e}");
                format!("AI provider error: {e}")
            }
            AppError::Dify(e) => {
                tracing::error!("Dify error: {e}");
                format!("Dify error: {e}")
            }
            AppError::Storage(e) => {
                tracing::error!("Storage error: {e}");
                format!("Storage error: {e}")
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                "An internal server error occurred".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = self.message();

        let mut body = json!({
            "error": code,
            "message": message,
            "code": code,
        });
        if let Some(detail) = self.detail() {
            body["detail"] = detail;
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn render(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_invalid_uuid_envelope() {
        let (status, body) = render(
            RepoError::InvalidUuid {
                field: "hot_topic_id",
                value: "123".into(),
            }
            .into(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "INVALID_UUID_FORMAT");
        assert_eq!(body["code"], "INVALID_UUID_FORMAT");
        assert_eq!(body["detail"]["field"], "hot_topic_id");
        assert!(body["message"].as_str().unwrap().contains("hot_topic_id"));
    }

    #[tokio::test]
    async fn test_missing_reference_is_404() {
        let id = Uuid::new_v4();
        let (status, body) = render(
            RepoError::MissingReference {
                field: "template_id",
                id,
            }
            .into(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "REFERENCE_NOT_FOUND");
        assert_eq!(body["detail"]["id"], id.to_string());
    }

    #[tokio::test]
    async fn test_unavailable_and_no_detail() {
        let (status, body) = render(AppError::DatabaseUnavailable).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "DATABASE_UNAVAILABLE");
        assert!(body.get("detail").is_none());
    }

    #[tokio::test]
    async fn test_upstream_api_error_is_bad_gateway() {
        let (status, body) = render(AppError::Llm(LlmError::Api {
            status: 401,
            message: "invalid x-api-key".into(),
        }))
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "LLM_ERROR");
        assert_eq!(body["detail"]["upstream_status"], 401);
    }

    #[tokio::test]
    async fn test_payload_too_large() {
        let (status, body) = render(AppError::PayloadTooLarge { limit: 5 }).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["detail"]["limit"], 5);
    }
}
