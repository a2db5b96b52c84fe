//! Custom Axum extractors and the request-id middleware.

use async_trait::async_trait;
use axum::{
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::{request::Parts, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
    Json,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::db::DbHandle;
use crate::errors::AppError;
use crate::state::AppState;

pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
pub static DB_REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-db-request-id");

/// Id used to tag logs and database connections for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

fn header_id(parts_headers: &axum::http::HeaderMap) -> Option<String> {
    [&REQUEST_ID_HEADER, &DB_REQUEST_ID_HEADER]
        .into_iter()
        .filter_map(|name| parts_headers.get(name))
        .filter_map(|v| v.to_str().ok())
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

/// Reads `x-request-id` (or `x-db-request-id`), generating one if absent,
/// and echoes it on the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let id = header_id(request.headers()).unwrap_or_else(|| Uuid::new_v4().to_string());
    request.extensions_mut().insert(RequestId(id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER.clone(), value);
    }
    response
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(id) = parts.extensions.get::<RequestId>() {
            return Ok(id.clone());
        }
        Ok(RequestId(
            header_id(&parts.headers).unwrap_or_else(|| Uuid::new_v4().to_string()),
        ))
    }
}

/// A database handle acquired for this request's id.
pub struct Db(pub DbHandle);

#[async_trait]
impl FromRequestParts<AppState> for Db {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequestId(id) = RequestId::from_request_parts(parts, state).await?;
        state
            .db
            .acquire(&id)
            .await
            .map(Db)
            .ok_or(AppError::DatabaseUnavailable)
    }
}

/// `Json` whose rejections render as the JSON error envelope.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// `Query` whose rejections render as the JSON error envelope.
pub struct QueryParams<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    #[test]
    fn test_header_id_prefers_request_id() {
        let mut headers = HeaderMap::new();
        headers.insert("x-db-request-id", HeaderValue::from_static("db-1"));
        assert_eq!(header_id(&headers).as_deref(), Some("db-1"));

        headers.insert("x-request-id", HeaderValue::from_static("req-1"));
        assert_eq!(header_id(&headers).as_deref(), Some("req-1"));
    }

    #[test]
    fn test_blank_header_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("  "));
        assert_eq!(header_id(&headers), None);
    }
}
