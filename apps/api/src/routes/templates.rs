use axum::{extract::Path, http::StatusCode, Json};

use crate::errors::AppError;
use crate::extractors::{Db, JsonBody, QueryParams};
use crate::models::template::{CreateTemplate, Template, TemplateQuery, UpdateTemplate};
use crate::models::Paginated;
use crate::repository::templates;

/// GET /api/templates
pub async fn handle_list(
    Db(db): Db,
    QueryParams(query): QueryParams<TemplateQuery>,
) -> Result<Json<Paginated<Template>>, AppError> {
    Ok(Json(templates::list(db.as_ref(), query).await?))
}

/// POST /api/templates
pub async fn handle_create(
    Db(db): Db,
    JsonBody(input): JsonBody<CreateTemplate>,
) -> Result<(StatusCode, Json<Template>), AppError> {
    let template = templates::create(db.as_ref(), input).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

/// GET /api/templates/:id
pub async fn handle_get(Db(db): Db, Path(id): Path<String>) -> Result<Json<Template>, AppError> {
    Ok(Json(templates::get(db.as_ref(), &id).await?))
}

/// PUT /api/templates/:id
pub async fn handle_update(
    Db(db): Db,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<UpdateTemplate>,
) -> Result<Json<Template>, AppError> {
    Ok(Json(templates::update(db.as_ref(), &id, input).await?))
}

/// DELETE /api/templates/:id
pub async fn handle_delete(Db(db): Db, Path(id): Path<String>) -> Result<StatusCode, AppError> {
    templates::delete(db.as_ref(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/templates/:id
///
/// Records one use of the template. Takes no body.
pub async fn handle_increment_usage(
    Db(db): Db,
    Path(id): Path<String>,
) -> Result<Json<Template>, AppError> {
    Ok(Json(templates::increment_usage(db.as_ref(), &id).await?))
}
