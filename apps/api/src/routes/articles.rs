use axum::{extract::Path, http::StatusCode, Json};

use crate::errors::AppError;
use crate::extractors::{Db, JsonBody, QueryParams};
use crate::models::article::{Article, ArticleQuery, CreateArticle, UpdateArticle};
use crate::models::Paginated;
use crate::repository::articles;

/// GET /api/articles
pub async fn handle_list(
    Db(db): Db,
    QueryParams(query): QueryParams<ArticleQuery>,
) -> Result<Json<Paginated<Article>>, AppError> {
    Ok(Json(articles::list(db.as_ref(), query).await?))
}

/// POST /api/articles
pub async fn handle_create(
    Db(db): Db,
    JsonBody(input): JsonBody<CreateArticle>,
) -> Result<(StatusCode, Json<Article>), AppError> {
    let article = articles::create(db.as_ref(), input).await?;
    Ok((StatusCode::CREATED, Json(article)))
}

/// GET /api/articles/:id
pub async fn handle_get(Db(db): Db, Path(id): Path<String>) -> Result<Json<Article>, AppError> {
    Ok(Json(articles::get(db.as_ref(), &id).await?))
}

/// PUT /api/articles/:id
///
/// Partial update; status changes must follow the review workflow.
pub async fn handle_update(
    Db(db): Db,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<UpdateArticle>,
) -> Result<Json<Article>, AppError> {
    Ok(Json(articles::update(db.as_ref(), &id, input).await?))
}

/// DELETE /api/articles/:id
pub async fn handle_delete(Db(db): Db, Path(id): Path<String>) -> Result<StatusCode, AppError> {
    articles::delete(db.as_ref(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
