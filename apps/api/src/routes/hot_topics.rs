use axum::{extract::Path, http::StatusCode, Json};

use crate::errors::AppError;
use crate::extractors::{Db, JsonBody, QueryParams};
use crate::models::hot_topic::{
    AdjustVolume, CreateHotTopic, HotTopicQuery, HotTopicView, UpdateHotTopic,
};
use crate::models::Paginated;
use crate::repository::hot_topics;

// Every response carries the derived `is_trending` flag.

/// GET /api/hot-topics
pub async fn handle_list(
    Db(db): Db,
    QueryParams(query): QueryParams<HotTopicQuery>,
) -> Result<Json<Paginated<HotTopicView>>, AppError> {
    let page = hot_topics::list(db.as_ref(), query).await?;
    Ok(Json(page.map(HotTopicView::from)))
}

/// POST /api/hot-topics
pub async fn handle_create(
    Db(db): Db,
    JsonBody(input): JsonBody<CreateHotTopic>,
) -> Result<(StatusCode, Json<HotTopicView>), AppError> {
    let topic = hot_topics::create(db.as_ref(), input).await?;
    Ok((StatusCode::CREATED, Json(topic.into())))
}

/// GET /api/hot-topics/:id
pub async fn handle_get(
    Db(db): Db,
    Path(id): Path<String>,
) -> Result<Json<HotTopicView>, AppError> {
    Ok(Json(hot_topics::get(db.as_ref(), &id).await?.into()))
}

/// PUT /api/hot-topics/:id
pub async fn handle_update(
    Db(db): Db,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<UpdateHotTopic>,
) -> Result<Json<HotTopicView>, AppError> {
    Ok(Json(hot_topics::update(db.as_ref(), &id, input).await?.into()))
}

/// DELETE /api/hot-topics/:id
pub async fn handle_delete(Db(db): Db, Path(id): Path<String>) -> Result<StatusCode, AppError> {
    hot_topics::delete(db.as_ref(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/hot-topics/:id with `{"increment": n}`
pub async fn handle_adjust_volume(
    Db(db): Db,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<AdjustVolume>,
) -> Result<Json<HotTopicView>, AppError> {
    let topic = hot_topics::adjust_volume(db.as_ref(), &id, body.increment).await?;
    Ok(Json(topic.into()))
}
