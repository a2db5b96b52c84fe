use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use chrono::{Datelike, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::extractors::Db;
use crate::models::image::{ImageRecord, NewImage};
use crate::state::AppState;

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
/// Request body cap; leaves room for multipart framing around a full-size image.
pub const UPLOAD_BODY_LIMIT: usize = MAX_IMAGE_BYTES + 64 * 1024;
const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
    pub path: String,
    pub image: ImageRecord,
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge {
            limit: MAX_IMAGE_BYTES,
        }
    } else {
        AppError::Validation(err.body_text())
    }
}

/// Checks the declared type and size; returns the normalized content type.
pub fn check_image(content_type: Option<&str>, len: usize) -> Result<String, AppError> {
    let content_type = content_type
        .map(|c| c.trim().to_ascii_lowercase())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::UnsupportedMediaType("missing content type".to_string()))?;
    if !content_type.starts_with("image/") {
        return Err(AppError::UnsupportedMediaType(content_type));
    }
    if len == 0 {
        return Err(AppError::Validation("file is empty".to_string()));
    }
    if len > MAX_IMAGE_BYTES {
        return Err(AppError::PayloadTooLarge {
            limit: MAX_IMAGE_BYTES,
        });
    }
    Ok(content_type)
}

fn extension(content_type: &str) -> &str {
    let subtype = content_type
        .split_once('/')
        .map(|(_, s)| s)
        .unwrap_or("bin");
    let subtype = subtype.split(['+', ';']).next().unwrap_or(subtype).trim();
    match subtype {
        "jpeg" | "pjpeg" => "jpg",
        "" => "bin",
        other => other,
    }
}

/// `YYYY/MM/<uuid>.<ext>`
fn object_path(content_type: &str) -> String {
    let now = Utc::now();
    format!(
        "{:04}/{:02}/{}.{}",
        now.year(),
        now.month(),
        Uuid::new_v4(),
        extension(content_type)
    )
}

/// POST /api/upload
///
/// Multipart form with one `file` field holding an image of at most 5 MiB.
pub async fn handle_upload(
    State(state): State<AppState>,
    Db(db): Db,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let mut upload: Option<(Option<String>, Option<String>, Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        let data = field.bytes().await.map_err(multipart_error)?;
        upload = Some((content_type, file_name, data));
        break;
    }

    let (content_type, original_name, data) = upload
        .ok_or_else(|| AppError::Validation(format!("multipart field '{FILE_FIELD}' is required")))?;
    let content_type = check_image(content_type.as_deref(), data.len())?;

    let path = object_path(&content_type);
    let size_bytes = data.len() as i64;
    let url = state.storage.put(&path, &content_type, data).await?;

    let image = db
        .record_image(NewImage {
            path: path.clone(),
            url: url.clone(),
            content_type,
            size_bytes,
            original_name,
        })
        .await?;

    info!(path = %path, size_bytes, backend = state.storage.backend(), "Image uploaded");
    Ok((StatusCode::CREATED, Json(UploadResponse { url, path, image })))
}
