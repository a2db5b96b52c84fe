use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A row from the lazily created `images` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageRecord {
    pub id: Uuid,
    pub path: String,
    pub url: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub original_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewImage {
    pub path: String,
    pub url: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub original_name: Option<String>,
}
