use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::status::ArticleStatus;
use crate::models::Pagination;

/// A row from the `articles` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub summary: Option<String>,
    pub content: String,
    pub cover_image: Option<String>,
    pub category: Option<String>,
    pub keywords: Vec<String>,
    pub status: ArticleStatus,
    pub template_id: Option<Uuid>,
    pub hot_topic_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Request body for `POST /api/articles`. Ids and status arrive unvalidated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateArticle {
    pub title: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub cover_image: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub status: Option<String>,
    pub template_id: Option<String>,
    pub hot_topic_id: Option<String>,
}

/// Request body for `PUT /api/articles/:id`. Absent fields are left untouched;
/// an empty `template_id`/`hot_topic_id` clears the link.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateArticle {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub cover_image: Option<String>,
    pub category: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub status: Option<String>,
    pub template_id: Option<String>,
    pub hot_topic_id: Option<String>,
}

/// Validated insert payload handed to the store.
#[derive(Debug, Clone)]
pub struct ArticleDraft {
    pub title: String,
    pub summary: Option<String>,
    pub content: String,
    pub cover_image: Option<String>,
    pub category: Option<String>,
    pub keywords: Vec<String>,
    pub status: ArticleStatus,
    pub template_id: Option<Uuid>,
    pub hot_topic_id: Option<Uuid>,
}

/// Validated partial update handed to the store.
/// `Some(None)` on a link field sets it to NULL. `expected_status` is the
/// status the transition was checked against.
#[derive(Debug, Clone, Default)]
pub struct ArticleChanges {
    pub expected_status: Option<ArticleStatus>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub cover_image: Option<String>,
    pub category: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub status: Option<ArticleStatus>,
    pub published_at: Option<DateTime<Utc>>,
    pub template_id: Option<Option<Uuid>>,
    pub hot_topic_id: Option<Option<Uuid>>,
}

/// Query string for `GET /api/articles`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleQuery {
    pub page: Option<u32>,
    #[serde(alias = "page_size")]
    pub page_size: Option<u32>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub keyword: Option<String>,
    #[serde(alias = "start_date")]
    pub start_date: Option<String>,
    #[serde(alias = "end_date")]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub status: Option<ArticleStatus>,
    pub category: Option<String>,
    pub keyword: Option<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_until: Option<DateTime<Utc>>,
    pub pagination: Pagination,
}

impl ArticleFilter {
    pub fn matches(&self, article: &Article) -> bool {
        if let Some(status) = self.status {
            if article.status != status {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if article.category.as_deref() != Some(category.as_str()) {
                return false;
            }
        }
        if let Some(keyword) = &self.keyword {
            let needle = keyword.to_lowercase();
            let in_title = article.title.to_lowercase().contains(&needle);
            let in_summary = article
                .summary
                .as_deref()
                .is_some_and(|s| s.to_lowercase().contains(&needle));
            if !in_title && !in_summary {
                return false;
            }
        }
        if let Some(from) = self.created_from {
            if article.created_at < from {
                return false;
            }
        }
        if let Some(until) = self.created_until {
            if article.created_at > until {
                return false;
            }
        }
        true
    }
}
