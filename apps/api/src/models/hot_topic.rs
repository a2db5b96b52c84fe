use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Pagination;

/// Search volume at or above which a topic counts as trending.
pub const TRENDING_VOLUME_THRESHOLD: i64 = 10_000;

/// A row from the `hot_topics` table. `related_articles` is derived from
/// `articles.hot_topic_id` when the row is read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HotTopic {
    pub id: Uuid,
    pub keyword: String,
    pub volume: i64,
    pub source: Option<String>,
    pub related_articles: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HotTopic {
    pub fn is_trending(&self) -> bool {
        self.volume >= TRENDING_VOLUME_THRESHOLD
    }
}

/// Response shape: the stored row plus the derived trending flag.
#[derive(Debug, Clone, Serialize)]
pub struct HotTopicView {
    #[serde(flatten)]
    pub topic: HotTopic,
    pub is_trending: bool,
}

impl From<HotTopic> for HotTopicView {
    fn from(topic: HotTopic) -> Self {
        let is_trending = topic.is_trending();
        Self { topic, is_trending }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateHotTopic {
    pub keyword: String,
    #[serde(default)]
    pub volume: i64,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateHotTopic {
    pub keyword: Option<String>,
    pub volume: Option<i64>,
    pub source: Option<String>,
}

/// Body for `PATCH /api/hot-topics/:id`.
#[derive(Debug, Clone, Deserialize)]
pub struct AdjustVolume {
    pub increment: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotTopicQuery {
    pub page: Option<u32>,
    #[serde(alias = "page_size")]
    pub page_size: Option<u32>,
    #[serde(alias = "min_volume")]
    pub min_volume: Option<i64>,
    pub source: Option<String>,
    pub keyword: Option<String>,
    pub trending: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct HotTopicFilter {
    pub min_volume: Option<i64>,
    /// Exclusive upper bound, used for `trending=false`.
    pub below_volume: Option<i64>,
    pub source: Option<String>,
    pub keyword: Option<String>,
    pub pagination: Pagination,
}

impl HotTopicFilter {
    pub fn matches(&self, topic: &HotTopic) -> bool {
        if let Some(min) = self.min_volume {
            if topic.volume < min {
                return false;
            }
        }
        if let Some(max) = self.below_volume {
            if topic.volume >= max {
                return false;
            }
        }
        if let Some(source) = &self.source {
            if topic.source.as_deref() != Some(source.as_str()) {
                return false;
            }
        }
        if let Some(keyword) = &self.keyword {
            if !topic
                .keyword
                .to_lowercase()
                .contains(&keyword.to_lowercase())
            {
                return false;
            }
        }
        true
    }
}
