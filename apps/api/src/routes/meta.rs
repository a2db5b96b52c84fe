use axum::Json;
use serde::Serialize;

use crate::models::status::{AiTaskStatus, AiTaskType, ArticleStatus};

#[derive(Debug, Serialize)]
pub struct VocabularyEntry {
    pub value: &'static str,
    pub label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct Vocabularies {
    pub article_status: Vec<VocabularyEntry>,
    pub ai_task_status: Vec<VocabularyEntry>,
    pub ai_task_type: Vec<VocabularyEntry>,
}

/// GET /api/meta/statuses
/// API values with their display labels and badge colors.
pub async fn handle_statuses() -> Json<Vocabularies> {
    Json(Vocabularies {
        article_status: ArticleStatus::ALL
            .into_iter()
            .map(|s| VocabularyEntry {
                value: s.as_str(),
                label: s.label_zh(),
                color: Some(s.badge_color()),
            })
            .collect(),
        ai_task_status: AiTaskStatus::ALL
            .into_iter()
            .map(|s| VocabularyEntry {
                value: s.as_str(),
                label: s.label_zh(),
                color: Some(s.badge_color()),
            })
            .collect(),
        ai_task_type: AiTaskType::ALL
            .into_iter()
            .map(|t| VocabularyEntry {
                value: t.as_str(),
                label: t.label_zh(),
                color: None,
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_vocabularies_cover_every_variant() {
        let Json(v) = handle_statuses().await;
        assert_eq!(v.article_status.len(), 5);
        assert_eq!(v.ai_task_status.len(), 4);
        let published = v
            .article_status
            .iter()
            .find(|e| e.value == "published")
            .unwrap();
        assert_eq!(published.label, "已发布");
        assert_eq!(published.color, Some("green"));
    }
}
