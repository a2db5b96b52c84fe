//! In-process store used in mock mode.
//!
//! Clones share the same tables, so every handle a factory hands out sees the
//! same data for the life of the process.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::{fixtures, Store, StoreError, StoreResult};
use crate::models::ai_task::{AiTask, AiTaskFilter, NewAiTask};
use crate::models::article::{Article, ArticleChanges, ArticleDraft, ArticleFilter};
use crate::models::hot_topic::{CreateHotTopic, HotTopic, HotTopicFilter, UpdateHotTopic};
use crate::models::image::{ImageRecord, NewImage};
use crate::models::status::AiTaskStatus;
use crate::models::template::{CreateTemplate, Template, TemplateFilter, UpdateTemplate};
use crate::models::Pagination;

#[derive(Debug, Default)]
pub struct Tables {
    pub articles: Vec<Article>,
    pub templates: Vec<Template>,
    pub hot_topics: Vec<HotTopic>,
    pub ai_tasks: Vec<AiTask>,
    pub images: Vec<ImageRecord>,
}

impl Tables {
    fn template_exists(&self, id: Uuid) -> bool {
        self.templates.iter().any(|t| t.id == id)
    }

    fn hot_topic_exists(&self, id: Uuid) -> bool {
        self.hot_topics.iter().any(|h| h.id == id)
    }

    fn check_references(
        &self,
        template_id: Option<Uuid>,
        hot_topic_id: Option<Uuid>,
    ) -> StoreResult<()> {
        if let Some(id) = template_id {
            if !self.template_exists(id) {
                return Err(StoreError::MissingReference {
                    field: "template_id",
                    id,
                });
            }
        }
        if let Some(id) = hot_topic_id {
            if !self.hot_topic_exists(id) {
                return Err(StoreError::MissingReference {
                    field: "hot_topic_id",
                    id,
                });
            }
        }
        Ok(())
    }

    fn with_related(&self, topic: &HotTopic) -> HotTopic {
        let mut topic = topic.clone();
        topic.related_articles = self
            .articles
            .iter()
            .filter(|a| a.hot_topic_id == Some(topic.id))
            .map(|a| a.id)
            .collect();
        topic
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store seeded with the dashboard fixtures.
    pub fn with_fixtures() -> Self {
        Self {
            tables: Arc::new(RwLock::new(fixtures::tables(Utc::now()))),
        }
    }
}

/// Newest first, then the page window. Insertion order breaks timestamp ties.
fn page_newest_first<T: Clone>(
    rows: &[T],
    created_at: impl Fn(&T) -> chrono::DateTime<Utc>,
    keep: impl Fn(&T) -> bool,
    pagination: Pagination,
) -> (Vec<T>, i64) {
    let mut matched: Vec<T> = rows.iter().rev().filter(|r| keep(r)).cloned().collect();
    matched.sort_by_key(|r| std::cmp::Reverse(created_at(r)));
    let total = matched.len() as i64;
    (pagination.slice(matched), total)
}

fn remove_by_id<T>(rows: &mut Vec<T>, id: Uuid, get_id: impl Fn(&T) -> Uuid) -> bool {
    let before = rows.len();
    rows.retain(|r| get_id(r) != id);
    rows.len() != before
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    // --- Articles ---

    async fn list_articles(&self, filter: &ArticleFilter) -> StoreResult<(Vec<Article>, i64)> {
        let tables = self.tables.read().await;
        Ok(page_newest_first(
            &tables.articles,
            |a| a.created_at,
            |a| filter.matches(a),
            filter.pagination,
        ))
    }

    async fn get_article(&self, id: Uuid) -> StoreResult<Option<Article>> {
        let tables = self.tables.read().await;
        Ok(tables.articles.iter().find(|a| a.id == id).cloned())
    }

    async fn insert_article(&self, draft: ArticleDraft) -> StoreResult<Article> {
        let mut tables = self.tables.write().await;
        tables.check_references(draft.template_id, draft.hot_topic_id)?;

        let now = Utc::now();
        let article = Article {
            id: Uuid::new_v4(),
            title: draft.title,
            summary: draft.summary,
            content: draft.content,
            cover_image: draft.cover_image,
            category: draft.category,
            keywords: draft.keywords,
            published_at: (draft.status == crate::models::status::ArticleStatus::Published)
                .then_some(now),
            status: draft.status,
            template_id: draft.template_id,
            hot_topic_id: draft.hot_topic_id,
            created_at: now,
            updated_at: now,
        };
        tables.articles.push(article.clone());
        Ok(article)
    }

    async fn update_article(
        &self,
        id: Uuid,
        changes: ArticleChanges,
    ) -> StoreResult<Option<Article>> {
        let mut tables = self.tables.write().await;
        tables.check_references(changes.template_id.flatten(), changes.hot_topic_id.flatten())?;

        let Some(article) = tables.articles.iter_mut().find(|a| a.id == id) else {
            return Ok(None);
        };
        if let Some(expected) = changes.expected_status {
            if article.status != expected {
                return Err(StoreError::StatusConflict {
                    entity: "article",
                    id,
                    actual: article.status.to_string(),
                    expected: expected.to_string(),
                    attempted: changes.status.unwrap_or(expected).to_string(),
                });
            }
        }
        if let Some(title) = changes.title {
            article.title = title;
        }
        if let Some(summary) = changes.summary {
            article.summary = Some(summary);
        }
        if let Some(content) = changes.content {
            article.content = content;
        }
        if let Some(cover_image) = changes.cover_image {
            article.cover_image = Some(cover_image);
        }
        if let Some(category) = changes.category {
            article.category = Some(category);
        }
        if let Some(keywords) = changes.keywords {
            article.keywords = keywords;
        }
        if let Some(status) = changes.status {
            article.status = status;
        }
        if let Some(published_at) = changes.published_at {
            article.published_at = Some(published_at);
        }
        if let Some(template_id) = changes.template_id {
            article.template_id = template_id;
        }
        if let Some(hot_topic_id) = changes.hot_topic_id {
            article.hot_topic_id = hot_topic_id;
        }
        article.updated_at = Utc::now();
        Ok(Some(article.clone()))
    }

    async fn delete_article(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(remove_by_id(&mut tables.articles, id, |a| a.id))
    }

    // --- Templates ---

    async fn list_templates(
        &self,
        filter: &TemplateFilter,
    ) -> StoreResult<(Vec<Template>, i64)> {
        let tables = self.tables.read().await;
        Ok(page_newest_first(
            &tables.templates,
            |t| t.created_at,
            |t| filter.matches(t),
            filter.pagination,
        ))
    }

    async fn get_template(&self, id: Uuid) -> StoreResult<Option<Template>> {
        let tables = self.tables.read().await;
        Ok(tables.templates.iter().find(|t| t.id == id).cloned())
    }

    async fn insert_template(&self, input: CreateTemplate) -> StoreResult<Template> {
        let now = Utc::now();
        let template = Template {
            id: Uuid::new_v4(),
            name: input.name,
            description: input.description,
            category: input.category,
            content: input.content,
            usage_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.tables.write().await.templates.push(template.clone());
        Ok(template)
    }

    async fn update_template(
        &self,
        id: Uuid,
        changes: UpdateTemplate,
    ) -> StoreResult<Option<Template>> {
        let mut tables = self.tables.write().await;
        let Some(template) = tables.templates.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            template.name = name;
        }
        if let Some(description) = changes.description {
            template.description = Some(description);
        }
        if let Some(category) = changes.category {
            template.category = Some(category);
        }
        if let Some(content) = changes.content {
            template.content = content;
        }
        template.updated_at = Utc::now();
        Ok(Some(template.clone()))
    }

    async fn delete_template(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let removed = remove_by_id(&mut tables.templates, id, |t| t.id);
        if removed {
            for article in tables.articles.iter_mut().filter(|a| a.template_id == Some(id)) {
                article.template_id = None;
            }
        }
        Ok(removed)
    }

    async fn increment_template_usage(&self, id: Uuid) -> StoreResult<Option<Template>> {
        let mut tables = self.tables.write().await;
        Ok(tables.templates.iter_mut().find(|t| t.id == id).map(|t| {
            t.usage_count += 1;
            t.updated_at = Utc::now();
            t.clone()
        }))
    }

    // --- Hot topics ---

    async fn list_hot_topics(
        &self,
        filter: &HotTopicFilter,
    ) -> StoreResult<(Vec<HotTopic>, i64)> {
        let tables = self.tables.read().await;
        let mut matched: Vec<HotTopic> = tables
            .hot_topics
            .iter()
            .filter(|h| filter.matches(h))
            .map(|h| tables.with_related(h))
            .collect();
        matched.sort_by(|a, b| {
            b.volume
                .cmp(&a.volume)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        let total = matched.len() as i64;
        Ok((filter.pagination.slice(matched), total))
    }

    async fn get_hot_topic(&self, id: Uuid) -> StoreResult<Option<HotTopic>> {
        let tables = self.tables.read().await;
        Ok(tables
            .hot_topics
            .iter()
            .find(|h| h.id == id)
            .map(|h| tables.with_related(h)))
    }

    async fn insert_hot_topic(&self, input: CreateHotTopic) -> StoreResult<HotTopic> {
        let now = Utc::now();
        let topic = HotTopic {
            id: Uuid::new_v4(),
            keyword: input.keyword,
            volume: input.volume,
            source: input.source,
            related_articles: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.tables.write().await.hot_topics.push(topic.clone());
        Ok(topic)
    }

    async fn update_hot_topic(
        &self,
        id: Uuid,
        changes: UpdateHotTopic,
    ) -> StoreResult<Option<HotTopic>> {
        let mut tables = self.tables.write().await;
        let Some(topic) = tables.hot_topics.iter_mut().find(|h| h.id == id) else {
            return Ok(None);
        };
        if let Some(keyword) = changes.keyword {
            topic.keyword = keyword;
        }
        if let Some(volume) = changes.volume {
            topic.volume = volume;
        }
        if let Some(source) = changes.source {
            topic.source = Some(source);
        }
        topic.updated_at = Utc::now();
        let topic = topic.clone();
        Ok(Some(tables.with_related(&topic)))
    }

    async fn delete_hot_topic(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let removed = remove_by_id(&mut tables.hot_topics, id, |h| h.id);
        if removed {
            for article in tables.articles.iter_mut().filter(|a| a.hot_topic_id == Some(id)) {
                article.hot_topic_id = None;
            }
        }
        Ok(removed)
    }

    async fn adjust_hot_topic_volume(
        &self,
        id: Uuid,
        delta: i64,
    ) -> StoreResult<Option<HotTopic>> {
        let mut tables = self.tables.write().await;
        let Some(topic) = tables.hot_topics.iter_mut().find(|h| h.id == id) else {
            return Ok(None);
        };
        topic.volume = topic.volume.saturating_add(delta).max(0);
        topic.updated_at = Utc::now();
        let topic = topic.clone();
        Ok(Some(tables.with_related(&topic)))
    }

    // --- AI tasks ---

    async fn list_ai_tasks(&self, filter: &AiTaskFilter) -> StoreResult<(Vec<AiTask>, i64)> {
        let tables = self.tables.read().await;
        Ok(page_newest_first(
            &tables.ai_tasks,
            |t| t.created_at,
            |t| filter.matches(t),
            filter.pagination,
        ))
    }

    async fn get_ai_task(&self, id: Uuid) -> StoreResult<Option<AiTask>> {
        let tables = self.tables.read().await;
        Ok(tables.ai_tasks.iter().find(|t| t.id == id).cloned())
    }

    async fn insert_ai_task(&self, input: NewAiTask) -> StoreResult<AiTask> {
        let task = AiTask {
            id: Uuid::new_v4(),
            name: input.name,
            task_type: input.task_type,
            status: AiTaskStatus::Pending,
            input_data: input.input_data,
            result_data: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        self.tables.write().await.ai_tasks.push(task.clone());
        Ok(task)
    }

    async fn transition_ai_task(
        &self,
        id: Uuid,
        from: AiTaskStatus,
        to: AiTaskStatus,
        result_data: Option<Value>,
    ) -> StoreResult<Option<AiTask>> {
        let mut tables = self.tables.write().await;
        let Some(task) = tables.ai_tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        if task.status != from {
            return Err(StoreError::StatusConflict {
                entity: "ai task",
                id,
                actual: task.status.to_string(),
                expected: from.to_string(),
                attempted: to.to_string(),
            });
        }
        task.status = to;
        if result_data.is_some() {
            task.result_data = result_data;
        }
        if to.is_terminal() {
            task.completed_at = Some(Utc::now());
        }
        Ok(Some(task.clone()))
    }

    async fn delete_ai_task(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(remove_by_id(&mut tables.ai_tasks, id, |t| t.id))
    }

    // --- Images ---

    async fn record_image(&self, image: NewImage) -> StoreResult<ImageRecord> {
        let record = ImageRecord {
            id: Uuid::new_v4(),
            path: image.path,
            url: image.url,
            content_type: image.content_type,
            size_bytes: image.size_bytes,
            original_name: image.original_name,
            created_at: Utc::now(),
        };
        self.tables.write().await.images.push(record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::status::ArticleStatus;

    fn draft(title: &str) -> ArticleDraft {
        ArticleDraft {
            title: title.to_string(),
            summary: None,
            content: String::new(),
            cover_image: None,
            category: None,
            keywords: Vec::new(),
            status: ArticleStatus::Draft,
            template_id: None,
            hot_topic_id: None,
        }
    }

    #[tokio::test]
    async fn test_clones_share_tables() {
        let a = MemoryStore::new();
        let b = a.clone();
        let created = a.insert_article(draft("shared")).await.unwrap();
        assert!(b.get_article(created.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_missing_reference_writes_nothing() {
        let store = MemoryStore::new();
        let mut d = draft("orphan");
        d.hot_topic_id = Some(Uuid::new_v4());
        let err = store.insert_article(d).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::MissingReference {
                field: "hot_topic_id",
                ..
            }
        ));
        let (rows, total) = store.list_articles(&ArticleFilter::default()).await.unwrap();
        assert!(rows.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_related_articles_are_derived() {
        let store = MemoryStore::new();
        let topic = store
            .insert_hot_topic(CreateHotTopic {
                keyword: "ETF".into(),
                volume: 12_000,
                source: None,
            })
            .await
            .unwrap();
        let mut d = draft("ETF approved");
        d.hot_topic_id = Some(topic.id);
        let article = store.insert_article(d).await.unwrap();

        let topic = store.get_hot_topic(topic.id).await.unwrap().unwrap();
        assert_eq!(topic.related_articles, vec![article.id]);

        store.delete_hot_topic(topic.id).await.unwrap();
        let article = store.get_article(article.id).await.unwrap().unwrap();
        assert_eq!(article.hot_topic_id, None);
    }

    #[tokio::test]
    async fn test_volume_adjustment_clamps_at_zero() {
        let store = MemoryStore::new();
        let topic = store
            .insert_hot_topic(CreateHotTopic {
                keyword: "SOL".into(),
                volume: 5,
                source: None,
            })
            .await
            .unwrap();
        let topic = store
            .adjust_hot_topic_volume(topic.id, -50)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(topic.volume, 0);
    }

    #[tokio::test]
    async fn test_fixtures_are_consistent() {
        let store = MemoryStore::with_fixtures();
        let (articles, _) = store
            .list_articles(&ArticleFilter {
                pagination: Pagination::new(Some(1), Some(100)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(!articles.is_empty());
        for article in articles {
            if let Some(id) = article.template_id {
                assert!(store.get_template(id).await.unwrap().is_some());
            }
            if let Some(id) = article.hot_topic_id {
                assert!(store.get_hot_topic(id).await.unwrap().is_some());
            }
        }
    }
}
