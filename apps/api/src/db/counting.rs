//! Store wrapper that counts every call, for asserting when I/O happens.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::db::memory::MemoryStore;
use crate::db::{Store, StoreResult};
use crate::models::ai_task::{AiTask, AiTaskFilter, NewAiTask};
use crate::models::article::{Article, ArticleChanges, ArticleDraft, ArticleFilter};
use crate::models::hot_topic::{CreateHotTopic, HotTopic, HotTopicFilter, UpdateHotTopic};
use crate::models::image::{ImageRecord, NewImage};
use crate::models::status::AiTaskStatus;
use crate::models::template::{CreateTemplate, Template, TemplateFilter, UpdateTemplate};

#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    calls: AtomicUsize,
}

impl CountingStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) -> &MemoryStore {
        self.calls.fetch_add(1, Ordering::SeqCst);
        &self.inner
    }
}

#[async_trait]
impl Store for CountingStore {
    fn backend(&self) -> &'static str {
        "counting"
    }

    async fn list_articles(&self, filter: &ArticleFilter) -> StoreResult<(Vec<Article>, i64)> {
        self.hit().list_articles(filter).await
    }

    async fn get_article(&self, id: Uuid) -> StoreResult<Option<Article>> {
        self.hit().get_article(id).await
    }

    async fn insert_article(&self, draft: ArticleDraft) -> StoreResult<Article> {
        self.hit().insert_article(draft).await
    }

    async fn update_article(
        &self,
        id: Uuid,
        changes: ArticleChanges,
    ) -> StoreResult<Option<Article>> {
        self.hit().update_article(id, changes).await
    }

    async fn delete_article(&self, id: Uuid) -> StoreResult<bool> {
        self.hit().delete_article(id).await
    }

    async fn list_templates(
        &self,
        filter: &TemplateFilter,
    ) -> StoreResult<(Vec<Template>, i64)> {
        self.hit().list_templates(filter).await
    }

    async fn get_template(&self, id: Uuid) -> StoreResult<Option<Template>> {
        self.hit().get_template(id).await
    }

    async fn insert_template(&self, input: CreateTemplate) -> StoreResult<Template> {
        self.hit().insert_template(input).await
    }

    async fn update_template(
        &self,
        id: Uuid,
        changes: UpdateTemplate,
    ) -> StoreResult<Option<Template>> {
        self.hit().update_template(id, changes).await
    }

    async fn delete_template(&self, id: Uuid) -> StoreResult<bool> {
        self.hit().delete_template(id).await
    }

    async fn increment_template_usage(&self, id: Uuid) -> StoreResult<Option<Template>> {
        self.hit().increment_template_usage(id).await
    }

    async fn list_hot_topics(
        &self,
        filter: &HotTopicFilter,
    ) -> StoreResult<(Vec<HotTopic>, i64)> {
        self.hit().list_hot_topics(filter).await
    }

    async fn get_hot_topic(&self, id: Uuid) -> StoreResult<Option<HotTopic>> {
        self.hit().get_hot_topic(id).await
    }

    async fn insert_hot_topic(&self, input: CreateHotTopic) -> StoreResult<HotTopic> {
        self.hit().insert_hot_topic(input).await
    }

    async fn update_hot_topic(
        &self,
        id: Uuid,
        changes: UpdateHotTopic,
    ) -> StoreResult<Option<HotTopic>> {
        self.hit().update_hot_topic(id, changes).await
    }

    async fn delete_hot_topic(&self, id: Uuid) -> StoreResult<bool> {
        self.hit().delete_hot_topic(id).await
    }

    async fn adjust_hot_topic_volume(
        &self,
        id: Uuid,
        delta: i64,
    ) -> StoreResult<Option<HotTopic>> {
        self.hit().adjust_hot_topic_volume(id, delta).await
    }

    async fn list_ai_tasks(&self, filter: &AiTaskFilter) -> StoreResult<(Vec<AiTask>, i64)> {
        self.hit().list_ai_tasks(filter).await
    }

    async fn get_ai_task(&self, id: Uuid) -> StoreResult<Option<AiTask>> {
        self.hit().get_ai_task(id).await
    }

    async fn insert_ai_task(&self, input: NewAiTask) -> StoreResult<AiTask> {
        self.hit().insert_ai_task(input).await
    }

    async fn transition_ai_task(
        &self,
        id: Uuid,
        from: AiTaskStatus,
        to: AiTaskStatus,
        result_data: Option<Value>,
    ) -> StoreResult<Option<AiTask>> {
        self.hit().transition_ai_task(id, from, to, result_data).await
    }

    async fn delete_ai_task(&self, id: Uuid) -> StoreResult<bool> {
        self.hit().delete_ai_task(id).await
    }

    async fn record_image(&self, image: NewImage) -> StoreResult<ImageRecord> {
        self.hit().record_image(image).await
    }
}
