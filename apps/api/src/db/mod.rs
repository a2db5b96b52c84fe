//! Database access.
//!
//! `Store` is the seam between the repositories and a backend: `PgStore` talks
//! to Postgres through sqlx, `MemoryStore` serves mock mode. Handles are built
//! by `ClientFactory` and shared through `ConnectionManager`.

pub mod config;
pub mod connection;
#[cfg(test)]
pub mod counting;
pub mod factory;
pub mod fixtures;
pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::ai_task::{AiTask, AiTaskFilter, NewAiTask};
use crate::models::article::{Article, ArticleChanges, ArticleDraft, ArticleFilter};
use crate::models::hot_topic::{CreateHotTopic, HotTopic, HotTopicFilter, UpdateHotTopic};
use crate::models::image::{ImageRecord, NewImage};
use crate::models::status::AiTaskStatus;
use crate::models::template::{CreateTemplate, Template, TemplateFilter, UpdateTemplate};

pub use config::DbConfig;
pub use connection::ConnectionManager;
pub use factory::ClientFactory;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{field} references {id}, which does not exist")]
    MissingReference { field: &'static str, id: Uuid },

    #[error("{entity} {id} is {actual}, expected {expected} before moving to {attempted}")]
    StatusConflict {
        entity: &'static str,
        id: Uuid,
        actual: String,
        expected: String,
        attempted: String,
    },

    #[error("Invalid value '{value}' in column {column}")]
    InvalidColumn { column: &'static str, value: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A shared database handle. Identity (`Arc::ptr_eq`) is what the connection
/// manager promotes to the process-wide singleton.
pub type DbHandle = Arc<dyn Store>;

#[async_trait]
pub trait Store: Send + Sync {
    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;

    async fn migrate(&self) -> StoreResult<()> {
        Ok(())
    }

    // --- Articles ---
    async fn list_articles(&self, filter: &ArticleFilter) -> StoreResult<(Vec<Article>, i64)>;
    async fn get_article(&self, id: Uuid) -> StoreResult<Option<Article>>;
    /// Fails with `MissingReference` (and writes nothing) if a linked template
    /// or hot topic does not exist.
    async fn insert_article(&self, draft: ArticleDraft) -> StoreResult<Article>;
    /// When `changes.expected_status` is set the write only applies while the
    /// article is still in that status; otherwise it yields `StatusConflict`.
    async fn update_article(
        &self,
        id: Uuid,
        changes: ArticleChanges,
    ) -> StoreResult<Option<Article>>;
    async fn delete_article(&self, id: Uuid) -> StoreResult<bool>;

    // --- Templates ---
    async fn list_templates(&self, filter: &TemplateFilter)
        -> StoreResult<(Vec<Template>, i64)>;
    async fn get_template(&self, id: Uuid) -> StoreResult<Option<Template>>;
    async fn insert_template(&self, input: CreateTemplate) -> StoreResult<Template>;
    async fn update_template(
        &self,
        id: Uuid,
        changes: UpdateTemplate,
    ) -> StoreResult<Option<Template>>;
    async fn delete_template(&self, id: Uuid) -> StoreResult<bool>;
    /// Atomically bumps `usage_count` by one.
    async fn increment_template_usage(&self, id: Uuid) -> StoreResult<Option<Template>>;

    // --- Hot topics ---
    async fn list_hot_topics(&self, filter: &HotTopicFilter)
        -> StoreResult<(Vec<HotTopic>, i64)>;
    async fn get_hot_topic(&self, id: Uuid) -> StoreResult<Option<HotTopic>>;
    async fn insert_hot_topic(&self, input: CreateHotTopic) -> StoreResult<HotTopic>;
    async fn update_hot_topic(
        &self,
        id: Uuid,
        changes: UpdateHotTopic,
    ) -> StoreResult<Option<HotTopic>>;
    async fn delete_hot_topic(&self, id: Uuid) -> StoreResult<bool>;
    /// Atomically adds `delta` to `volume`, never going below zero.
    async fn adjust_hot_topic_volume(&self, id: Uuid, delta: i64)
        -> StoreResult<Option<HotTopic>>;

    // --- AI tasks ---
    async fn list_ai_tasks(&self, filter: &AiTaskFilter) -> StoreResult<(Vec<AiTask>, i64)>;
    async fn get_ai_task(&self, id: Uuid) -> StoreResult<Option<AiTask>>;
    async fn insert_ai_task(&self, input: NewAiTask) -> StoreResult<AiTask>;
    /// Moves a task from `from` to `to` in one conditional write. A task in any
    /// other status yields `StatusConflict`; a missing task yields `Ok(None)`.
    async fn transition_ai_task(
        &self,
        id: Uuid,
        from: AiTaskStatus,
        to: AiTaskStatus,
        result_data: Option<Value>,
    ) -> StoreResult<Option<AiTask>>;
    async fn delete_ai_task(&self, id: Uuid) -> StoreResult<bool>;

    // --- Images ---
    async fn record_image(&self, image: NewImage) -> StoreResult<ImageRecord>;
}

/// Escapes `%`, `_` and `\` so user input matches literally inside ILIKE.
pub(crate) fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
