//! Postgres backend.
//!
//! Referential integrity is enforced by FK constraints; violations are
//! translated into `StoreError::MissingReference` so callers see the same
//! error as in mock mode. Counters are bumped with single UPDATE statements.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tokio::sync::OnceCell;
use tracing::info;
use uuid::Uuid;

use crate::db::{escape_like, Store, StoreError, StoreResult};
use crate::models::ai_task::{AiTask, AiTaskFilter, NewAiTask};
use crate::models::article::{Article, ArticleChanges, ArticleDraft, ArticleFilter};
use crate::models::hot_topic::{CreateHotTopic, HotTopic, HotTopicFilter, UpdateHotTopic};
use crate::models::image::{ImageRecord, NewImage};
use crate::models::status::AiTaskStatus;
use crate::models::template::{CreateTemplate, Template, TemplateFilter, UpdateTemplate};

const FOREIGN_KEY_VIOLATION: &str = "23503";

const ARTICLE_COLUMNS: &str = "id, title, summary, content, cover_image, category, keywords, \
     status, template_id, hot_topic_id, created_at, updated_at, published_at";

const TEMPLATE_COLUMNS: &str =
    "id, name, description, category, content, usage_count, created_at, updated_at";

const HOT_TOPIC_COLUMNS: &str = "id, keyword, volume, source, created_at, updated_at, \
     ARRAY(SELECT a.id FROM articles a WHERE a.hot_topic_id = hot_topics.id \
           ORDER BY a.created_at) AS related_articles";

const AI_TASK_COLUMNS: &str =
    "id, name, type, status, input_data, result_data, created_at, completed_at";

const IMAGE_COLUMNS: &str = "id, path, url, content_type, size_bytes, original_name, created_at";

const CREATE_IMAGES_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS images (
        id            UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        path          TEXT NOT NULL UNIQUE,
        url           TEXT NOT NULL,
        content_type  TEXT NOT NULL,
        size_bytes    BIGINT NOT NULL,
        original_name TEXT,
        created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
    )
"#;

// ────────────────────────────────────────────────────────────────────────────
// Row records
// ────────────────────────────────────────────────────────────────────────────

#[derive(FromRow)]
struct ArticleRecord {
    id: Uuid,
    title: String,
    summary: Option<String>,
    content: String,
    cover_image: Option<String>,
    category: Option<String>,
    keywords: Vec<String>,
    status: String,
    template_id: Option<Uuid>,
    hot_topic_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    published_at: Option<DateTime<Utc>>,
}

impl TryFrom<ArticleRecord> for Article {
    type Error = StoreError;

    fn try_from(r: ArticleRecord) -> Result<Self, Self::Error> {
        let status = r.status.parse().map_err(|_| StoreError::InvalidColumn {
            column: "articles.status",
            value: r.status.clone(),
        })?;
        Ok(Article {
            id: r.id,
            title: r.title,
            summary: r.summary,
            content: r.content,
            cover_image: r.cover_image,
            category: r.category,
            keywords: r.keywords,
            status,
            template_id: r.template_id,
            hot_topic_id: r.hot_topic_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
            published_at: r.published_at,
        })
    }
}

#[derive(FromRow)]
struct TemplateRecord {
    id: Uuid,
    name: String,
    description: Option<String>,
    category: Option<String>,
    content: String,
    usage_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TemplateRecord> for Template {
    fn from(r: TemplateRecord) -> Self {
        Template {
            id: r.id,
            name: r.name,
            description: r.description,
            category: r.category,
            content: r.content,
            usage_count: r.usage_count,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(FromRow)]
struct HotTopicRecord {
    id: Uuid,
    keyword: String,
    volume: i64,
    source: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    related_articles: Vec<Uuid>,
}

impl From<HotTopicRecord> for HotTopic {
    fn from(r: HotTopicRecord) -> Self {
        HotTopic {
            id: r.id,
            keyword: r.keyword,
            volume: r.volume,
            source: r.source,
            related_articles: r.related_articles,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(FromRow)]
struct AiTaskRecord {
    id: Uuid,
    name: String,
    #[sqlx(rename = "type")]
    task_type: String,
    status: String,
    input_data: Value,
    result_data: Option<Value>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<AiTaskRecord> for AiTask {
    type Error = StoreError;

    fn try_from(r: AiTaskRecord) -> Result<Self, Self::Error> {
        let task_type = r.task_type.parse().map_err(|_| StoreError::InvalidColumn {
            column: "ai_tasks.type",
            value: r.task_type.clone(),
        })?;
        let status = r.status.parse().map_err(|_| StoreError::InvalidColumn {
            column: "ai_tasks.status",
            value: r.status.clone(),
        })?;
        Ok(AiTask {
            id: r.id,
            name: r.name,
            task_type,
            status,
            input_data: r.input_data,
            result_data: r.result_data,
            created_at: r.created_at,
            completed_at: r.completed_at,
        })
    }
}

#[derive(FromRow)]
struct ImageRow {
    id: Uuid,
    path: String,
    url: String,
    content_type: String,
    size_bytes: i64,
    original_name: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ImageRow> for ImageRecord {
    fn from(r: ImageRow) -> Self {
        ImageRecord {
            id: r.id,
            path: r.path,
            url: r.url,
            content_type: r.content_type,
            size_bytes: r.size_bytes,
            original_name: r.original_name,
            created_at: r.created_at,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Query helpers
// ────────────────────────────────────────────────────────────────────────────

fn translate_reference_error(
    err: sqlx::Error,
    template_id: Option<Uuid>,
    hot_topic_id: Option<Uuid>,
) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) {
            let missing = match db_err.constraint() {
                Some("articles_template_id_fkey") => template_id.map(|id| ("template_id", id)),
                Some("articles_hot_topic_id_fkey") => hot_topic_id.map(|id| ("hot_topic_id", id)),
                _ => None,
            };
            if let Some((field, id)) = missing {
                return StoreError::MissingReference { field, id };
            }
        }
    }
    StoreError::Database(err)
}

fn push_article_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ArticleFilter) {
    qb.push(" WHERE TRUE");
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(category) = &filter.category {
        qb.push(" AND category = ").push_bind(category.clone());
    }
    if let Some(keyword) = &filter.keyword {
        let pattern = format!("%{}%", escape_like(keyword));
        qb.push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR summary ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(from) = filter.created_from {
        qb.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(until) = filter.created_until {
        qb.push(" AND created_at <= ").push_bind(until);
    }
}

fn push_template_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &TemplateFilter) {
    qb.push(" WHERE TRUE");
    if let Some(category) = &filter.category {
        qb.push(" AND category = ").push_bind(category.clone());
    }
    if let Some(keyword) = &filter.keyword {
        let pattern = format!("%{}%", escape_like(keyword));
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn push_hot_topic_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &HotTopicFilter) {
    qb.push(" WHERE TRUE");
    if let Some(min) = filter.min_volume {
        qb.push(" AND volume >= ").push_bind(min);
    }
    if let Some(max) = filter.below_volume {
        qb.push(" AND volume < ").push_bind(max);
    }
    if let Some(source) = &filter.source {
        qb.push(" AND source = ").push_bind(source.clone());
    }
    if let Some(keyword) = &filter.keyword {
        qb.push(" AND keyword ILIKE ")
            .push_bind(format!("%{}%", escape_like(keyword)));
    }
}

fn push_ai_task_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &AiTaskFilter) {
    qb.push(" WHERE TRUE");
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(task_type) = filter.task_type {
        qb.push(" AND type = ").push_bind(task_type.as_str());
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Store
// ────────────────────────────────────────────────────────────────────────────

pub struct PgStore {
    pool: PgPool,
    images_ready: OnceCell<()>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            images_ready: OnceCell::new(),
        }
    }

    async fn count(&self, mut qb: QueryBuilder<'_, Postgres>) -> StoreResult<i64> {
        let (total,): (i64,) = qb.build_query_as().fetch_one(&self.pool).await?;
        Ok(total)
    }

    /// The `images` table is not part of the migrations; it is created the
    /// first time an upload is recorded.
    async fn ensure_images_table(&self) -> StoreResult<()> {
        self.images_ready
            .get_or_try_init(|| async {
                sqlx::query(CREATE_IMAGES_TABLE).execute(&self.pool).await?;
                info!("images table ready");
                Ok::<(), sqlx::Error>(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // --- Articles ---

    async fn list_articles(&self, filter: &ArticleFilter) -> StoreResult<(Vec<Article>, i64)> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM articles");
        push_article_filters(&mut count_qb, filter);
        let total = self.count(count_qb).await?;

        let mut qb = QueryBuilder::new(format!("SELECT {ARTICLE_COLUMNS} FROM articles"));
        push_article_filters(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.pagination.limit())
            .push(" OFFSET ")
            .push_bind(filter.pagination.offset());

        let rows: Vec<ArticleRecord> = qb.build_query_as().fetch_all(&self.pool).await?;
        let articles = rows
            .into_iter()
            .map(Article::try_from)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok((articles, total))
    }

    async fn get_article(&self, id: Uuid) -> StoreResult<Option<Article>> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = $1");
        sqlx::query_as::<_, ArticleRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Article::try_from)
            .transpose()
    }

    async fn insert_article(&self, draft: ArticleDraft) -> StoreResult<Article> {
        let sql = format!(
            r#"
            INSERT INTO articles
                (title, summary, content, cover_image, category, keywords, status,
                 template_id, hot_topic_id, published_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9,
                    CASE WHEN $7 = 'published' THEN now() END)
            RETURNING {ARTICLE_COLUMNS}
            "#
        );
        let record = sqlx::query_as::<_, ArticleRecord>(&sql)
            .bind(&draft.title)
            .bind(&draft.summary)
            .bind(&draft.content)
            .bind(&draft.cover_image)
            .bind(&draft.category)
            .bind(&draft.keywords)
            .bind(draft.status.as_str())
            .bind(draft.template_id)
            .bind(draft.hot_topic_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| translate_reference_error(e, draft.template_id, draft.hot_topic_id))?;
        record.try_into()
    }

    async fn update_article(
        &self,
        id: Uuid,
        changes: ArticleChanges,
    ) -> StoreResult<Option<Article>> {
        let template_ref = changes.template_id.flatten();
        let hot_topic_ref = changes.hot_topic_id.flatten();
        let expected = changes.expected_status;
        let attempted = changes.status;

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE articles SET updated_at = now()");
        if let Some(title) = changes.title {
            qb.push(", title = ").push_bind(title);
        }
        if let Some(summary) = changes.summary {
            qb.push(", summary = ").push_bind(summary);
        }
        if let Some(content) = changes.content {
            qb.push(", content = ").push_bind(content);
        }
        if let Some(cover_image) = changes.cover_image {
            qb.push(", cover_image = ").push_bind(cover_image);
        }
        if let Some(category) = changes.category {
            qb.push(", category = ").push_bind(category);
        }
        if let Some(keywords) = changes.keywords {
            qb.push(", keywords = ").push_bind(keywords);
        }
        if let Some(status) = changes.status {
            qb.push(", status = ").push_bind(status.as_str());
        }
        if let Some(published_at) = changes.published_at {
            qb.push(", published_at = ").push_bind(published_at);
        }
        if let Some(template_id) = changes.template_id {
            qb.push(", template_id = ").push_bind(template_id);
        }
        if let Some(hot_topic_id) = changes.hot_topic_id {
            qb.push(", hot_topic_id = ").push_bind(hot_topic_id);
        }
        qb.push(" WHERE id = ").push_bind(id);
        if let Some(expected) = expected {
            qb.push(" AND status = ").push_bind(expected.as_str());
        }
        qb.push(" RETURNING ").push(ARTICLE_COLUMNS);

        let updated = qb
            .build_query_as::<ArticleRecord>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| translate_reference_error(e, template_ref, hot_topic_ref))?;
        if let Some(record) = updated {
            return Article::try_from(record).map(Some);
        }
        let Some(expected) = expected else {
            return Ok(None);
        };

        // Nothing matched: either the article is gone or its status moved on.
        let actual: Option<String> = sqlx::query_scalar("SELECT status FROM articles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match actual {
            Some(actual) => Err(StoreError::StatusConflict {
                entity: "article",
                id,
                actual,
                expected: expected.to_string(),
                attempted: attempted.unwrap_or(expected).to_string(),
            }),
            None => Ok(None),
        }
    }

    async fn delete_article(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- Templates ---

    async fn list_templates(
        &self,
        filter: &TemplateFilter,
    ) -> StoreResult<(Vec<Template>, i64)> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM templates");
        push_template_filters(&mut count_qb, filter);
        let total = self.count(count_qb).await?;

        let mut qb = QueryBuilder::new(format!("SELECT {TEMPLATE_COLUMNS} FROM templates"));
        push_template_filters(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.pagination.limit())
            .push(" OFFSET ")
            .push_bind(filter.pagination.offset());

        let rows: Vec<TemplateRecord> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok((rows.into_iter().map(Template::from).collect(), total))
    }

    async fn get_template(&self, id: Uuid) -> StoreResult<Option<Template>> {
        let sql = format!("SELECT {TEMPLATE_COLUMNS} FROM templates WHERE id = $1");
        Ok(sqlx::query_as::<_, TemplateRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Template::from))
    }

    async fn insert_template(&self, input: CreateTemplate) -> StoreResult<Template> {
        let sql = format!(
            "INSERT INTO templates (name, description, category, content) \
             VALUES ($1, $2, $3, $4) RETURNING {TEMPLATE_COLUMNS}"
        );
        let record = sqlx::query_as::<_, TemplateRecord>(&sql)
            .bind(&input.name)
            .bind(&input.description)
            .bind(&input.category)
            .bind(&input.content)
            .fetch_one(&self.pool)
            .await?;
        Ok(record.into())
    }

    async fn update_template(
        &self,
        id: Uuid,
        changes: UpdateTemplate,
    ) -> StoreResult<Option<Template>> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE templates SET updated_at = now()");
        if let Some(name) = changes.name {
            qb.push(", name = ").push_bind(name);
        }
        if let Some(description) = changes.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(category) = changes.category {
            qb.push(", category = ").push_bind(category);
        }
        if let Some(content) = changes.content {
            qb.push(", content = ").push_bind(content);
        }
        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING ")
            .push(TEMPLATE_COLUMNS);

        Ok(qb
            .build_query_as::<TemplateRecord>()
            .fetch_optional(&self.pool)
            .await?
            .map(Template::from))
    }

    async fn delete_template(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM templates WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn increment_template_usage(&self, id: Uuid) -> StoreResult<Option<Template>> {
        let sql = format!(
            "UPDATE templates SET usage_count = usage_count + 1, updated_at = now() \
             WHERE id = $1 RETURNING {TEMPLATE_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, TemplateRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Template::from))
    }

    // --- Hot topics ---

    async fn list_hot_topics(
        &self,
        filter: &HotTopicFilter,
    ) -> StoreResult<(Vec<HotTopic>, i64)> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM hot_topics");
        push_hot_topic_filters(&mut count_qb, filter);
        let total = self.count(count_qb).await?;

        let mut qb = QueryBuilder::new(format!("SELECT {HOT_TOPIC_COLUMNS} FROM hot_topics"));
        push_hot_topic_filters(&mut qb, filter);
        qb.push(" ORDER BY volume DESC, created_at DESC LIMIT ")
            .push_bind(filter.pagination.limit())
            .push(" OFFSET ")
            .push_bind(filter.pagination.offset());

        let rows: Vec<HotTopicRecord> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok((rows.into_iter().map(HotTopic::from).collect(), total))
    }

    async fn get_hot_topic(&self, id: Uuid) -> StoreResult<Option<HotTopic>> {
        let sql = format!("SELECT {HOT_TOPIC_COLUMNS} FROM hot_topics WHERE id = $1");
        Ok(sqlx::query_as::<_, HotTopicRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(HotTopic::from))
    }

    async fn insert_hot_topic(&self, input: CreateHotTopic) -> StoreResult<HotTopic> {
        let sql = format!(
            "INSERT INTO hot_topics (keyword, volume, source) VALUES ($1, $2, $3) \
             RETURNING {HOT_TOPIC_COLUMNS}"
        );
        let record = sqlx::query_as::<_, HotTopicRecord>(&sql)
            .bind(&input.keyword)
            .bind(input.volume)
            .bind(&input.source)
            .fetch_one(&self.pool)
            .await?;
        Ok(record.into())
    }

    async fn update_hot_topic(
        &self,
        id: Uuid,
        changes: UpdateHotTopic,
    ) -> StoreResult<Option<HotTopic>> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE hot_topics SET updated_at = now()");
        if let Some(keyword) = changes.keyword {
            qb.push(", keyword = ").push_bind(keyword);
        }
        if let Some(volume) = changes.volume {
            qb.push(", volume = ").push_bind(volume);
        }
        if let Some(source) = changes.source {
            qb.push(", source = ").push_bind(source);
        }
        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING ")
            .push(HOT_TOPIC_COLUMNS);

        Ok(qb
            .build_query_as::<HotTopicRecord>()
            .fetch_optional(&self.pool)
            .await?
            .map(HotTopic::from))
    }

    async fn delete_hot_topic(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM hot_topics WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn adjust_hot_topic_volume(
        &self,
        id: Uuid,
        delta: i64,
    ) -> StoreResult<Option<HotTopic>> {
        let sql = format!(
            "UPDATE hot_topics \
             SET volume = LEAST(GREATEST(volume::numeric + $1, 0), 9223372036854775807)::bigint, \
                 updated_at = now() \
             WHERE id = $2 RETURNING {HOT_TOPIC_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, HotTopicRecord>(&sql)
            .bind(delta)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(HotTopic::from))
    }

    // --- AI tasks ---

    async fn list_ai_tasks(&self, filter: &AiTaskFilter) -> StoreResult<(Vec<AiTask>, i64)> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM ai_tasks");
        push_ai_task_filters(&mut count_qb, filter);
        let total = self.count(count_qb).await?;

        let mut qb = QueryBuilder::new(format!("SELECT {AI_TASK_COLUMNS} FROM ai_tasks"));
        push_ai_task_filters(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.pagination.limit())
            .push(" OFFSET ")
            .push_bind(filter.pagination.offset());

        let rows: Vec<AiTaskRecord> = qb.build_query_as().fetch_all(&self.pool).await?;
        let tasks = rows
            .into_iter()
            .map(AiTask::try_from)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok((tasks, total))
    }

    async fn get_ai_task(&self, id: Uuid) -> StoreResult<Option<AiTask>> {
        let sql = format!("SELECT {AI_TASK_COLUMNS} FROM ai_tasks WHERE id = $1");
        sqlx::query_as::<_, AiTaskRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(AiTask::try_from)
            .transpose()
    }

    async fn insert_ai_task(&self, input: NewAiTask) -> StoreResult<AiTask> {
        let sql = format!(
            "INSERT INTO ai_tasks (name, type, status, input_data) VALUES ($1, $2, $3, $4) \
             RETURNING {AI_TASK_COLUMNS}"
        );
        sqlx::query_as::<_, AiTaskRecord>(&sql)
            .bind(&input.name)
            .bind(input.task_type.as_str())
            .bind(AiTaskStatus::Pending.as_str())
            .bind(&input.input_data)
            .fetch_one(&self.pool)
            .await?
            .try_into()
    }

    async fn transition_ai_task(
        &self,
        id: Uuid,
        from: AiTaskStatus,
        to: AiTaskStatus,
        result_data: Option<Value>,
    ) -> StoreResult<Option<AiTask>> {
        let sql = format!(
            r#"
            UPDATE ai_tasks
            SET status = $1,
                result_data = COALESCE($2, result_data),
                completed_at = CASE WHEN $3 THEN now() ELSE completed_at END
            WHERE id = $4 AND status = $5
            RETURNING {AI_TASK_COLUMNS}
            "#
        );
        let updated = sqlx::query_as::<_, AiTaskRecord>(&sql)
            .bind(to.as_str())
            .bind(result_data)
            .bind(to.is_terminal())
            .bind(id)
            .bind(from.as_str())
            .fetch_optional(&self.pool)
            .await?;

        if let Some(record) = updated {
            return AiTask::try_from(record).map(Some);
        }

        // Nothing matched: either the task is gone or it is in another status.
        let actual: Option<String> = sqlx::query_scalar("SELECT status FROM ai_tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match actual {
            Some(actual) => Err(StoreError::StatusConflict {
                entity: "ai task",
                id,
                actual,
                expected: from.to_string(),
                attempted: to.to_string(),
            }),
            None => Ok(None),
        }
    }

    async fn delete_ai_task(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM ai_tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- Images ---

    async fn record_image(&self, image: NewImage) -> StoreResult<ImageRecord> {
        self.ensure_images_table().await?;
        let sql = format!(
            "INSERT INTO images (path, url, content_type, size_bytes, original_name) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {IMAGE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ImageRow>(&sql)
            .bind(&image.path)
            .bind(&image.url)
            .bind(&image.content_type)
            .bind(image.size_bytes)
            .bind(&image.original_name)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }
}
