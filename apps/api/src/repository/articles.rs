use chrono::Utc;
use tracing::info;

use crate::db::Store;
use crate::models::article::{
    Article, ArticleChanges, ArticleDraft, ArticleFilter, ArticleQuery, CreateArticle,
    UpdateArticle,
};
use crate::models::status::ArticleStatus;
use crate::models::{Paginated, Pagination};
use crate::repository::{
    non_blank, parse_date_bound, parse_link, parse_link_change, parse_uuid, require_text,
    RepoError, RepoResult,
};

const ENTITY: &str = "article";

pub fn parse_status(value: &str) -> RepoResult<ArticleStatus> {
    value.parse().map_err(|_| RepoError::InvalidStatus {
        entity: ENTITY,
        value: value.to_string(),
    })
}

pub fn filter_from_query(query: ArticleQuery) -> RepoResult<ArticleFilter> {
    let status = match non_blank(query.status) {
        None => None,
        Some(s) if s.eq_ignore_ascii_case("all") => None,
        Some(s) => Some(parse_status(&s)?),
    };
    let created_from = parse_date_bound("startDate", query.start_date, false)?;
    let created_until = parse_date_bound("endDate", query.end_date, true)?;
    if let (Some(from), Some(until)) = (created_from, created_until) {
        if from > until {
            return Err(RepoError::Validation(
                "startDate must not be after endDate".to_string(),
            ));
        }
    }
    Ok(ArticleFilter {
        status,
        category: non_blank(query.category),
        keyword: non_blank(query.keyword),
        created_from,
        created_until,
        pagination: Pagination::new(query.page, query.page_size),
    })
}

pub async fn list(store: &dyn Store, query: ArticleQuery) -> RepoResult<Paginated<Article>> {
    let filter = filter_from_query(query)?;
    let (articles, total) = store.list_articles(&filter).await?;
    Ok(Paginated::new(articles, total, filter.pagination))
}

pub async fn get(store: &dyn Store, id: &str) -> RepoResult<Article> {
    let id = parse_uuid("id", id)?;
    store
        .get_article(id)
        .await?
        .ok_or(RepoError::NotFound { entity: ENTITY, id })
}

/// Creates an article. Links to a template or hot topic that does not exist
/// fail with `MissingReference` and nothing is written.
pub async fn create(store: &dyn Store, input: CreateArticle) -> RepoResult<Article> {
    let title = require_text("title", &input.title)?;
    let status = match non_blank(input.status) {
        None => ArticleStatus::Draft,
        Some(s) => parse_status(&s)?,
    };
    if !status.is_initial() {
        return Err(RepoError::Validation(format!(
            "new articles must start as draft or pending, got {status}"
        )));
    }
    let template_id = parse_link("template_id", input.template_id.as_deref())?;
    let hot_topic_id = parse_link("hot_topic_id", input.hot_topic_id.as_deref())?;

    let article = store
        .insert_article(ArticleDraft {
            title,
            summary: input.summary,
            content: input.content.unwrap_or_default(),
            cover_image: input.cover_image,
            category: input.category,
            keywords: clean_keywords(input.keywords),
            status,
            template_id,
            hot_topic_id,
        })
        .await?;

    info!(article_id = %article.id, status = %article.status, "Article created");
    Ok(article)
}

pub async fn update(store: &dyn Store, id: &str, input: UpdateArticle) -> RepoResult<Article> {
    let id = parse_uuid("id", id)?;
    let title = input
        .title
        .as_deref()
        .map(|t| require_text("title", t))
        .transpose()?;
    let status = input.status.as_deref().map(parse_status).transpose()?;
    let template_id = parse_link_change("template_id", input.template_id.as_deref())?;
    let hot_topic_id = parse_link_change("hot_topic_id", input.hot_topic_id.as_deref())?;

    let mut published_at = None;
    let mut expected_status = None;
    if let Some(next) = status {
        let current = get_by_uuid(store, id).await?;
        if !current.status.can_transition_to(next) {
            return Err(RepoError::InvalidTransition {
                entity: ENTITY,
                from: current.status.to_string(),
                to: next.to_string(),
            });
        }
        if next == ArticleStatus::Published && current.status != ArticleStatus::Published {
            published_at = Some(Utc::now());
        }
        expected_status = Some(current.status);
    }

    let changes = ArticleChanges {
        expected_status,
        title,
        summary: input.summary,
        content: input.content,
        cover_image: input.cover_image,
        category: input.category,
        keywords: input.keywords.map(clean_keywords),
        status,
        published_at,
        template_id,
        hot_topic_id,
    };

    let article = store
        .update_article(id, changes)
        .await?
        .ok_or(RepoError::NotFound { entity: ENTITY, id })?;
    info!(article_id = %article.id, status = %article.status, "Article updated");
    Ok(article)
}

pub async fn delete(store: &dyn Store, id: &str) -> RepoResult<()> {
    let id = parse_uuid("id", id)?;
    if !store.delete_article(id).await? {
        return Err(RepoError::NotFound { entity: ENTITY, id });
    }
    info!(article_id = %id, "Article deleted");
    Ok(())
}

async fn get_by_uuid(store: &dyn Store, id: uuid::Uuid) -> RepoResult<Article> {
    store
        .get_article(id)
        .await?
        .ok_or(RepoError::NotFound { entity: ENTITY, id })
}

fn clean_keywords(keywords: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(keywords.len());
    for keyword in keywords {
        let keyword = keyword.trim();
        if !keyword.is_empty() && !out.iter().any(|k| k == keyword) {
            out.push(keyword.to_string());
        }
    }
    out
}
