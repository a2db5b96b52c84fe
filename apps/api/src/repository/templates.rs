use tracing::info;

use crate::db::Store;
use crate::models::template::{
    CreateTemplate, Template, TemplateFilter, TemplateQuery, UpdateTemplate,
};
use crate::models::{Paginated, Pagination};
use crate::repository::{non_blank, parse_uuid, require_text, RepoError, RepoResult};

const ENTITY: &str = "template";

pub async fn list(store: &dyn Store, query: TemplateQuery) -> RepoResult<Paginated<Template>> {
    let filter = TemplateFilter {
        category: non_blank(query.category),
        keyword: non_blank(query.keyword),
        pagination: Pagination::new(query.page, query.page_size),
    };
    let (templates, total) = store.list_templates(&filter).await?;
    Ok(Paginated::new(templates, total, filter.pagination))
}

pub async fn get(store: &dyn Store, id: &str) -> RepoResult<Template> {
    let id = parse_uuid("id", id)?;
    store
        .get_template(id)
        .await?
        .ok_or(RepoError::NotFound { entity: ENTITY, id })
}

pub async fn create(store: &dyn Store, input: CreateTemplate) -> RepoResult<Template> {
    let input = CreateTemplate {
        name: require_text("name", &input.name)?,
        content: require_text("content", &input.content)?,
        description: non_blank(input.description),
        category: non_blank(input.category),
    };
    let template = store.insert_template(input).await?;
    info!(template_id = %template.id, name = %template.name, "Template created");
    Ok(template)
}

pub async fn update(store: &dyn Store, id: &str, input: UpdateTemplate) -> RepoResult<Template> {
    let id = parse_uuid("id", id)?;
    let changes = UpdateTemplate {
        name: input
            .name
            .as_deref()
            .map(|n| require_text("name", n))
            .transpose()?,
        content: input
            .content
            .as_deref()
            .map(|c| require_text("content", c))
            .transpose()?,
        description: input.description,
        category: input.category,
    };
    store
        .update_template(id, changes)
        .await?
        .ok_or(RepoError::NotFound { entity: ENTITY, id })
}

pub async fn delete(store: &dyn Store, id: &str) -> RepoResult<()> {
    let id = parse_uuid("id", id)?;
    if !store.delete_template(id).await? {
        return Err(RepoError::NotFound { entity: ENTITY, id });
    }
    info!(template_id = %id, "Template deleted");
    Ok(())
}

/// Bumps `usage_count` by one in a single atomic write.
pub async fn increment_usage(store: &dyn Store, id: &str) -> RepoResult<Template> {
    let id = parse_uuid("id", id)?;
    store
        .increment_template_usage(id)
        .await?
        .ok_or(RepoError::NotFound { entity: ENTITY, id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;

    fn new_template(name: &str, content: &str) -> CreateTemplate {
        CreateTemplate {
            name: name.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_starts_at_zero_usage() {
        let store = MemoryStore::new();
        let template = create(&store, new_template("T1", "hello {x}")).await.unwrap();
        assert_eq!(template.usage_count, 0);
        assert_eq!(template.variables(), vec!["x"]);
    }

    #[tokio::test]
    async fn test_sequential_increments_add_exactly_n() {
        let store = MemoryStore::new();
        let template = create(&store, new_template("T1", "hello {x}")).await.unwrap();
        let id = template.id.to_string();
        for _ in 0..7 {
            increment_usage(&store, &id).await.unwrap();
        }
        assert_eq!(get(&store, &id).await.unwrap().usage_count, 7);
    }

    #[tokio::test]
    async fn test_concurrent_increments_do_not_lose_updates() {
        let store = MemoryStore::new();
        let template = create(&store, new_template("T1", "x")).await.unwrap();
        let id = template.id.to_string();

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let store = store.clone();
                let id = id.clone();
                tokio::spawn(async move { increment_usage(&store, &id).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(get(&store, &id).await.unwrap().usage_count, 20);
    }

    #[tokio::test]
    async fn test_validation_and_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            create(&store, new_template("", "x")).await.unwrap_err(),
            RepoError::Validation(_)
        ));
        assert!(matches!(
            create(&store, new_template("T", "  ")).await.unwrap_err(),
            RepoError::Validation(_)
        ));
        assert!(matches!(
            increment_usage(&store, "nope").await.unwrap_err(),
            RepoError::InvalidUuid { .. }
        ));
        let missing = uuid::Uuid::new_v4().to_string();
        assert!(matches!(
            increment_usage(&store, &missing).await.unwrap_err(),
            RepoError::NotFound { entity: "template", .. }
        ));
    }

    #[tokio::test]
    async fn test_update_and_filter() {
        let store = MemoryStore::new();
        let a = create(&store, new_template("Market brief", "{coin}")).await.unwrap();
        create(&store, new_template("Spotlight", "{project}")).await.unwrap();

        let updated = update(
            &store,
            &a.id.to_string(),
            UpdateTemplate {
                category: Some("market".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.category.as_deref(), Some("market"));
        assert_eq!(updated.name, "Market brief");

        let page = list(
            &store,
            TemplateQuery {
                keyword: Some("brief".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].id, a.id);
    }
}
