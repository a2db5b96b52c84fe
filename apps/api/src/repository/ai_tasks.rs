use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::Store;
use crate::models::ai_task::{AiTask, AiTaskFilter, AiTaskQuery, NewAiTask};
use crate::models::status::{AiTaskStatus, AiTaskType};
use crate::models::{Paginated, Pagination};
use crate::repository::{non_blank, parse_uuid, require_text, RepoError, RepoResult};

const ENTITY: &str = "ai task";

pub fn parse_type(value: &str) -> RepoResult<AiTaskType> {
    value.parse().map_err(|_| {
        RepoError::Validation(format!(
            "unknown task type '{value}', expected one of cover, title, content, summary"
        ))
    })
}

pub async fn list(store: &dyn Store, query: AiTaskQuery) -> RepoResult<Paginated<AiTask>> {
    let status = match non_blank(query.status) {
        None => None,
        Some(s) => Some(s.parse::<AiTaskStatus>().map_err(|_| RepoError::InvalidStatus {
            entity: ENTITY,
            value: s.clone(),
        })?),
    };
    let task_type = non_blank(query.task_type)
        .map(|t| parse_type(&t))
        .transpose()?;
    let filter = AiTaskFilter {
        status,
        task_type,
        pagination: Pagination::new(query.page, query.page_size),
    };
    let (tasks, total) = store.list_ai_tasks(&filter).await?;
    Ok(Paginated::new(tasks, total, filter.pagination))
}

pub async fn get(store: &dyn Store, id: &str) -> RepoResult<AiTask> {
    let id = parse_uuid("id", id)?;
    store
        .get_ai_task(id)
        .await?
        .ok_or(RepoError::NotFound { entity: ENTITY, id })
}

pub async fn create(
    store: &dyn Store,
    name: &str,
    task_type: AiTaskType,
    input_data: Value,
) -> RepoResult<AiTask> {
    let task = store
        .insert_ai_task(NewAiTask {
            name: require_text("name", name)?,
            task_type,
            input_data,
        })
        .await?;
    info!(task_id = %task.id, task_type = %task.task_type, "AI task queued");
    Ok(task)
}

async fn transition(
    store: &dyn Store,
    id: Uuid,
    from: AiTaskStatus,
    to: AiTaskStatus,
    result_data: Option<Value>,
) -> RepoResult<AiTask> {
    store
        .transition_ai_task(id, from, to, result_data)
        .await?
        .ok_or(RepoError::NotFound { entity: ENTITY, id })
}

/// pending → processing
pub async fn start(store: &dyn Store, id: Uuid) -> RepoResult<AiTask> {
    transition(store, id, AiTaskStatus::Pending, AiTaskStatus::Processing, None).await
}

/// processing → completed
pub async fn complete(store: &dyn Store, id: Uuid, result: Value) -> RepoResult<AiTask> {
    let task = transition(
        store,
        id,
        AiTaskStatus::Processing,
        AiTaskStatus::Completed,
        Some(result),
    )
    .await?;
    info!(task_id = %id, "AI task completed");
    Ok(task)
}

/// processing → failed, recording the error message as the result.
pub async fn fail(store: &dyn Store, id: Uuid, message: &str) -> RepoResult<AiTask> {
    let task = transition(
        store,
        id,
        AiTaskStatus::Processing,
        AiTaskStatus::Failed,
        Some(json!({ "error": message })),
    )
    .await?;
    warn!(task_id = %id, "AI task failed: {message}");
    Ok(task)
}

pub async fn delete(store: &dyn Store, id: &str) -> RepoResult<()> {
    let id = parse_uuid("id", id)?;
    if !store.delete_ai_task(id).await? {
        return Err(RepoError::NotFound { entity: ENTITY, id });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;

    #[tokio::test]
    async fn test_lifecycle_to_completed() {
        let store = MemoryStore::new();
        let task = create(&store, "Titles", AiTaskType::Title, json!({"keyword": "BTC"}))
            .await
            .unwrap();
        assert_eq!(task.status, AiTaskStatus::Pending);

        let task = start(&store, task.id).await.unwrap();
        assert_eq!(task.status, AiTaskStatus::Processing);
        assert!(task.completed_at.is_none());

        let task = complete(&store, task.id, json!({"text": "BTC to the moon"}))
            .await
            .unwrap();
        assert_eq!(task.status, AiTaskStatus::Completed);
        assert!(task.completed_at.is_some());
        assert_eq!(task.result_data, Some(json!({"text": "BTC to the moon"})));
    }

    #[tokio::test]
    async fn test_out_of_order_transitions_are_rejected() {
        let store = MemoryStore::new();
        let task = create(&store, "Summary", AiTaskType::Summary, json!({}))
            .await
            .unwrap();

        let err = complete(&store, task.id, json!({})).await.unwrap_err();
        match err {
            RepoError::InvalidTransition { from, to, .. } => {
                assert_eq!(from, "pending");
                assert_eq!(to, "completed");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        start(&store, task.id).await.unwrap();
        assert!(matches!(
            start(&store, task.id).await.unwrap_err(),
            RepoError::InvalidTransition { .. }
        ));

        let failed = fail(&store, task.id, "provider timeout").await.unwrap();
        assert_eq!(failed.status, AiTaskStatus::Failed);
        assert_eq!(failed.result_data, Some(json!({"error": "provider timeout"})));
    }

    #[tokio::test]
    async fn test_missing_task_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            start(&store, Uuid::new_v4()).await.unwrap_err(),
            RepoError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_list_filters_by_status_and_type() {
        let store = MemoryStore::new();
        let a = create(&store, "a", AiTaskType::Cover, json!({})).await.unwrap();
        create(&store, "b", AiTaskType::Title, json!({})).await.unwrap();
        start(&store, a.id).await.unwrap();

        let processing = list(
            &store,
            AiTaskQuery {
                status: Some("processing".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(processing.total, 1);
        assert_eq!(processing.data[0].id, a.id);

        let titles = list(
            &store,
            AiTaskQuery {
                task_type: Some("title".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(titles.total, 1);

        assert!(list(
            &store,
            AiTaskQuery {
                task_type: Some("video".into()),
                ..Default::default()
            },
        )
        .await
        .is_err());
    }
}
