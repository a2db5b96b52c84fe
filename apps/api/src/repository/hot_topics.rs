use tracing::info;

use crate::db::Store;
use crate::models::hot_topic::{
    CreateHotTopic, HotTopic, HotTopicFilter, HotTopicQuery, UpdateHotTopic,
    TRENDING_VOLUME_THRESHOLD,
};
use crate::models::{Paginated, Pagination};
use crate::repository::{non_blank, parse_uuid, require_text, RepoError, RepoResult};

const ENTITY: &str = "hot topic";

/// Largest single adjustment accepted by `adjust_volume`, in either direction.
pub const MAX_VOLUME_DELTA: i64 = 1_000_000_000_000;

fn check_volume(volume: i64) -> RepoResult<i64> {
    if volume < 0 {
        return Err(RepoError::Validation(format!(
            "volume must not be negative, got {volume}"
        )));
    }
    Ok(volume)
}

pub fn filter_from_query(query: HotTopicQuery) -> HotTopicFilter {
    let mut filter = HotTopicFilter {
        min_volume: query.min_volume,
        below_volume: None,
        source: non_blank(query.source),
        keyword: non_blank(query.keyword),
        pagination: Pagination::new(query.page, query.page_size),
    };
    match query.trending {
        Some(true) => {
            filter.min_volume = Some(
                filter
                    .min_volume
                    .map_or(TRENDING_VOLUME_THRESHOLD, |m| m.max(TRENDING_VOLUME_THRESHOLD)),
            );
        }
        Some(false) => filter.below_volume = Some(TRENDING_VOLUME_THRESHOLD),
        None => {}
    }
    filter
}

pub async fn list(store: &dyn Store, query: HotTopicQuery) -> RepoResult<Paginated<HotTopic>> {
    let filter = filter_from_query(query);
    let (topics, total) = store.list_hot_topics(&filter).await?;
    Ok(Paginated::new(topics, total, filter.pagination))
}

pub async fn get(store: &dyn Store, id: &str) -> RepoResult<HotTopic> {
    let id = parse_uuid("id", id)?;
    store
        .get_hot_topic(id)
        .await?
        .ok_or(RepoError::NotFound { entity: ENTITY, id })
}

pub async fn create(store: &dyn Store, input: CreateHotTopic) -> RepoResult<HotTopic> {
    let input = CreateHotTopic {
        keyword: require_text("keyword", &input.keyword)?,
        volume: check_volume(input.volume)?,
        source: non_blank(input.source),
    };
    let topic = store.insert_hot_topic(input).await?;
    info!(hot_topic_id = %topic.id, keyword = %topic.keyword, "Hot topic created");
    Ok(topic)
}

pub async fn update(store: &dyn Store, id: &str, input: UpdateHotTopic) -> RepoResult<HotTopic> {
    let id = parse_uuid("id", id)?;
    let changes = UpdateHotTopic {
        keyword: input
            .keyword
            .as_deref()
            .map(|k| require_text("keyword", k))
            .transpose()?,
        volume: input.volume.map(check_volume).transpose()?,
        source: input.source,
    };
    store
        .update_hot_topic(id, changes)
        .await?
        .ok_or(RepoError::NotFound { entity: ENTITY, id })
}

pub async fn delete(store: &dyn Store, id: &str) -> RepoResult<()> {
    let id = parse_uuid("id", id)?;
    if !store.delete_hot_topic(id).await? {
        return Err(RepoError::NotFound { entity: ENTITY, id });
    }
    info!(hot_topic_id = %id, "Hot topic deleted");
    Ok(())
}

/// Adds `delta` to the search volume atomically; the result never drops below zero.
pub async fn adjust_volume(store: &dyn Store, id: &str, delta: i64) -> RepoResult<HotTopic> {
    let id = parse_uuid("id", id)?;
    if delta.unsigned_abs() > MAX_VOLUME_DELTA.unsigned_abs() {
        return Err(RepoError::Validation(format!(
            "increment must be within ±{MAX_VOLUME_DELTA}, got {delta}"
        )));
    }
    store
        .adjust_hot_topic_volume(id, delta)
        .await?
        .ok_or(RepoError::NotFound { entity: ENTITY, id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;

    async fn seed(store: &MemoryStore, keyword: &str, volume: i64) -> HotTopic {
        create(
            store,
            CreateHotTopic {
                keyword: keyword.into(),
                volume,
                source: Some("twitter".into()),
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_min_volume_filter() {
        let store = MemoryStore::new();
        seed(&store, "low", 5_000).await;
        seed(&store, "edge", 10_000).await;
        seed(&store, "high", 40_000).await;

        let page = list(
            &store,
            HotTopicQuery {
                min_volume: Some(10_000),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(page.total, 2);
        assert!(page.data.iter().all(|t| t.volume >= 10_000));
        // Highest volume first.
        assert_eq!(page.data[0].keyword, "high");
    }

    #[tokio::test]
    async fn test_trending_flag_uses_threshold() {
        let store = MemoryStore::new();
        seed(&store, "quiet", TRENDING_VOLUME_THRESHOLD - 1).await;
        seed(&store, "loud", TRENDING_VOLUME_THRESHOLD).await;

        let trending = list(
            &store,
            HotTopicQuery {
                trending: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(trending.total, 1);
        assert!(trending.data[0].is_trending());

        let quiet = list(
            &store,
            HotTopicQuery {
                trending: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(quiet.total, 1);
        assert!(!quiet.data[0].is_trending());
    }

    #[test]
    fn test_trending_keeps_stricter_min_volume() {
        let filter = filter_from_query(HotTopicQuery {
            min_volume: Some(50_000),
            trending: Some(true),
            ..Default::default()
        });
        assert_eq!(filter.min_volume, Some(50_000));
    }

    #[tokio::test]
    async fn test_negative_volume_rejected() {
        let store = MemoryStore::new();
        let err = create(
            &store,
            CreateHotTopic {
                keyword: "x".into(),
                volume: -1,
                source: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RepoError::Validation(_)));
    }

    #[tokio::test]
    async fn test_adjust_volume() {
        let store = MemoryStore::new();
        let topic = seed(&store, "ETF", 9_500).await;
        let topic = adjust_volume(&store, &topic.id.to_string(), 600).await.unwrap();
        assert_eq!(topic.volume, 10_100);
        assert!(topic.is_trending());

        let floored = adjust_volume(&store, &topic.id.to_string(), -MAX_VOLUME_DELTA)
            .await
            .unwrap();
        assert_eq!(floored.volume, 0);
    }

    #[tokio::test]
    async fn test_oversized_increment_is_rejected() {
        let store = MemoryStore::new();
        let topic = seed(&store, "ETF", 500).await;
        for delta in [i64::MAX, i64::MIN, MAX_VOLUME_DELTA + 1] {
            let err = adjust_volume(&store, &topic.id.to_string(), delta)
                .await
                .unwrap_err();
            assert!(matches!(err, RepoError::Validation(_)));
        }
        assert_eq!(get(&store, &topic.id.to_string()).await.unwrap().volume, 500);
    }
}
