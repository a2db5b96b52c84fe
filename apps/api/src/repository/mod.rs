//! Entity operations on top of a `Store` handle.
//!
//! Everything a caller can get wrong (id format, required fields, status
//! vocabulary, date bounds) is rejected here before the store is touched.

pub mod ai_tasks;
pub mod articles;
pub mod hot_topics;
pub mod templates;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::db::StoreError;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Invalid UUID format for {field}: '{value}'")]
    InvalidUuid { field: &'static str, value: String },

    #[error("{0}")]
    Validation(String),

    #[error("Invalid {entity} status '{value}'")]
    InvalidStatus { entity: &'static str, value: String },

    #[error("Cannot move {entity} from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Referenced {field} {id} does not exist")]
    MissingReference { field: &'static str, id: Uuid },

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for RepoError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MissingReference { field, id } => RepoError::MissingReference { field, id },
            StoreError::StatusConflict {
                entity,
                actual,
                attempted,
                ..
            } => RepoError::InvalidTransition {
                entity,
                from: actual,
                to: attempted,
            },
            other => RepoError::Store(other),
        }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Accepts only the canonical hyphenated form (8-4-4-4-12 hex digits).
pub fn parse_uuid(field: &'static str, value: &str) -> RepoResult<Uuid> {
    let candidate = value.trim();
    let well_formed = candidate.len() == 36
        && candidate.bytes().enumerate().all(|(i, b)| match i {
            8 | 13 | 18 | 23 => b == b'-',
            _ => b.is_ascii_hexdigit(),
        });
    if !well_formed {
        return Err(RepoError::InvalidUuid {
            field,
            value: value.to_string(),
        });
    }
    Uuid::parse_str(candidate).map_err(|_| RepoError::InvalidUuid {
        field,
        value: value.to_string(),
    })
}

/// Optional link on create: absent or blank means no link.
pub(crate) fn parse_link(field: &'static str, value: Option<&str>) -> RepoResult<Option<Uuid>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => parse_uuid(field, v).map(Some),
    }
}

/// Optional link on update: absent leaves it alone, blank clears it.
pub(crate) fn parse_link_change(
    field: &'static str,
    value: Option<&str>,
) -> RepoResult<Option<Option<Uuid>>> {
    match value.map(str::trim) {
        None => Ok(None),
        Some("") => Ok(Some(None)),
        Some(v) => parse_uuid(field, v).map(|id| Some(Some(id))),
    }
}

pub(crate) fn require_text(field: &str, value: &str) -> RepoResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RepoError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Blank query values mean "no filter".
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parses a date filter bound. Accepts RFC 3339 or `YYYY-MM-DD`; a bare end
/// date covers the whole day.
pub(crate) fn parse_date_bound(
    field: &str,
    value: Option<String>,
    end_of_day: bool,
) -> RepoResult<Option<DateTime<Utc>>> {
    let Some(value) = non_blank(value) else {
        return Ok(None);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(&value) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    let date = NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|_| {
        RepoError::Validation(format!(
            "{field} must be an RFC 3339 timestamp or YYYY-MM-DD, got '{value}'"
        ))
    })?;
    let time = if end_of_day {
        NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .unwrap_or_default();
    Ok(Some(Utc.from_utc_datetime(&date.and_time(time))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::counting::CountingStore;
    use crate::models::article::{CreateArticle, UpdateArticle};

    #[test]
    fn test_parse_uuid_accepts_hyphenated_form() {
        let id = Uuid::new_v4();
        assert_eq!(parse_uuid("id", &id.to_string()).unwrap(), id);
        assert_eq!(
            parse_uuid("id", &id.to_string().to_uppercase()).unwrap(),
            id
        );
    }

    #[test]
    fn test_parse_uuid_rejects_other_forms() {
        let simple = Uuid::new_v4().simple().to_string();
        for bad in ["123", "", "not-a-uuid", simple.as_str(), "{00000000-0000-0000-0000-000000000000}"] {
            let err = parse_uuid("hot_topic_id", bad).unwrap_err();
            assert!(matches!(err, RepoError::InvalidUuid { field: "hot_topic_id", .. }));
        }
        assert!(parse_uuid("id", "zzzzzzzz-zzzz-zzzz-zzzz-zzzzzzzzzzzz").is_err());
    }

    #[tokio::test]
    async fn test_malformed_ids_never_reach_the_store() {
        let store = CountingStore::default();

        assert!(articles::get(&store, "123").await.is_err());
        assert!(articles::delete(&store, "abc").await.is_err());
        assert!(articles::update(
            &store,
            "123",
            UpdateArticle {
                status: Some("pending".into()),
                ..Default::default()
            }
        )
        .await
        .is_err());
        assert!(articles::update(
            &store,
            &Uuid::new_v4().to_string(),
            UpdateArticle {
                status: Some("pending".into()),
                hot_topic_id: Some("123".into()),
                ..Default::default()
            }
        )
        .await
        .is_err());
        assert!(articles::create(
            &store,
            CreateArticle {
                title: "Linked".into(),
                template_id: Some("not-a-uuid".into()),
                ..Default::default()
            }
        )
        .await
        .is_err());
        assert!(templates::get(&store, "1").await.is_err());
        assert!(templates::delete(&store, "1").await.is_err());
        assert!(templates::increment_usage(&store, "1").await.is_err());
        assert!(hot_topics::get(&store, "x").await.is_err());
        assert!(hot_topics::delete(&store, "x").await.is_err());
        assert!(hot_topics::adjust_volume(&store, "x", 10).await.is_err());
        assert!(ai_tasks::get(&store, "x").await.is_err());
        assert!(ai_tasks::delete(&store, "x").await.is_err());
        assert_eq!(store.calls(), 0);

        let err = articles::get(&store, &Uuid::new_v4().to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::NotFound { .. }));
        assert_eq!(store.calls(), 1);
    }

    #[test]
    fn test_link_parsing() {
        let id = Uuid::new_v4().to_string();
        assert_eq!(parse_link("template_id", None).unwrap(), None);
        assert_eq!(parse_link("template_id", Some("  ")).unwrap(), None);
        assert!(parse_link("template_id", Some(&id)).unwrap().is_some());

        assert_eq!(parse_link_change("template_id", None).unwrap(), None);
        assert_eq!(parse_link_change("template_id", Some("")).unwrap(), Some(None));
        assert!(parse_link_change("template_id", Some("123")).is_err());
    }

    #[test]
    fn test_date_bounds() {
        let start = parse_date_bound("startDate", Some("2024-05-01".into()), false)
            .unwrap()
            .unwrap();
        assert_eq!(start.to_rfc3339(), "2024-05-01T00:00:00+00:00");

        let end = parse_date_bound("endDate", Some("2024-05-01".into()), true)
            .unwrap()
            .unwrap();
        assert!(end > start);
        assert_eq!(end.date_naive(), start.date_naive());

        let ts = parse_date_bound("startDate", Some("2024-05-01T12:00:00+02:00".into()), false)
            .unwrap()
            .unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-05-01T10:00:00+00:00");

        assert!(parse_date_bound("startDate", Some("yesterday".into()), false).is_err());
        assert_eq!(parse_date_bound("startDate", Some(" ".into()), false).unwrap(), None);
    }
}
