//! JSON fetcher with a short-lived response cache.
//!
//! Idempotent requests go through `send_json`, which retries transport errors,
//! 429 and 5xx responses with capped exponential backoff. Writes go through
//! `send_once`. Successful GET responses are memoized per URL and credential
//! for `ttl`.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

pub const MAX_ATTEMPTS: u32 = 3;
pub const BASE_BACKOFF: Duration = Duration::from_millis(500);
pub const MAX_BACKOFF: Duration = Duration::from_secs(5);
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Delay before retry number `attempt` (1-based).
pub fn backoff_delay(attempt: u32) -> Duration {
    let factor = 1u32 << attempt.saturating_sub(1).min(16);
    (BASE_BACKOFF * factor).min(MAX_BACKOFF)
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Credential plus URL, so callers with different tokens never share entries.
type CacheKey = (Option<String>, String);

struct CacheEntry {
    value: Value,
    stored_at: Instant,
}

pub struct CachedFetcher {
    client: Client,
    ttl: Duration,
    cache: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl CachedFetcher {
    pub fn new(client: Client, ttl: Duration) -> Self {
        Self {
            client,
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// GET a JSON document, serving a cached copy while it is fresh.
    pub async fn get_json(&self, url: &str, bearer: Option<&str>) -> Result<Value, FetchError> {
        let key: CacheKey = (bearer.map(str::to_string), url.to_string());
        if let Some(hit) = self.cached(&key).await {
            debug!(url, "fetch cache hit");
            return Ok(hit);
        }

        let value = self
            .send_json(|| with_auth(self.client.request(Method::GET, url), bearer))
            .await?;
        self.remember(key, value.clone()).await;
        Ok(value)
    }

    /// Sends the request exactly once, with the client's own timeout. For
    /// calls that must not be repeated, such as starting a workflow run.
    pub async fn send_once(&self, request: RequestBuilder) -> Result<Value, FetchError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }
        read_json(response).await
    }

    /// Sends the request built by `build` with retries; never cached. Only for
    /// idempotent requests.
    pub async fn send_json<F>(&self, build: F) -> Result<Value, FetchError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut last_error: Option<FetchError> = None;

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                let delay = backoff_delay(attempt);
                warn!(
                    "fetch attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match build().timeout(REQUEST_TIMEOUT).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(FetchError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if is_retryable(status) {
                let body = response.text().await.unwrap_or_default();
                last_error = Some(FetchError::Status {
                    status: status.as_u16(),
                    body,
                });
                continue;
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(FetchError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            return read_json(response).await;
        }

        Err(last_error.unwrap_or(FetchError::Status {
            status: 0,
            body: "no attempt was made".to_string(),
        }))
    }

    async fn cached(&self, key: &CacheKey) -> Option<Value> {
        let mut cache = self.cache.lock().await;
        match cache.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                cache.remove(key);
                None
            }
            None => None,
        }
    }

    /// Stores a response and drops every entry that has outlived the TTL.
    async fn remember(&self, key: CacheKey, value: Value) {
        let mut cache = self.cache.lock().await;
        let ttl = self.ttl;
        let before = cache.len();
        cache.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        let evicted = before - cache.len();
        if evicted > 0 {
            debug!(evicted, "Evicted stale fetch cache entries");
        }
        cache.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value, FetchError> {
    let text = response.text().await?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

pub(crate) fn with_auth(builder: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
    match bearer {
        Some(token) => builder.bearer_auth(token),
        None => builder,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(backoff_delay(1), Duration::from_millis(500));
        assert_eq!(backoff_delay(2), Duration::from_millis(1000));
        assert_eq!(backoff_delay(3), Duration::from_millis(2000));
        assert_eq!(backoff_delay(10), MAX_BACKOFF);
        assert_eq!(backoff_delay(40), MAX_BACKOFF);
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(StatusCode::NOT_FOUND));
    }

    fn key(bearer: Option<&str>, url: &str) -> CacheKey {
        (bearer.map(str::to_string), url.to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_entries_expire_after_ttl() {
        let fetcher = CachedFetcher::new(Client::new(), Duration::from_secs(30));
        let url = "http://dify.invalid/parameters";
        fetcher.remember(key(None, url), json!({"ok": true})).await;

        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(fetcher.get_json(url, None).await.unwrap(), json!({"ok": true}));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(fetcher.cached(&key(None, url)).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_sweeps_stale_entries_for_other_urls() {
        let fetcher = CachedFetcher::new(Client::new(), Duration::from_secs(30));
        for page in 0..5 {
            let url = format!("http://dify.invalid/workflows/logs?page={page}");
            fetcher.remember(key(Some("k"), &url), json!(page)).await;
        }
        assert_eq!(fetcher.cache.lock().await.len(), 5);

        tokio::time::advance(Duration::from_secs(31)).await;
        fetcher
            .remember(key(Some("k"), "http://dify.invalid/parameters"), json!({}))
            .await;

        let cache = fetcher.cache.lock().await;
        assert_eq!(cache.len(), 1);
        assert!(cache.contains_key(&key(Some("k"), "http://dify.invalid/parameters")));
    }

    #[tokio::test]
    async fn test_cache_is_scoped_by_credential() {
        let fetcher = CachedFetcher::new(Client::new(), DEFAULT_TTL);
        let url = "http://dify.invalid/parameters";
        fetcher.remember(key(Some("app-a"), url), json!("a")).await;

        assert_eq!(fetcher.cached(&key(Some("app-a"), url)).await, Some(json!("a")));
        assert!(fetcher.cached(&key(Some("app-b"), url)).await.is_none());
        assert!(fetcher.cached(&key(None, url)).await.is_none());
    }
}
