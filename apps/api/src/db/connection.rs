//! Request-scoped handle cache with a process-wide singleton.
//!
//! The first handle the factory produces is promoted to the singleton and
//! returned for every later request, whatever its id. Before that, handles are
//! cached per request id. Entries idle past `IDLE_TIMEOUT` are dropped, and an
//! insert that finds the last sweep older than the timeout clears the whole map
//! down to the singleton.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::db::{ClientFactory, DbHandle};

pub const IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

const SINGLETON_KEY: &str = "__singleton__";

struct CachedHandle {
    handle: DbHandle,
    last_used: Instant,
}

struct CacheState {
    singleton: Option<DbHandle>,
    by_request: HashMap<String, CachedHandle>,
    last_sweep: Instant,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStats {
    pub backend: Option<&'static str>,
    pub mock_mode: bool,
    pub singleton_established: bool,
    pub cached_entries: usize,
    pub failed_attempts: u32,
}

pub struct ConnectionManager {
    factory: ClientFactory,
    idle_timeout: Duration,
    state: Mutex<CacheState>,
}

impl ConnectionManager {
    pub fn new(factory: ClientFactory) -> Self {
        Self::with_idle_timeout(factory, IDLE_TIMEOUT)
    }

    pub fn with_idle_timeout(factory: ClientFactory, idle_timeout: Duration) -> Self {
        Self {
            factory,
            idle_timeout,
            state: Mutex::new(CacheState {
                singleton: None,
                by_request: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    /// Resolves a handle for `request_id`. `None` means the database is
    /// unavailable for this call.
    ///
    /// The state lock is held while the factory runs, so concurrent first
    /// requests build at most one pool.
    pub async fn acquire(&self, request_id: &str) -> Option<DbHandle> {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        if let Some(singleton) = state.singleton.clone() {
            self.log_hit(request_id, "singleton");
            self.insert(&mut state, request_id, singleton.clone(), now);
            return Some(singleton);
        }

        if let Some(entry) = state.by_request.get_mut(request_id) {
            if now.duration_since(entry.last_used) <= self.idle_timeout {
                entry.last_used = now;
                self.log_hit(request_id, "request cache");
                return Some(entry.handle.clone());
            }
            state.by_request.remove(request_id);
        }

        let handle = self.factory.create(request_id).await?;
        info!(
            request_id,
            backend = handle.backend(),
            "Database client promoted to process-wide singleton"
        );
        state.singleton = Some(handle.clone());
        self.insert(&mut state, request_id, handle.clone(), now);
        Some(handle)
    }

    /// Drops the singleton and cached handles and re-arms the factory.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.singleton = None;
        state.by_request.clear();
        state.last_sweep = Instant::now();
        self.factory.reset_attempts();
        info!("Connection cache reset");
    }

    pub async fn stats(&self) -> ConnectionStats {
        let state = self.state.lock().await;
        ConnectionStats {
            backend: state.singleton.as_ref().map(|h| h.backend()),
            mock_mode: self.factory.config().use_mock_mode,
            singleton_established: state.singleton.is_some(),
            cached_entries: state.by_request.len(),
            failed_attempts: self.factory.failed_attempts(),
        }
    }

    fn insert(&self, state: &mut CacheState, request_id: &str, handle: DbHandle, now: Instant) {
        if now.duration_since(state.last_sweep) > self.idle_timeout {
            let evicted = state.by_request.len();
            state.by_request.clear();
            if let Some(singleton) = &state.singleton {
                state.by_request.insert(
                    SINGLETON_KEY.to_string(),
                    CachedHandle {
                        handle: singleton.clone(),
                        last_used: now,
                    },
                );
            }
            state.last_sweep = now;
            debug!(evicted, "Swept idle connection cache");
        }

        // Entries idle past the timeout go, unless they hold the singleton.
        let idle_timeout = self.idle_timeout;
        let singleton = state.singleton.clone();
        state.by_request.retain(|_, entry| {
            now.duration_since(entry.last_used) <= idle_timeout
                || singleton
                    .as_ref()
                    .is_some_and(|s| Arc::ptr_eq(s, &entry.handle))
        });

        state.by_request.insert(
            request_id.to_string(),
            CachedHandle {
                handle,
                last_used: now,
            },
        );
    }

    fn log_hit(&self, request_id: &str, source: &str) {
        if self.factory.config().debug_mode {
            info!(request_id, source, "Reusing database client");
        } else {
            debug!(request_id, source, "Reusing database client");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::db::DbConfig;

    fn mock_manager() -> ConnectionManager {
        ConnectionManager::new(ClientFactory::with_memory_store(
            DbConfig::mock(),
            MemoryStore::new(),
        ))
    }

    #[tokio::test]
    async fn test_singleton_is_shared_across_request_ids() {
        let manager = mock_manager();
        let a = manager.acquire("req-a").await.unwrap();
        let b = manager.acquire("req-b").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let stats = manager.stats().await;
        assert!(stats.singleton_established);
        assert_eq!(stats.backend, Some("memory"));
        assert!(stats.mock_mode);
    }

    #[tokio::test]
    async fn test_unavailable_database_yields_none() {
        let config = DbConfig {
            endpoint: "definitely not a url".into(),
            use_mock_mode: false,
            ..DbConfig::mock()
        };
        let manager = ConnectionManager::new(ClientFactory::new(config));
        assert!(manager.acquire("req").await.is_none());

        let stats = manager.stats().await;
        assert!(!stats.singleton_established);
        assert_eq!(stats.failed_attempts, 1);
        assert_eq!(stats.cached_entries, 0);
    }

    #[tokio::test]
    async fn test_reset_forgets_singleton() {
        let manager = mock_manager();
        let first = manager.acquire("req-a").await.unwrap();
        manager.reset().await;
        assert!(!manager.stats().await.singleton_established);

        let second = manager.acquire("req-b").await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_clears_cache_down_to_singleton() {
        let manager = mock_manager();
        let singleton = manager.acquire("req-a").await.unwrap();
        manager.acquire("req-b").await.unwrap();
        manager.acquire("req-c").await.unwrap();
        assert_eq!(manager.stats().await.cached_entries, 3);

        tokio::time::advance(IDLE_TIMEOUT + Duration::from_secs(1)).await;

        let after = manager.acquire("req-d").await.unwrap();
        assert!(Arc::ptr_eq(&singleton, &after));
        // The singleton seed plus the request that triggered the sweep.
        assert_eq!(manager.stats().await.cached_entries, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_sweep_within_idle_timeout() {
        let manager = mock_manager();
        manager.acquire("req-a").await.unwrap();
        tokio::time::advance(IDLE_TIMEOUT / 2).await;
        manager.acquire("req-b").await.unwrap();
        assert_eq!(manager.stats().await.cached_entries, 2);
    }
}
