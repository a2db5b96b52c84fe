use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tracing::{debug, error, info, warn};

use crate::db::memory::MemoryStore;
use crate::db::postgres::PgStore;
use crate::db::{DbConfig, DbHandle};

/// Consecutive construction failures after which the factory stops trying
/// until `reset_attempts` is called.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

const MAX_POOL_CONNECTIONS: u32 = 10;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);
/// Postgres truncates `application_name` beyond this many bytes.
const APPLICATION_NAME_MAX: usize = 63;

/// Builds database handles: a Postgres pool in real mode, or a handle over the
/// shared in-memory tables in mock mode.
pub struct ClientFactory {
    config: DbConfig,
    memory: MemoryStore,
    failed_attempts: AtomicU32,
}

impl ClientFactory {
    pub fn new(config: DbConfig) -> Self {
        let memory = if config.use_mock_mode {
            MemoryStore::with_fixtures()
        } else {
            MemoryStore::new()
        };
        Self::with_memory_store(config, memory)
    }

    /// Uses `memory` as the backing tables for mock handles.
    pub fn with_memory_store(config: DbConfig, memory: MemoryStore) -> Self {
        Self {
            config,
            memory,
            failed_attempts: AtomicU32::new(0),
        }
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts.load(Ordering::SeqCst)
    }

    pub fn reset_attempts(&self) {
        self.failed_attempts.store(0, Ordering::SeqCst);
    }

    /// Returns `None` when the attempt budget is exhausted or construction fails.
    pub async fn create(&self, request_id: &str) -> Option<DbHandle> {
        if self.config.use_mock_mode {
            debug!(request_id, "Using in-memory mock store");
            return Some(Arc::new(self.memory.clone()));
        }

        let failures = self.failed_attempts();
        if failures >= MAX_CONSECUTIVE_FAILURES {
            warn!(
                request_id,
                failures, "Database client construction disabled until attempts are reset"
            );
            return None;
        }

        match self.connect(request_id).await {
            Ok(store) => {
                self.reset_attempts();
                info!(request_id, "PostgreSQL connection pool established");
                Some(Arc::new(store))
            }
            Err(e) => {
                let failures = self.failed_attempts.fetch_add(1, Ordering::SeqCst) + 1;
                error!(
                    request_id,
                    attempt = failures,
                    max_attempts = MAX_CONSECUTIVE_FAILURES,
                    "Failed to create database client: {e}"
                );
                None
            }
        }
    }

    async fn connect(&self, request_id: &str) -> Result<PgStore, sqlx::Error> {
        let options = PgConnectOptions::from_str(&self.config.endpoint)?
            .application_name(&application_name(request_id));

        let pool = PgPoolOptions::new()
            .max_connections(MAX_POOL_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await?;

        Ok(PgStore::new(pool))
    }
}

/// Tags server-side sessions with the request that opened the pool.
fn application_name(request_id: &str) -> String {
    let mut name = format!("newsroom:{request_id}");
    if name.len() > APPLICATION_NAME_MAX {
        let mut cut = APPLICATION_NAME_MAX;
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        name.truncate(cut);
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broken_config() -> DbConfig {
        DbConfig {
            endpoint: "not a connection string".to_string(),
            anon_key: String::new(),
            service_key: None,
            use_mock_mode: false,
            debug_mode: false,
        }
    }

    #[tokio::test]
    async fn test_mock_handles_share_tables() {
        let factory = ClientFactory::with_memory_store(DbConfig::mock(), MemoryStore::new());
        let a = factory.create("req-a").await.unwrap();
        let b = factory.create("req-b").await.unwrap();
        assert_eq!(a.backend(), "memory");

        let template = a
            .insert_template(crate::models::template::CreateTemplate {
                name: "T".into(),
                content: "{x}".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(b.get_template(template.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failure_budget_stops_retrying() {
        let factory = ClientFactory::new(broken_config());
        for expected in 1..=MAX_CONSECUTIVE_FAILURES {
            assert!(factory.create("req").await.is_none());
            assert_eq!(factory.failed_attempts(), expected);
        }

        // Budget exhausted: the counter no longer moves because nothing is attempted.
        assert!(factory.create("req").await.is_none());
        assert_eq!(factory.failed_attempts(), MAX_CONSECUTIVE_FAILURES);

        factory.reset_attempts();
        assert!(factory.create("req").await.is_none());
        assert_eq!(factory.failed_attempts(), 1);
    }

    #[test]
    fn test_application_name_is_bounded() {
        assert_eq!(application_name("abc"), "newsroom:abc");
        let long = "é".repeat(100);
        let name = application_name(&long);
        assert!(name.len() <= APPLICATION_NAME_MAX);
        assert!(name.starts_with("newsroom:"));
    }
}
