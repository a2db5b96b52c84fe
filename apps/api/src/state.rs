use std::sync::Arc;

use crate::config::Config;
use crate::db::ConnectionManager;
use crate::dify::DifyClient;
use crate::llm_client::LlmClient;
use crate::storage::ImageStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Hands out database handles; owns the singleton and per-request cache.
    pub db: Arc<ConnectionManager>,
    pub storage: Arc<dyn ImageStore>,
    pub llm: LlmClient,
    pub dify: DifyClient,
    pub config: Arc<Config>,
}

#[cfg(test)]
impl AppState {
    /// Mock database seeded with fixtures, in-memory storage, no providers.
    pub fn for_tests() -> Self {
        use crate::db::ClientFactory;
        use crate::storage::MemoryImageStore;

        let config = Config::for_tests();
        Self {
            db: Arc::new(ConnectionManager::new(ClientFactory::new(config.db.clone()))),
            storage: Arc::new(MemoryImageStore::new(config.storage.clone())),
            llm: LlmClient::new(&config.llm).expect("http client"),
            dify: DifyClient::new(config.dify.clone()).expect("http client"),
            config: Arc::new(config),
        }
    }
}
