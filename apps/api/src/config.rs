use anyhow::{Context, Result};

use crate::db::DbConfig;

pub const DEFAULT_BUCKET: &str = "article-images";
pub const DEFAULT_DIFY_ENDPOINT: &str = "https://api.dify.ai/v1";
const DEFAULT_DIFY_USER: &str = "newsroom-admin";

/// Application configuration loaded from environment variables.
/// Only `PORT` can fail to parse; every integration is optional and falls
/// back to an in-process or disabled mode when unconfigured.
#[derive(Debug, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub storage: StorageConfig,
    pub dify: DifyConfig,
    pub llm: LlmConfig,
    pub port: u16,
    pub rust_log: String,
}

#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    /// Supabase project URL, used to build public object URLs.
    pub project_url: Option<String>,
    pub bucket: String,
    pub s3_endpoint: Option<String>,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl StorageConfig {
    /// S3 is used only when an endpoint and a key pair are all present.
    pub fn s3_enabled(&self) -> bool {
        self.s3_endpoint.is_some() && self.access_key_id.is_some() && self.secret_access_key.is_some()
    }

    pub fn public_url(&self, path: &str) -> String {
        match (&self.project_url, &self.s3_endpoint) {
            (Some(project), _) => format!(
                "{}/storage/v1/object/public/{}/{}",
                project.trim_end_matches('/'),
                self.bucket,
                path
            ),
            (None, Some(endpoint)) => {
                format!("{}/{}/{}", endpoint.trim_end_matches('/'), self.bucket, path)
            }
            (None, None) => format!("/{}/{}", self.bucket, path),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DifyConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub app_id: Option<String>,
    pub workflow_id: Option<String>,
    pub user_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    /// Overrides the provider's default model.
    pub model: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::resolve(|key| std::env::var(key).ok())
    }

    pub fn resolve<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let project_url = get("SUPABASE_URL").or_else(|| get("NEXT_PUBLIC_SUPABASE_URL"));
        let s3_endpoint = get("S3_ENDPOINT").or_else(|| {
            project_url
                .as_ref()
                .map(|url| format!("{}/storage/v1/s3", url.trim_end_matches('/')))
        });

        let port = match get("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            None => 8080,
        };

        Ok(Config {
            db: DbConfig::resolve(&lookup),
            storage: StorageConfig {
                project_url,
                bucket: get("STORAGE_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
                s3_endpoint,
                region: get("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                access_key_id: get("AWS_ACCESS_KEY_ID"),
                secret_access_key: get("AWS_SECRET_ACCESS_KEY"),
            },
            dify: DifyConfig {
                endpoint: get("DIFY_API_ENDPOINT")
                    .unwrap_or_else(|| DEFAULT_DIFY_ENDPOINT.to_string()),
                api_key: get("DIFY_API_KEY"),
                app_id: get("DIFY_APP_ID"),
                workflow_id: get("DIFY_WORKFLOW_ID"),
                user_id: get("DIFY_USER_ID").unwrap_or_else(|| DEFAULT_DIFY_USER.to_string()),
            },
            llm: LlmConfig {
                openai_api_key: get("OPENAI_API_KEY"),
                anthropic_api_key: get("ANTHROPIC_API_KEY"),
                model: get("LLM_MODEL"),
            },
            port,
            rust_log: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Fully offline configuration: mock database, in-memory storage, no providers.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            db: DbConfig::mock(),
            storage: StorageConfig {
                bucket: DEFAULT_BUCKET.to_string(),
                region: "us-east-1".to_string(),
                ..Default::default()
            },
            dify: DifyConfig {
                endpoint: DEFAULT_DIFY_ENDPOINT.to_string(),
                user_id: DEFAULT_DIFY_USER.to_string(),
                ..Default::default()
            },
            llm: LlmConfig::default(),
            port: 0,
            rust_log: "debug".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_with_empty_env() {
        let config = Config::resolve(env(&[])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.rust_log, "info");
        assert!(config.db.use_mock_mode);
        assert_eq!(config.storage.bucket, "article-images");
        assert!(!config.storage.s3_enabled());
        assert_eq!(config.dify.endpoint, DEFAULT_DIFY_ENDPOINT);
        assert!(config.dify.api_key.is_none());
    }

    #[test]
    fn test_s3_endpoint_derived_from_project_url() {
        let config = Config::resolve(env(&[
            ("NEXT_PUBLIC_SUPABASE_URL", "https://abc.supabase.co/"),
            ("AWS_ACCESS_KEY_ID", "id"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
        ]))
        .unwrap();
        assert_eq!(
            config.storage.s3_endpoint.as_deref(),
            Some("https://abc.supabase.co/storage/v1/s3")
        );
        assert!(config.storage.s3_enabled());
        assert_eq!(
            config.storage.public_url("2024/05/a.png"),
            "https://abc.supabase.co/storage/v1/object/public/article-images/2024/05/a.png"
        );
    }

    #[test]
    fn test_invalid_port_is_an_error() {
        assert!(Config::resolve(env(&[("PORT", "eighty")])).is_err());
        assert_eq!(Config::resolve(env(&[("PORT", "3000")])).unwrap().port, 3000);
    }
}
