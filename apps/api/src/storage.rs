//! Image object storage: an S3-compatible bucket in production, a map in memory otherwise.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::{OnceCell, RwLock};
use tracing::info;

use crate::config::StorageConfig;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("bucket '{bucket}' is unavailable: {message}")]
    Bucket { bucket: String, message: String },

    #[error("upload of '{path}' failed: {message}")]
    Upload { path: String, message: String },
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    fn backend(&self) -> &'static str;

    /// Stores `body` at `path` and returns its public URL.
    async fn put(&self, path: &str, content_type: &str, body: Bytes) -> Result<String, StorageError>;
}

pub struct S3ImageStore {
    client: aws_sdk_s3::Client,
    config: StorageConfig,
    bucket_ready: OnceCell<()>,
}

impl S3ImageStore {
    pub async fn new(config: StorageConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone().unwrap_or_default(),
            config.secret_access_key.clone().unwrap_or_default(),
            None,
            None,
            "newsroom-static",
        );

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint) = &config.s3_endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            config,
            bucket_ready: OnceCell::new(),
        }
    }

    /// Creates the bucket on first use when it does not exist yet.
    async fn ensure_bucket(&self) -> Result<(), StorageError> {
        self.bucket_ready
            .get_or_try_init(|| async {
                let bucket = &self.config.bucket;
                if self.client.head_bucket().bucket(bucket).send().await.is_ok() {
                    return Ok(());
                }
                match self.client.create_bucket().bucket(bucket).send().await {
                    Ok(_) => {
                        info!(bucket = %bucket, "Created storage bucket");
                        Ok(())
                    }
                    Err(e) => {
                        let service_error = e.into_service_error();
                        if service_error.is_bucket_already_owned_by_you()
                            || service_error.is_bucket_already_exists()
                        {
                            Ok(())
                        } else {
                            Err(StorageError::Bucket {
                                bucket: bucket.clone(),
                                message: service_error.to_string(),
                            })
                        }
                    }
                }
            })
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl ImageStore for S3ImageStore {
    fn backend(&self) -> &'static str {
        "s3"
    }

    async fn put(&self, path: &str, content_type: &str, body: Bytes) -> Result<String, StorageError> {
        self.ensure_bucket().await?;

        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(path)
            .body(ByteStream::from(body.to_vec()))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                path: path.to_string(),
                message: e.into_service_error().to_string(),
            })?;

        info!("Uploaded image to s3://{}/{}", self.config.bucket, path);
        Ok(self.config.public_url(path))
    }
}

#[derive(Clone, Default)]
pub struct MemoryImageStore {
    config: StorageConfig,
    objects: Arc<RwLock<HashMap<String, (String, Bytes)>>>,
}

impl MemoryImageStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            objects: Arc::default(),
        }
    }

    #[cfg(test)]
    pub async fn get(&self, path: &str) -> Option<(String, Bytes)> {
        self.objects.read().await.get(path).cloned()
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, path: &str, content_type: &str, body: Bytes) -> Result<String, StorageError> {
        self.objects
            .write()
            .await
            .insert(path.to_string(), (content_type.to_string(), body));
        Ok(self.config.public_url(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_keeps_bytes_and_builds_url() {
        let store = MemoryImageStore::new(StorageConfig {
            project_url: Some("https://abc.supabase.co".into()),
            bucket: "article-images".into(),
            ..Default::default()
        });
        let url = store
            .put("2024/05/x.png", "image/png", Bytes::from_static(b"\x89PNG"))
            .await
            .unwrap();
        assert_eq!(
            url,
            "https://abc.supabase.co/storage/v1/object/public/article-images/2024/05/x.png"
        );
        let (content_type, body) = store.get("2024/05/x.png").await.unwrap();
        assert_eq!(content_type, "image/png");
        assert_eq!(&body[..], b"\x89PNG");
    }
}
