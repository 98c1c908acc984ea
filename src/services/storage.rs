use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use tracing::info;

use crate::config::StorageConfig;

/// Durable blob store the pipeline publishes into. Production runs use the
/// S3-compatible implementation below; tests substitute an in-memory
/// double.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put_object(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()>;
    async fn object_exists(&self, key: &str) -> Result<bool>;
    async fn delete_object(&self, key: &str) -> Result<()>;
    async fn object_url(&self, key: &str) -> Result<String>;
}

pub struct S3ObjectStorage {
    client: Client,
    bucket: String,
    endpoint_url: String,
}

impl S3ObjectStorage {
    pub fn new(client: Client, bucket: String, endpoint_url: String) -> Self {
        Self {
            client,
            bucket,
            endpoint_url,
        }
    }

    /// Build a path-style client for MinIO or any S3-compatible endpoint.
    pub async fn connect(config: &StorageConfig) -> Self {
        info!(
            "☁️  S3 Storage: {} (Bucket: {})",
            config.endpoint_url, config.bucket
        );

        let aws_config = aws_config::from_env()
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region.clone()))
            .credentials_provider(Credentials::new(
                config.access_key.clone(),
                config.secret_key.clone(),
                None,
                None,
                "static",
            ))
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
            .force_path_style(true)
            .build();

        Self::new(
            Client::from_conf(s3_config),
            config.bucket.clone(),
            config.endpoint_url.clone(),
        )
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    async fn put_object(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await?;
        Ok(())
    }

    async fn object_exists(&self, key: &str) -> Result<bool> {
        let res = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match res {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(anyhow::anyhow!(service_error))
                }
            }
        }
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;
        Ok(())
    }

    async fn object_url(&self, key: &str) -> Result<String> {
        Ok(format!(
            "{}/{}/{}",
            self.endpoint_url.trim_end_matches('/'),
            self.bucket,
            key
        ))
    }
}
