use std::sync::Arc;

use tracing::info;

use crate::error::PipelineError;
use crate::services::storage::ObjectStorage;
use crate::utils::naming::{blob_key, next_unix_millis};

/// One buffer to push to the blob store, with the naming context the key
/// is derived from.
pub struct PublishRequest<'a> {
    pub bytes: Vec<u8>,
    pub filename: &'a str,
    /// Declared MIME type, stored on the object as-is (never re-detected).
    pub content_type: &'a str,
    pub tax_year: &'a str,
    pub client_name: &'a str,
    pub sub_client_name: &'a str,
}

#[derive(Debug)]
pub struct PublishedBlob {
    pub key: String,
    pub url: String,
}

/// Uploads one byte buffer per call under a deterministic, human-traceable
/// key and returns the resulting URL. Exactly one attempt per call; retry
/// policy belongs to the caller.
pub struct BlobPublisher {
    storage: Arc<dyn ObjectStorage>,
}

impl BlobPublisher {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }

    pub async fn publish(&self, request: PublishRequest<'_>) -> Result<PublishedBlob, PipelineError> {
        let key = blob_key(
            request.tax_year,
            request.client_name,
            request.sub_client_name,
            next_unix_millis(),
            request.filename,
        );

        self.storage
            .put_object(&key, request.bytes, request.content_type)
            .await
            .map_err(|e| PipelineError::Upload(format!("{e:#}")))?;

        let url = self
            .storage
            .object_url(&key)
            .await
            .map_err(|e| PipelineError::Upload(format!("{e:#}")))?;

        info!(%key, "published blob");
        Ok(PublishedBlob { key, url })
    }
}
