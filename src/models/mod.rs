use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// One attachment from a task submission: raw bytes, the original
/// filename, and the client-declared MIME type (untrusted). Raw bytes are
/// consumed by the pipeline run and never persisted past it.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn new(
        filename: impl Into<String>,
        content_type: Option<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type,
            bytes: bytes.into(),
        }
    }
}

/// Login for the downstream tax-software automation, carried on the task
/// row for the external tooling that picks up the merged document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftwareCredentials {
    pub username: String,
    pub password: String,
}

/// The persisted unit of work. Created once per submission; the pipeline
/// reads these fields and never mutates the row itself — the published
/// document URL is handed to the external record store instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub client_id: String,
    pub client_name: String,
    pub sub_client_id: String,
    pub sub_client_first_name: String,
    pub sub_client_last_name: String,
    pub tax_year: String,
    pub resident_state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<SoftwareCredentials>,
}

impl TaskRecord {
    /// Display name used for the sub-client storage folder.
    pub fn sub_client_name(&self) -> String {
        format!(
            "{} {}",
            self.sub_client_first_name, self.sub_client_last_name
        )
    }
}

/// Outcome of a successful consolidation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedDocument {
    pub blob_key: String,
    pub url: String,
    pub page_count: usize,
}
