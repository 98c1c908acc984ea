use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use tracing::{Instrument, error, info, info_span, warn};

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::models::{PublishedDocument, TaskRecord, UploadedFile};
use crate::services::merge::merge_documents;
use crate::services::normalize::FormatNormalizer;
use crate::services::publish::{BlobPublisher, PublishRequest};
use crate::services::storage::ObjectStorage;
use crate::utils::naming::{merged_document_name, next_unix_millis, sanitize_filename};

/// External record store for task rows. The pipeline writes the published
/// document URL exactly once per successful run and never mutates the row
/// otherwise.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn record_document(&self, task_id: &str, url: &str) -> anyhow::Result<()>;
}

/// Drives one task's document-consolidation flow end to end:
/// stage → normalize → merge → publish → record, with the run-scoped
/// staging directory removed unconditionally on every exit path.
pub struct IntakePipeline {
    config: PipelineConfig,
    normalizer: FormatNormalizer,
    publisher: BlobPublisher,
    store: Arc<dyn TaskStore>,
}

impl IntakePipeline {
    pub fn new(
        config: PipelineConfig,
        storage: Arc<dyn ObjectStorage>,
        store: Arc<dyn TaskStore>,
    ) -> Self {
        Self {
            normalizer: FormatNormalizer::new(config.clone()),
            publisher: BlobPublisher::new(storage),
            config,
            store,
        }
    }

    /// Run one task. Errors are surfaced only after the staging directory
    /// has been cleaned up; nothing is retried internally — resubmission
    /// restarts the whole flow.
    pub async fn run(
        &self,
        task: &TaskRecord,
        files: &[UploadedFile],
    ) -> Result<PublishedDocument, PipelineError> {
        if files.is_empty() {
            return Err(PipelineError::NoFiles);
        }

        let staging = self.create_staging_dir()?;
        let staging_path = staging.path().to_path_buf();

        let result = self
            .execute(task, files, &staging_path)
            .instrument(info_span!("consolidation_run", task_id = %task.id))
            .await;

        // Dropping the TempDir would clean up regardless; closing it
        // explicitly surfaces a deletion failure instead of losing it.
        if let Err(e) = staging.close() {
            warn!("failed to remove staging directory: {e}");
        }

        match &result {
            Ok(doc) => info!(
                task_id = %task.id,
                url = %doc.url,
                pages = doc.page_count,
                "consolidation complete"
            ),
            Err(e) => error!(task_id = %task.id, kind = e.kind(), "consolidation failed: {e}"),
        }
        result
    }

    fn create_staging_dir(&self) -> Result<TempDir, PipelineError> {
        let builder_result = match &self.config.staging_root {
            Some(root) => tempfile::Builder::new().prefix("intake-").tempdir_in(root),
            None => tempfile::Builder::new().prefix("intake-").tempdir(),
        };
        Ok(builder_result?)
    }

    async fn execute(
        &self,
        task: &TaskRecord,
        files: &[UploadedFile],
        staging: &Path,
    ) -> Result<PublishedDocument, PipelineError> {
        let staged = stage_files(files, staging).await?;
        info!(count = staged.len(), "staged uploads");

        // Normalization runs strictly in upload order; the first failure
        // aborts the run and the partial set is discarded with the
        // staging directory.
        let norm_dir = staging.join("normalized");
        tokio::fs::create_dir_all(&norm_dir).await?;
        let mut normalized = Vec::with_capacity(staged.len());
        for (index, file) in staged.iter().enumerate() {
            let pdf = self
                .normalizer
                .normalize(&file.path, file.content_type.as_deref(), index, &norm_dir)
                .await?;
            normalized.push(pdf);
        }

        let output_name = merged_document_name(
            &task.client_name,
            &task.sub_client_first_name,
            &task.sub_client_last_name,
            next_unix_millis(),
        );
        let (merged_path, page_count) = merge_documents(&normalized, &output_name, staging)?;

        let bytes = tokio::fs::read(&merged_path).await?;
        let blob = self
            .publisher
            .publish(PublishRequest {
                bytes,
                filename: &output_name,
                content_type: mime::APPLICATION_PDF.as_ref(),
                tax_year: &task.tax_year,
                client_name: &task.client_name,
                sub_client_name: &task.sub_client_name(),
            })
            .await?;

        self.store
            .record_document(&task.id, &blob.url)
            .await
            .map_err(|e| PipelineError::Record(format!("{e:#}")))?;

        Ok(PublishedDocument {
            blob_key: blob.key,
            url: blob.url,
            page_count,
        })
    }
}

struct StagedFile {
    path: PathBuf,
    content_type: Option<String>,
}

/// Write every upload into the run's staging directory, preserving the
/// original filename. Each file gets an index-keyed subdirectory so two
/// uploads sharing a name cannot overwrite each other.
async fn stage_files(
    files: &[UploadedFile],
    staging: &Path,
) -> Result<Vec<StagedFile>, PipelineError> {
    let uploads = staging.join("uploads");
    let mut staged = Vec::with_capacity(files.len());

    for (index, file) in files.iter().enumerate() {
        let dir = uploads.join(index.to_string());
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(sanitize_filename(&file.filename));
        tokio::fs::write(&path, &file.bytes).await?;
        staged.push(StagedFile {
            path,
            content_type: file.content_type.clone(),
        });
    }

    Ok(staged)
}
