use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::PipelineError;

/// Connection settings for the S3-compatible blob store.
///
/// Loading fails with a `ConfigurationError` when a required value is
/// missing, so a misconfigured deployment is rejected before any network
/// call is attempted.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Endpoint URL, e.g. `http://127.0.0.1:9000` for a local MinIO.
    pub endpoint_url: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
}

impl StorageConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, PipelineError> {
        Ok(Self {
            endpoint_url: require("MINIO_ENDPOINT")?,
            access_key: require("MINIO_ACCESS_KEY")?,
            secret_key: require("MINIO_SECRET_KEY")?,
            bucket: require("MINIO_BUCKET")?,
            region: env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
        })
    }
}

fn require(name: &str) -> Result<String, PipelineError> {
    env::var(name).map_err(|_| PipelineError::Configuration(format!("{name} must be set")))
}

/// Tunables for consolidation runs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// LibreOffice binary used for DOC/DOCX conversion (default: "soffice")
    pub soffice_bin: String,

    /// Upper bound on a single external conversion (default: 120 s)
    pub convert_timeout: Duration,

    /// Parent directory for run-scoped staging directories.
    /// `None` uses the system temp dir.
    pub staging_root: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            soffice_bin: "soffice".to_string(),
            convert_timeout: Duration::from_secs(120),
            staging_root: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            soffice_bin: env::var("SOFFICE_BIN").unwrap_or(default.soffice_bin),

            convert_timeout: env::var("CONVERT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.convert_timeout),

            staging_root: env::var("STAGING_ROOT").ok().map(PathBuf::from),
        }
    }
}
