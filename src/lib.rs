pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use config::{PipelineConfig, StorageConfig};
pub use error::PipelineError;
pub use models::{PublishedDocument, SoftwareCredentials, TaskRecord, UploadedFile};
pub use services::pipeline::{IntakePipeline, TaskStore};
pub use services::storage::{ObjectStorage, S3ObjectStorage};
