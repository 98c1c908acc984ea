use thiserror::Error;

/// Failure taxonomy of a consolidation run. Every variant is fatal to the
/// run that produced it; nothing is retried internally, and the run-scoped
/// staging directory is always removed before one of these reaches the
/// caller.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("task was submitted with no uploaded files")]
    NoFiles,

    #[error("unsupported format for '{path}' (detected extension '.{extension}')")]
    UnsupportedFormat { path: String, extension: String },

    #[error("failed to decode image '{path}'")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("document conversion failed for '{path}': {detail}")]
    Conversion { path: String, detail: String },

    #[error("failed to merge '{path}': {detail}")]
    Merge { path: String, detail: String },

    #[error("storage configuration missing: {0}")]
    Configuration(String),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("task record write failed: {0}")]
    Record(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Stable kind token reported at the API boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoFiles => "NoFilesError",
            Self::UnsupportedFormat { .. } => "UnsupportedFormatError",
            Self::Decode { .. } => "DecodeError",
            Self::Conversion { .. } => "ConversionError",
            Self::Merge { .. } => "MergeError",
            Self::Configuration(_) => "ConfigurationError",
            Self::Upload(_) => "UploadError",
            Self::Record(_) => "RecordError",
            Self::Io(_) => "IoError",
        }
    }
}
