use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read sources file {path}: {source}")]
    SourcesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse sources file: {0}")]
    SourcesFileParse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Errors surfaced by a [`crate::FeedbackStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("record {0} not found")]
    NotFound(String),
}

impl StoreError {
    /// Machine-readable error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Backend(_) => "store_backend",
            StoreError::NotFound(_) => "not_found",
        }
    }
}
