use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThemeError {
    /// Every term was filtered out, so no vector space could be built.
    #[error("no vocabulary survived filtering ({documents} documents)")]
    EmptyVocabulary { documents: usize },

    /// Clustering produced NaN or infinite values.
    #[error("clustering produced non-finite values: {0}")]
    NonFinite(String),

    #[error("invalid theme parameter: {0}")]
    InvalidParameter(String),
}

impl ThemeError {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ThemeError::EmptyVocabulary { .. } | ThemeError::NonFinite(_) => "model_unavailable",
            ThemeError::InvalidParameter(_) => "validation",
        }
    }
}
