use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SentimentError {
    /// The classification backend could not produce a result.
    #[error("sentiment model unavailable: {0}")]
    ModelUnavailable(String),

    /// The input has nothing to classify.
    #[error("malformed text: {0}")]
    MalformedText(String),
}

impl SentimentError {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            SentimentError::ModelUnavailable(_) => "model_unavailable",
            SentimentError::MalformedText(_) => "validation",
        }
    }
}
