use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriorityError {
    #[error("unknown priority factor '{0}'")]
    UnknownFactor(String),

    #[error("invalid priority config: {0}")]
    InvalidConfig(String),

    #[error("{records} records but {contexts} scoring contexts")]
    ContextMismatch { records: usize, contexts: usize },
}

impl PriorityError {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            PriorityError::UnknownFactor(_)
            | PriorityError::InvalidConfig(_)
            | PriorityError::ContextMismatch { .. } => "validation",
        }
    }
}
