use std::time::Duration;

use fbp_core::{Source, StoreError, ValidationError};
use thiserror::Error;

/// Failure reported by a source adapter for one outbound call.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("request timed out")]
    Timeout,

    #[error("source unavailable: HTTP {status}")]
    Unavailable { status: u16 },

    #[error("credentials rejected: {0}")]
    Unauthorized(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("request rejected: HTTP {status}")]
    Rejected { status: u16 },

    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl SourceError {
    /// Whether the call may succeed if repeated after a delay.
    ///
    /// Transport errors count as transient only for timeouts, connection
    /// failures and 5xx statuses.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::RateLimited { .. }
            | SourceError::Timeout
            | SourceError::Unavailable { .. } => true,
            SourceError::Http(err) => {
                err.is_timeout()
                    || err.is_connect()
                    || err.status().is_some_and(|s| s.is_server_error())
            }
            SourceError::Unauthorized(_)
            | SourceError::Malformed(_)
            | SourceError::Rejected { .. }
            | SourceError::Io { .. } => false,
        }
    }

    /// Server-provided wait before the next call, if any.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SourceError::RateLimited {
                retry_after_secs: Some(secs),
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

/// A raw record that could not be mapped to a feedback record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("raw record is not a JSON object")]
    NotAnObject,

    #[error("invalid timestamp in `{field}`: {value}")]
    InvalidTimestamp { field: &'static str, value: String },

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

impl NormalizeError {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        "validation"
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("source {origin} failed: {error}")]
    Source {
        origin: Source,
        #[source]
        error: SourceError,
    },

    #[error("validation error: {0}")]
    Validation(#[from] NormalizeError),

    #[error("pagination limit reached for {origin}: exceeded {max_pages} pages")]
    PageLimit { origin: Source, max_pages: usize },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl IngestError {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Source { error, .. } if error.is_transient() => "transient_source",
            IngestError::Source { .. } | IngestError::PageLimit { .. } => "permanent_source",
            IngestError::Validation(_) => "validation",
            IngestError::Store(err) => err.kind(),
        }
    }
}

/// Returned when a wait or retry loop observes cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Outcome of a retried call that did not succeed.
#[derive(Debug, Error)]
pub enum RetryError {
    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    #[error(transparent)]
    Source(#[from] SourceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(SourceError::RateLimited {
            retry_after_secs: None
        }
        .is_transient());
        assert!(SourceError::Timeout.is_transient());
        assert!(SourceError::Unavailable { status: 503 }.is_transient());
        assert!(!SourceError::Unauthorized("bad token".into()).is_transient());
        assert!(!SourceError::Malformed("not json".into()).is_transient());
        assert!(!SourceError::Rejected { status: 422 }.is_transient());
    }

    #[test]
    fn retry_after_only_for_rate_limits() {
        let limited = SourceError::RateLimited {
            retry_after_secs: Some(7),
        };
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(SourceError::Timeout.retry_after(), None);
    }

    #[test]
    fn ingest_error_kinds() {
        let transient = IngestError::Source {
            origin: Source::Zendesk,
            error: SourceError::Timeout,
        };
        assert_eq!(transient.kind(), "transient_source");

        let permanent = IngestError::Source {
            origin: Source::Zendesk,
            error: SourceError::Unauthorized("expired".into()),
        };
        assert_eq!(permanent.kind(), "permanent_source");

        let invalid = IngestError::from(NormalizeError::from(ValidationError::EmptyContent));
        assert_eq!(invalid.kind(), "validation");
    }
}
