//! Ingestion resilience layer: rate-limited, retried, paged fetching from
//! feedback sources, field-mapped normalization, and webhook deduplication.

pub mod adapter;
pub mod error;
pub mod normalize;
pub mod rate_limit;
pub mod retry;
pub mod sync;
pub mod webhook;

pub use adapter::{FetchPage, FetchRequest, HttpAdapter, JsonFileAdapter, SourceAdapter};
pub use error::{Cancelled, IngestError, NormalizeError, RetryError, SourceError};
pub use normalize::{normalize_batch, normalize_record, NormalizedBatch, SkippedRecord};
pub use rate_limit::{RateLimiter, RateState};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use sync::{sync_all, SourceSync, SyncReport, MAX_PAGES};
pub use webhook::ingest_webhook;
