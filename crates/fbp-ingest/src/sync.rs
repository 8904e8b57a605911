//! Paged, rate-limited, retried synchronization of one source into a store.

use chrono::Utc;
use fbp_core::{FeedbackStore, Source, UpsertOutcome};
use futures::future::join_all;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::adapter::{FetchPage, FetchRequest, SourceAdapter};
use crate::error::{IngestError, RetryError};
use crate::normalize::normalize_batch;
use crate::rate_limit::RateLimiter;
use crate::retry::{retry_with_backoff, RetryPolicy};

/// Maximum number of pages to fetch before returning an error.
/// Prevents infinite loops on cycling cursors.
pub const MAX_PAGES: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub source: Source,
    pub pages: usize,
    pub fetched: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub cancelled: bool,
}

impl SyncReport {
    #[must_use]
    pub fn new(source: Source) -> Self {
        Self {
            source,
            pages: 0,
            fetched: 0,
            inserted: 0,
            updated: 0,
            skipped: 0,
            cancelled: false,
        }
    }
}

/// One source's adapter together with its rate limiter and retry policy.
pub struct SourceSync {
    adapter: Box<dyn SourceAdapter>,
    limiter: RateLimiter,
    policy: RetryPolicy,
    max_pages: usize,
}

impl SourceSync {
    #[must_use]
    pub fn new(adapter: Box<dyn SourceAdapter>, limiter: RateLimiter, policy: RetryPolicy) -> Self {
        Self {
            adapter,
            limiter,
            policy,
            max_pages: MAX_PAGES,
        }
    }

    #[must_use]
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    #[must_use]
    pub fn source(&self) -> &Source {
        self.adapter.source()
    }

    async fn fetch_page(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<FetchPage, RetryError> {
        retry_with_backoff(&self.policy, cancel, || async {
            if let Err(cancelled) = self.limiter.acquire(cancel).await {
                return Err(RetryError::from(cancelled));
            }
            match self.adapter.fetch(request).await {
                Ok(page) => Ok(page),
                Err(err) => {
                    if let Some(delay) = err.retry_after() {
                        self.limiter.backoff(delay).await;
                    }
                    Err(RetryError::from(err))
                }
            }
        })
        .await
    }

    /// Page through the source until no cursor remains or `request.limit`
    /// records have been fetched, upserting each page in order.
    ///
    /// Cancellation stops further outbound calls; a page already fetched is
    /// still normalized and stored. The returned report then has
    /// `cancelled = true`.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Source`] when a fetch fails permanently or
    /// exhausts its retries, [`IngestError::PageLimit`] past the page cap,
    /// and [`IngestError::Store`] when an upsert fails.
    pub async fn run(
        &self,
        store: &dyn FeedbackStore,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<SyncReport, IngestError> {
        let source = self.adapter.source().clone();
        let mapping = self.adapter.field_mapping();
        let mut report = SyncReport::new(source.clone());
        let mut cursor = request.cursor.clone();

        loop {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let remaining = request.limit.map(|l| l.saturating_sub(report.fetched));
            if remaining == Some(0) {
                break;
            }

            if report.pages >= self.max_pages {
                return Err(IngestError::PageLimit {
                    origin: source,
                    max_pages: self.max_pages,
                });
            }

            let page_request = FetchRequest {
                cursor: cursor.clone(),
                limit: remaining,
                ..request.clone()
            };
            let page = match self.fetch_page(&page_request, cancel).await {
                Ok(page) => page,
                Err(RetryError::Cancelled(_)) => {
                    report.cancelled = true;
                    break;
                }
                Err(RetryError::Source(error)) => {
                    tracing::warn!(
                        source = %source,
                        pages = report.pages,
                        inserted = report.inserted,
                        updated = report.updated,
                        error = %error,
                        "sync aborted"
                    );
                    return Err(IngestError::Source {
                        origin: source,
                        error,
                    });
                }
            };
            report.pages += 1;

            let mut raws = page.records;
            if let Some(remaining) = remaining {
                raws.truncate(remaining);
            }
            report.fetched += raws.len();

            let batch = normalize_batch(&raws, &source, mapping, Utc::now());
            report.skipped += batch.skipped.len();
            for record in batch.records {
                match store.upsert(record).await? {
                    UpsertOutcome::Inserted(_) => report.inserted += 1,
                    UpsertOutcome::Updated(_) => report.updated += 1,
                }
            }

            tracing::debug!(
                source = %source,
                page = report.pages,
                fetched = raws.len(),
                skipped = batch.skipped.len(),
                "page ingested"
            );

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        tracing::info!(
            source = %source,
            pages = report.pages,
            fetched = report.fetched,
            inserted = report.inserted,
            updated = report.updated,
            skipped = report.skipped,
            cancelled = report.cancelled,
            "sync complete"
        );
        Ok(report)
    }
}

/// Run several sources concurrently. Each result is independent: one
/// source failing never affects another.
pub async fn sync_all(
    syncs: &[SourceSync],
    store: &dyn FeedbackStore,
    request: &FetchRequest,
    cancel: &CancellationToken,
) -> Vec<(Source, Result<SyncReport, IngestError>)> {
    join_all(syncs.iter().map(|sync| async move {
        let result = sync.run(store, request, cancel).await;
        if let Err(err) = &result {
            tracing::error!(
                source = %sync.source(),
                kind = err.kind(),
                error = %err,
                "source sync failed"
            );
        }
        (sync.source().clone(), result)
    }))
    .await
}
