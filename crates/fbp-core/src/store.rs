//! Persistence contract and an in-process reference store.
//!
//! The pipeline only needs the operations on [`FeedbackStore`]; the storage
//! engine behind them is the host's choice. [`MemoryStore`] backs tests and
//! the CLI.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::feedback::{Category, CustomerTier, NormalizedFeedback, SentimentLabel, Source};
use crate::theme::{Theme, ThemeMembership};

/// Result of an upsert keyed by `(source, source_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted(Uuid),
    Updated(Uuid),
}

impl UpsertOutcome {
    #[must_use]
    pub fn id(self) -> Uuid {
        match self {
            UpsertOutcome::Inserted(id) | UpsertOutcome::Updated(id) => id,
        }
    }

    #[must_use]
    pub fn is_update(self) -> bool {
        matches!(self, UpsertOutcome::Updated(_))
    }
}

/// Filters for [`FeedbackStore::query`]. Unset filters match everything.
#[derive(Debug, Clone, Default)]
pub struct FeedbackQuery {
    pub source: Option<Source>,
    pub customer_tier: Option<CustomerTier>,
    pub category: Option<Category>,
    pub sentiment_label: Option<SentimentLabel>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    /// Case-insensitive substring match on title or content.
    pub text: Option<String>,
    pub limit: Option<usize>,
}

impl FeedbackQuery {
    #[must_use]
    pub fn matches(&self, record: &NormalizedFeedback) -> bool {
        if self.source.as_ref().is_some_and(|s| s != &record.source) {
            return false;
        }
        if self.customer_tier.is_some_and(|t| t != record.customer_tier) {
            return false;
        }
        if self.category.is_some_and(|c| c != record.category) {
            return false;
        }
        if self
            .sentiment_label
            .is_some_and(|l| record.sentiment_label != Some(l))
        {
            return false;
        }
        if self.created_after.is_some_and(|t| record.created_at < t) {
            return false;
        }
        if self.created_before.is_some_and(|t| record.created_at > t) {
            return false;
        }
        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            if !record.title.to_lowercase().contains(&needle)
                && !record.content.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }
}

/// Inclusive time window over a theme's `last_seen`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ThemeWindow {
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}

#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Insert a record, or merge it into the record with the same
    /// `(source, source_id)`. The stored id, `created_at` and derived
    /// fields of an existing record are preserved.
    async fn upsert(&self, record: NormalizedFeedback) -> Result<UpsertOutcome, StoreError>;

    async fn find_by_source_key(
        &self,
        source: &Source,
        source_id: &str,
    ) -> Result<Option<NormalizedFeedback>, StoreError>;

    /// Records matching `query`, newest first.
    async fn query(&self, query: &FeedbackQuery) -> Result<Vec<NormalizedFeedback>, StoreError>;

    /// Write back engine-derived fields (sentiment, impact, priority) for
    /// records matched by id. Returns how many records were updated.
    async fn save_analysis(&self, records: &[NormalizedFeedback]) -> Result<usize, StoreError>;

    /// Persist the theme set of one extraction run and replace all
    /// memberships with the run's memberships.
    async fn save_themes(
        &self,
        themes: &[Theme],
        memberships: &[ThemeMembership],
    ) -> Result<(), StoreError>;

    /// Themes whose `last_seen` falls inside `window`.
    async fn get_themes(&self, window: ThemeWindow) -> Result<Vec<Theme>, StoreError>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    records: HashMap<Uuid, NormalizedFeedback>,
    keys: HashMap<(Source, String), Uuid>,
    themes: BTreeMap<Uuid, Theme>,
    memberships: Vec<ThemeMembership>,
}

/// `RwLock`-guarded in-memory [`FeedbackStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn memberships(&self) -> Vec<ThemeMembership> {
        self.inner.read().await.memberships.clone()
    }
}

#[async_trait]
impl FeedbackStore for MemoryStore {
    async fn upsert(&self, record: NormalizedFeedback) -> Result<UpsertOutcome, StoreError> {
        let mut inner = self.inner.write().await;
        let key = (record.source.clone(), record.source_id.clone());

        if let Some(&existing_id) = inner.keys.get(&key) {
            let existing = inner
                .records
                .get_mut(&existing_id)
                .ok_or_else(|| StoreError::NotFound(existing_id.to_string()))?;
            let now = record.updated_at;
            existing.absorb(record, now);
            return Ok(UpsertOutcome::Updated(existing_id));
        }

        let id = record.id;
        inner.keys.insert(key, id);
        inner.records.insert(id, record);
        Ok(UpsertOutcome::Inserted(id))
    }

    async fn find_by_source_key(
        &self,
        source: &Source,
        source_id: &str,
    ) -> Result<Option<NormalizedFeedback>, StoreError> {
        let inner = self.inner.read().await;
        let found = inner
            .keys
            .get(&(source.clone(), source_id.to_owned()))
            .and_then(|id| inner.records.get(id))
            .cloned();
        Ok(found)
    }

    async fn query(&self, query: &FeedbackQuery) -> Result<Vec<NormalizedFeedback>, StoreError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<NormalizedFeedback> = inner
            .records
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn save_analysis(&self, records: &[NormalizedFeedback]) -> Result<usize, StoreError> {
        let mut inner = self.inner.write().await;
        let mut updated = 0;
        for record in records {
            if let Some(stored) = inner.records.get_mut(&record.id) {
                stored.sentiment_label = record.sentiment_label;
                stored.sentiment_score = record.sentiment_score;
                stored.sentiment_confidence = record.sentiment_confidence;
                stored.impact_score = record.impact_score;
                stored.priority_level = record.priority_level;
                updated += 1;
            } else {
                tracing::warn!(id = %record.id, "save_analysis: record not found, skipping");
            }
        }
        Ok(updated)
    }

    async fn save_themes(
        &self,
        themes: &[Theme],
        memberships: &[ThemeMembership],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        for theme in themes {
            inner.themes.insert(theme.id, theme.clone());
        }

        for record in inner.records.values_mut() {
            record.theme_ids.clear();
        }
        for membership in memberships {
            if let Some(record) = inner.records.get_mut(&membership.feedback_id) {
                record.theme_ids.insert(membership.theme_id);
            }
        }
        inner.memberships = memberships.to_vec();
        Ok(())
    }

    async fn get_themes(&self, window: ThemeWindow) -> Result<Vec<Theme>, StoreError> {
        let inner = self.inner.read().await;
        let mut themes: Vec<Theme> = inner
            .themes
            .values()
            .filter(|t| window.contains(t.last_seen))
            .cloned()
            .collect();
        themes.sort_by(|a, b| b.frequency.cmp(&a.frequency).then(a.name.cmp(&b.name)));
        Ok(themes)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::feedback::FeedbackPatch;
    use crate::theme::ThemeStatus;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, day, 9, 0, 0).unwrap()
    }

    fn record(source_id: &str, content: &str, day: u32) -> NormalizedFeedback {
        let mut patch = FeedbackPatch::empty(Source::Intercom);
        patch.source_id = Some(source_id.to_owned());
        patch.content = Some(content.to_owned());
        patch.created_at = Some(ts(day));
        patch.into_record(ts(day)).unwrap()
    }

    #[tokio::test]
    async fn upsert_same_source_key_updates_instead_of_duplicating() {
        let store = MemoryStore::new();
        let first = store.upsert(record("c-1", "slow dashboard", 1)).await.unwrap();
        let second = store
            .upsert(record("c-1", "slow dashboard, still", 2))
            .await
            .unwrap();

        assert!(matches!(first, UpsertOutcome::Inserted(_)));
        assert_eq!(second, UpsertOutcome::Updated(first.id()));
        assert_eq!(store.len().await, 1);

        let stored = store
            .find_by_source_key(&Source::Intercom, "c-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.content, "slow dashboard, still");
        assert_eq!(stored.created_at, ts(1));
    }

    #[tokio::test]
    async fn query_filters_and_orders_newest_first() {
        let store = MemoryStore::new();
        store.upsert(record("a", "billing page crashes", 1)).await.unwrap();
        store.upsert(record("b", "love the new editor", 3)).await.unwrap();
        store.upsert(record("c", "billing export missing", 2)).await.unwrap();

        let rows = store
            .query(&FeedbackQuery {
                text: Some("BILLING".to_owned()),
                ..FeedbackQuery::default()
            })
            .await
            .unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.source_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);

        let limited = store
            .query(&FeedbackQuery {
                limit: Some(1),
                ..FeedbackQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(limited[0].source_id, "b");
    }

    #[tokio::test]
    async fn save_themes_replaces_memberships() {
        let store = MemoryStore::new();
        let a = store.upsert(record("a", "login fails", 1)).await.unwrap().id();
        let b = store.upsert(record("b", "password reset", 1)).await.unwrap().id();

        let theme = Theme {
            id: Uuid::new_v4(),
            name: "Login".to_owned(),
            keywords: vec!["login".to_owned()],
            frequency: 1,
            confidence: 0.8,
            first_seen: ts(1),
            last_seen: ts(5),
            status: ThemeStatus::Active,
            empty_runs: 0,
            history: vec![1],
        };
        let first_run = vec![ThemeMembership {
            theme_id: theme.id,
            feedback_id: a,
            relevance: 0.9,
        }];
        store.save_themes(&[theme.clone()], &first_run).await.unwrap();

        let second_run = vec![ThemeMembership {
            theme_id: theme.id,
            feedback_id: b,
            relevance: 0.7,
        }];
        store.save_themes(&[theme.clone()], &second_run).await.unwrap();

        let rows = store.query(&FeedbackQuery::default()).await.unwrap();
        let by_source: HashMap<&str, &NormalizedFeedback> =
            rows.iter().map(|r| (r.source_id.as_str(), r)).collect();
        assert!(by_source["a"].theme_ids.is_empty());
        assert!(by_source["b"].theme_ids.contains(&theme.id));

        let window = ThemeWindow {
            start: ts(4),
            end: ts(6),
        };
        assert_eq!(store.get_themes(window).await.unwrap().len(), 1);
        let early = ThemeWindow {
            start: ts(1),
            end: ts(2),
        };
        assert!(store.get_themes(early).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_preserves_derived_fields() {
        let store = MemoryStore::new();
        let id = store.upsert(record("a", "crash on save", 1)).await.unwrap().id();

        let mut analyzed = store
            .find_by_source_key(&Source::Intercom, "a")
            .await
            .unwrap()
            .unwrap();
        analyzed.sentiment_score = Some(-0.7);
        analyzed.impact_score = Some(81);
        assert_eq!(store.save_analysis(&[analyzed]).await.unwrap(), 1);

        store.upsert(record("a", "crash on save (again)", 2)).await.unwrap();
        let stored = store
            .find_by_source_key(&Source::Intercom, "a")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, id);
        assert_eq!(stored.sentiment_score, Some(-0.7));
        assert_eq!(stored.impact_score, Some(81));
    }
}
