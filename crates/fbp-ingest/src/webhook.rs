//! Push-style ingestion of single webhook payloads.

use chrono::{DateTime, Utc};
use fbp_core::{FeedbackStore, FieldMapping, Source, UpsertOutcome, ValidationError};
use serde_json::Value;

use crate::error::{IngestError, NormalizeError};
use crate::normalize::map_record;

/// Map a webhook payload and insert it, or merge it into the record that
/// already carries the same `(source, source_id)`.
///
/// Updates only need `source_id`; every other non-empty field overwrites the
/// stored value. New records must pass full validation.
///
/// # Errors
///
/// Returns [`IngestError::Validation`] when the payload cannot be mapped or a
/// new record is incomplete, and [`IngestError::Store`] on store failures.
pub async fn ingest_webhook(
    store: &dyn FeedbackStore,
    source: &Source,
    mapping: &FieldMapping,
    payload: &Value,
    now: DateTime<Utc>,
) -> Result<UpsertOutcome, IngestError> {
    let patch = map_record(payload, source, mapping)?;
    let Some(source_id) = patch.source_id.clone() else {
        return Err(NormalizeError::from(ValidationError::MissingField("source_id")).into());
    };

    if let Some(mut existing) = store.find_by_source_key(source, &source_id).await? {
        existing.apply_patch(patch, now);
        let outcome = store.upsert(existing).await?;
        tracing::debug!(
            source = %source,
            source_id = %source_id,
            "webhook merged into existing record"
        );
        return Ok(outcome);
    }

    let record = patch.into_record(now).map_err(NormalizeError::from)?;
    let outcome = store.upsert(record).await?;
    tracing::debug!(source = %source, source_id = %source_id, "webhook inserted new record");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use fbp_core::{CustomerTier, MemoryStore};
    use serde_json::json;

    use super::*;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, hour, 0, 0).unwrap()
    }

    fn mapping() -> FieldMapping {
        FieldMapping::preset(&Source::Zendesk).unwrap()
    }

    #[tokio::test]
    async fn new_payload_is_inserted() {
        let store = MemoryStore::new();
        let payload = json!({
            "id": 77,
            "description": "Cannot log in after password reset",
            "created_at": "2025-06-02T07:00:00Z",
            "priority": "normal"
        });

        let outcome = ingest_webhook(&store, &Source::Zendesk, &mapping(), &payload, at(8))
            .await
            .unwrap();
        assert!(matches!(outcome, UpsertOutcome::Inserted(_)));

        let stored = store
            .find_by_source_key(&Source::Zendesk, "77")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.customer_tier, CustomerTier::Business);
    }

    #[tokio::test]
    async fn partial_update_merges_into_existing() {
        let store = MemoryStore::new();
        let created = json!({
            "id": 77,
            "subject": "Login",
            "description": "Cannot log in",
            "created_at": "2025-06-02T07:00:00Z",
            "status": "open"
        });
        let first = ingest_webhook(&store, &Source::Zendesk, &mapping(), &created, at(8))
            .await
            .unwrap();

        let update = json!({"id": 77, "status": "solved", "priority": "urgent"});
        let second = ingest_webhook(&store, &Source::Zendesk, &mapping(), &update, at(9))
            .await
            .unwrap();

        assert_eq!(second, UpsertOutcome::Updated(first.id()));
        let stored = store
            .find_by_source_key(&Source::Zendesk, "77")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.content, "Cannot log in");
        assert_eq!(stored.title, "Login");
        assert_eq!(stored.customer_tier, CustomerTier::Enterprise);
        assert_eq!(stored.metadata["status"], json!("solved"));
        assert_eq!(stored.updated_at, at(9));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn partial_payload_for_unknown_record_is_rejected() {
        let store = MemoryStore::new();
        let update = json!({"id": 78, "status": "solved"});
        let err = ingest_webhook(&store, &Source::Zendesk, &mapping(), &update, at(9))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn payload_without_source_id_is_rejected() {
        let store = MemoryStore::new();
        let payload = json!({"description": "orphan"});
        let err = ingest_webhook(&store, &Source::Zendesk, &mapping(), &payload, at(9))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("source_id"));
    }
}
