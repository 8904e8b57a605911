//! Mapping raw source JSON into [`NormalizedFeedback`] through a
//! declared [`FieldMapping`].

use chrono::{DateTime, NaiveDateTime, Utc};
use fbp_core::{
    Category, CategoryRule, CustomerTier, FeedbackPatch, FieldMapping, NormalizedFeedback, Source,
    TierRule,
};
use serde_json::{Map, Value};

use crate::error::NormalizeError;

/// Normalized records of one page plus the records that were skipped.
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub records: Vec<NormalizedFeedback>,
    pub skipped: Vec<SkippedRecord>,
}

#[derive(Debug)]
pub struct SkippedRecord {
    /// Position of the record in the raw page.
    pub index: usize,
    pub source_id: Option<String>,
    pub error: NormalizeError,
}

/// Resolves a dot-separated path (`requester.email`, `answers.0.text`).
///
/// JSON `null` is treated as absent.
#[must_use]
pub fn lookup<'a>(raw: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = raw;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    (!current.is_null()).then_some(current)
}

fn lookup_string(raw: &Value, path: Option<&str>) -> Option<String> {
    let value = lookup(raw, path?)?;
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// 1990-01-01T00:00:00Z.
const EARLIEST_TIMESTAMP_SECS: i64 = 631_152_000;
/// 2200-01-01T00:00:00Z.
const LATEST_TIMESTAMP_SECS: i64 = 7_258_118_400;

/// Parses RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) and unix seconds.
///
/// Instants before 1990 or from 2200 on are rejected.
#[must_use]
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    parse_any_timestamp(value).filter(|ts| {
        (EARLIEST_TIMESTAMP_SECS..LATEST_TIMESTAMP_SECS).contains(&ts.timestamp())
    })
}

fn parse_any_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(truncate_secs))
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        Value::String(s) => parse_timestamp_str(s.trim()),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn truncate_secs(secs: f64) -> i64 {
    secs.trunc() as i64
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    s.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// First rule whose substring occurs in `raw` (case-insensitive).
#[must_use]
pub fn resolve_tier(raw: &str, rules: &[TierRule]) -> Option<CustomerTier> {
    let raw = raw.to_lowercase();
    rules
        .iter()
        .find(|rule| raw.contains(&rule.contains.to_lowercase()))
        .map(|rule| rule.tier)
}

/// First rule matching any tag; [`Category::Other`] when none does.
#[must_use]
pub fn resolve_category(tags: &[String], rules: &[CategoryRule]) -> Category {
    let tags: Vec<String> = tags.iter().map(|t| t.to_lowercase()).collect();
    rules
        .iter()
        .find(|rule| {
            let needle = rule.tag_contains.to_lowercase();
            tags.iter().any(|tag| tag.contains(&needle))
        })
        .map_or(Category::Other, |rule| rule.category)
}

/// Accepts `["a", "b"]`, `[{"name": "a"}]`, `{"tags": [...]}` and `"a, b"`.
fn extract_tags(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Object(obj) => obj.get("name").and_then(Value::as_str).map(str::to_owned),
                _ => None,
            })
            .collect(),
        Value::Object(obj) => obj.get("tags").map(extract_tags).unwrap_or_default(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_owned)
            .collect(),
        _ => Vec::new(),
    }
}

/// Map a raw record into a patch without enforcing required fields.
///
/// # Errors
///
/// Returns [`NormalizeError::NotAnObject`] for non-object input and
/// [`NormalizeError::InvalidTimestamp`] when `created_at` is present but
/// unparsable.
pub fn map_record(
    raw: &Value,
    source: &Source,
    mapping: &FieldMapping,
) -> Result<FeedbackPatch, NormalizeError> {
    if !raw.is_object() {
        return Err(NormalizeError::NotAnObject);
    }

    let created_at = match lookup(raw, &mapping.created_at) {
        Some(value) => Some(parse_timestamp(value).ok_or_else(|| {
            NormalizeError::InvalidTimestamp {
                field: "created_at",
                value: value.to_string(),
            }
        })?),
        None => None,
    };

    let customer_tier = lookup_string(raw, mapping.customer_tier.as_deref())
        .map(|tier| resolve_tier(&tier, &mapping.tier_rules).unwrap_or_default());

    let category = mapping
        .tags
        .as_deref()
        .and_then(|path| lookup(raw, path))
        .map(|tags| resolve_category(&extract_tags(tags), &mapping.category_rules));

    let metadata = if mapping.metadata.is_empty() {
        None
    } else {
        let mut map = Map::new();
        for path in &mapping.metadata {
            if let Some(value) = lookup(raw, path) {
                let key = path.rsplit('.').next().unwrap_or(path);
                map.insert(key.to_owned(), value.clone());
            }
        }
        Some(Value::Object(map))
    };

    Ok(FeedbackPatch {
        source: source.clone(),
        source_id: lookup_string(raw, Some(mapping.source_id.as_str())),
        title: lookup_string(raw, mapping.title.as_deref()),
        content: lookup_string(raw, Some(mapping.content.as_str())),
        customer_id: lookup_string(raw, mapping.customer_id.as_deref()),
        customer_email: lookup_string(raw, mapping.customer_email.as_deref()),
        customer_name: lookup_string(raw, mapping.customer_name.as_deref()),
        customer_tier,
        category,
        created_at,
        metadata,
    })
}

/// Normalize one raw record into a complete [`NormalizedFeedback`].
///
/// # Errors
///
/// Returns [`NormalizeError`] when the record cannot be mapped or lacks
/// `source_id`, `content` or `created_at`.
pub fn normalize_record(
    raw: &Value,
    source: &Source,
    mapping: &FieldMapping,
    now: DateTime<Utc>,
) -> Result<NormalizedFeedback, NormalizeError> {
    let patch = map_record(raw, source, mapping)?;
    Ok(patch.into_record(now)?)
}

/// Normalize a page of raw records. Invalid records are skipped with a
/// warning; the rest of the batch continues.
#[must_use]
pub fn normalize_batch(
    raws: &[Value],
    source: &Source,
    mapping: &FieldMapping,
    now: DateTime<Utc>,
) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    for (index, raw) in raws.iter().enumerate() {
        match normalize_record(raw, source, mapping, now) {
            Ok(record) => batch.records.push(record),
            Err(error) => {
                let source_id = lookup_string(raw, Some(mapping.source_id.as_str()));
                tracing::warn!(
                    source = %source,
                    index,
                    source_id = source_id.as_deref().unwrap_or("<none>"),
                    error = %error,
                    "skipping raw record"
                );
                batch.skipped.push(SkippedRecord {
                    index,
                    source_id,
                    error,
                });
            }
        }
    }
    batch
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
