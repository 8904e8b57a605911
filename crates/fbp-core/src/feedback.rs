//! The canonical feedback record and its enumerations.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Maximum length of a title derived from content.
const DERIVED_TITLE_MAX_CHARS: usize = 80;

/// Returned when a string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// A record that cannot enter the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("required field `{0}` is missing")]
    MissingField(&'static str),

    #[error("content is empty")]
    EmptyContent,
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Origin system of a feedback record.
///
/// Known services have dedicated variants; anything else is carried as
/// [`Source::Custom`] so new adapters do not need a model change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Source {
    Zendesk,
    Intercom,
    SurveyMonkey,
    Custom(String),
}

impl Source {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Source::Zendesk => "zendesk",
            Source::Intercom => "intercom",
            Source::SurveyMonkey => "surveymonkey",
            Source::Custom(name) => name,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "" => Err(ParseEnumError {
                kind: "source",
                value: s.to_owned(),
            }),
            "zendesk" => Ok(Source::Zendesk),
            "intercom" => Ok(Source::Intercom),
            "surveymonkey" => Ok(Source::SurveyMonkey),
            _ => Ok(Source::Custom(lower)),
        }
    }
}

impl TryFrom<String> for Source {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Source> for String {
    fn from(source: Source) -> Self {
        source.as_str().to_owned()
    }
}

// ---------------------------------------------------------------------------
// CustomerTier
// ---------------------------------------------------------------------------

/// Commercial tier of the customer. Ordering follows business value.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CustomerTier {
    #[default]
    Free,
    Professional,
    Business,
    Enterprise,
}

impl CustomerTier {
    pub const ALL: [CustomerTier; 4] = [
        CustomerTier::Free,
        CustomerTier::Professional,
        CustomerTier::Business,
        CustomerTier::Enterprise,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CustomerTier::Free => "free",
            CustomerTier::Professional => "professional",
            CustomerTier::Business => "business",
            CustomerTier::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for CustomerTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustomerTier {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(CustomerTier::Free),
            "professional" => Ok(CustomerTier::Professional),
            "business" => Ok(CustomerTier::Business),
            "enterprise" => Ok(CustomerTier::Enterprise),
            _ => Err(ParseEnumError {
                kind: "customer tier",
                value: s.to_owned(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    BugReport,
    FeatureRequest,
    Support,
    #[default]
    Other,
}

impl Category {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Category::BugReport => "bug_report",
            Category::FeatureRequest => "feature_request",
            Category::Support => "support",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bug_report" => Ok(Category::BugReport),
            "feature_request" => Ok(Category::FeatureRequest),
            "support" => Ok(Category::Support),
            "other" => Ok(Category::Other),
            _ => Err(ParseEnumError {
                kind: "category",
                value: s.to_owned(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Derived enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl PriorityLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PriorityLevel::Low => "low",
            PriorityLevel::Medium => "medium",
            PriorityLevel::High => "high",
            PriorityLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// NormalizedFeedback
// ---------------------------------------------------------------------------

/// A source-agnostic feedback record.
///
/// The `sentiment_*`, `theme_ids`, `impact_score` and `priority_level` fields
/// are derived by the analysis engines. Ingestion creates them empty and
/// [`NormalizedFeedback::apply_patch`] never touches them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFeedback {
    pub id: Uuid,
    pub source: Source,
    pub source_id: String,
    pub title: String,
    pub content: String,
    pub customer_id: Option<String>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_tier: CustomerTier,
    #[serde(default)]
    pub category: Category,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub sentiment_label: Option<SentimentLabel>,
    #[serde(default)]
    pub sentiment_score: Option<f32>,
    #[serde(default)]
    pub sentiment_confidence: Option<f32>,
    #[serde(default)]
    pub theme_ids: BTreeSet<Uuid>,
    #[serde(default)]
    pub impact_score: Option<u8>,
    #[serde(default)]
    pub priority_level: Option<PriorityLevel>,
}

impl NormalizedFeedback {
    /// The `(source, source_id)` idempotency key.
    #[must_use]
    pub fn source_key(&self) -> (&Source, &str) {
        (&self.source, &self.source_id)
    }

    /// Merge the non-empty fields of `patch` into this record.
    ///
    /// Identity (`id`, `source`, `source_id`), `created_at` and every derived
    /// field are left untouched. Metadata objects are merged key by key.
    pub fn apply_patch(&mut self, patch: FeedbackPatch, now: DateTime<Utc>) {
        if let Some(content) = non_blank(patch.content) {
            self.content = content;
        }
        if let Some(title) = non_blank(patch.title) {
            self.title = title;
        }
        if let Some(v) = non_blank(patch.customer_id) {
            self.customer_id = Some(v);
        }
        if let Some(v) = non_blank(patch.customer_email) {
            self.customer_email = Some(v);
        }
        if let Some(v) = non_blank(patch.customer_name) {
            self.customer_name = Some(v);
        }
        if let Some(tier) = patch.customer_tier {
            self.customer_tier = tier;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(metadata) = patch.metadata {
            merge_metadata(&mut self.metadata, metadata);
        }
        self.updated_at = now;
    }

    /// Merge a full incoming record for the same source key into this one.
    pub fn absorb(&mut self, incoming: NormalizedFeedback, now: DateTime<Utc>) {
        self.apply_patch(FeedbackPatch::from(incoming), now);
    }
}

/// Partial record produced by field mapping.
///
/// Webhook updates merge a patch into an existing record; fresh records go
/// through [`FeedbackPatch::into_record`], which enforces required fields.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackPatch {
    pub source: Source,
    pub source_id: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub customer_id: Option<String>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub customer_tier: Option<CustomerTier>,
    pub category: Option<Category>,
    pub created_at: Option<DateTime<Utc>>,
    pub metadata: Option<serde_json::Value>,
}

impl FeedbackPatch {
    #[must_use]
    pub fn empty(source: Source) -> Self {
        Self {
            source,
            source_id: None,
            title: None,
            content: None,
            customer_id: None,
            customer_email: None,
            customer_name: None,
            customer_tier: None,
            category: None,
            created_at: None,
            metadata: None,
        }
    }

    /// Validate required fields and build a fresh record with a new id.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingField`] when `source_id`, `content`
    /// or `created_at` is absent, and [`ValidationError::EmptyContent`] when
    /// content is present but blank.
    pub fn into_record(self, now: DateTime<Utc>) -> Result<NormalizedFeedback, ValidationError> {
        let source_id =
            non_blank(self.source_id).ok_or(ValidationError::MissingField("source_id"))?;
        let content = self.content.ok_or(ValidationError::MissingField("content"))?;
        let content = content.trim().to_owned();
        if content.is_empty() {
            return Err(ValidationError::EmptyContent);
        }
        let created_at = self
            .created_at
            .ok_or(ValidationError::MissingField("created_at"))?;
        let title = non_blank(self.title).unwrap_or_else(|| derive_title(&content));

        Ok(NormalizedFeedback {
            id: Uuid::new_v4(),
            source: self.source,
            source_id,
            title,
            content,
            customer_id: non_blank(self.customer_id),
            customer_email: non_blank(self.customer_email),
            customer_name: non_blank(self.customer_name),
            customer_tier: self.customer_tier.unwrap_or_default(),
            category: self.category.unwrap_or_default(),
            created_at,
            updated_at: now,
            metadata: self
                .metadata
                .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new())),
            sentiment_label: None,
            sentiment_score: None,
            sentiment_confidence: None,
            theme_ids: BTreeSet::new(),
            impact_score: None,
            priority_level: None,
        })
    }
}

impl From<NormalizedFeedback> for FeedbackPatch {
    fn from(record: NormalizedFeedback) -> Self {
        Self {
            source: record.source,
            source_id: Some(record.source_id),
            title: Some(record.title),
            content: Some(record.content),
            customer_id: record.customer_id,
            customer_email: record.customer_email,
            customer_name: record.customer_name,
            customer_tier: Some(record.customer_tier),
            category: Some(record.category),
            created_at: Some(record.created_at),
            metadata: Some(record.metadata),
        }
    }
}

/// First non-empty line of `content`, shortened to a readable title.
#[must_use]
pub fn derive_title(content: &str) -> String {
    let line = content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default();
    if line.chars().count() <= DERIVED_TITLE_MAX_CHARS {
        return line.to_owned();
    }
    let mut title: String = line.chars().take(DERIVED_TITLE_MAX_CHARS - 3).collect();
    title.push_str("...");
    title
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

fn merge_metadata(target: &mut serde_json::Value, incoming: serde_json::Value) {
    match (target, incoming) {
        (serde_json::Value::Object(existing), serde_json::Value::Object(new)) => {
            for (key, value) in new {
                if !value.is_null() {
                    existing.insert(key, value);
                }
            }
        }
        (_, serde_json::Value::Null) => {}
        (target, incoming) => *target = incoming,
    }
}

#[cfg(test)]
#[path = "feedback_test.rs"]
mod tests;
