//! Declared source configuration: quota windows and raw-field mappings.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::feedback::{Category, CustomerTier, Source};
use crate::ConfigError;

/// Maps a raw-value substring to a customer tier. Rules are tried in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierRule {
    pub contains: String,
    pub tier: CustomerTier,
}

/// Maps a tag substring to a feedback category. Rules are tried in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub tag_contains: String,
    pub category: Category,
}

/// Dot-separated JSON paths locating each normalized field in a raw record.
///
/// `source_id`, `content` and `created_at` are required; the rest are
/// optional and default to empty when unmapped or absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub source_id: String,
    pub content: String,
    pub created_at: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_tier: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    /// Extra paths copied into `metadata`, keyed by their last segment.
    #[serde(default)]
    pub metadata: Vec<String>,
    #[serde(default = "default_tier_rules")]
    pub tier_rules: Vec<TierRule>,
    #[serde(default = "default_category_rules")]
    pub category_rules: Vec<CategoryRule>,
}

impl FieldMapping {
    /// A mapping with only the required paths set and default rule tables.
    #[must_use]
    pub fn new(source_id: &str, content: &str, created_at: &str) -> Self {
        Self {
            source_id: source_id.to_owned(),
            content: content.to_owned(),
            created_at: created_at.to_owned(),
            title: None,
            customer_id: None,
            customer_email: None,
            customer_name: None,
            customer_tier: None,
            tags: None,
            metadata: Vec::new(),
            tier_rules: default_tier_rules(),
            category_rules: default_category_rules(),
        }
    }

    /// Built-in mapping for sources with a well-known payload shape.
    #[must_use]
    pub fn preset(source: &Source) -> Option<Self> {
        match source {
            Source::Zendesk => Some(Self {
                title: Some("subject".to_owned()),
                customer_id: Some("requester_id".to_owned()),
                customer_email: Some("requester.email".to_owned()),
                customer_name: Some("requester.name".to_owned()),
                customer_tier: Some("priority".to_owned()),
                tags: Some("tags".to_owned()),
                metadata: vec!["status".to_owned(), "priority".to_owned(), "type".to_owned()],
                tier_rules: vec![
                    rule("urgent", CustomerTier::Enterprise),
                    rule("high", CustomerTier::Enterprise),
                    rule("normal", CustomerTier::Business),
                ],
                ..Self::new("id", "description", "created_at")
            }),
            Source::Intercom => Some(Self {
                title: Some("source.subject".to_owned()),
                customer_id: Some("user.id".to_owned()),
                customer_email: Some("user.email".to_owned()),
                customer_name: Some("user.name".to_owned()),
                customer_tier: Some("user.custom_attributes.plan".to_owned()),
                tags: Some("tags".to_owned()),
                metadata: vec!["state".to_owned(), "assignee.id".to_owned()],
                ..Self::new("id", "source.body", "created_at")
            }),
            Source::SurveyMonkey => Some(Self {
                title: Some("survey_title".to_owned()),
                customer_id: Some("respondent.id".to_owned()),
                customer_email: Some("respondent.email".to_owned()),
                customer_tier: Some("respondent.plan".to_owned()),
                metadata: vec!["survey_id".to_owned(), "nps".to_owned()],
                ..Self::new("response_id", "answer", "date_created")
            }),
            Source::Custom(_) => None,
        }
    }
}

fn rule(contains: &str, tier: CustomerTier) -> TierRule {
    TierRule {
        contains: contains.to_owned(),
        tier,
    }
}

fn default_tier_rules() -> Vec<TierRule> {
    vec![
        rule("enterprise", CustomerTier::Enterprise),
        rule("business", CustomerTier::Business),
        rule("professional", CustomerTier::Professional),
        rule("pro", CustomerTier::Professional),
        rule("free", CustomerTier::Free),
    ]
}

fn default_category_rules() -> Vec<CategoryRule> {
    [
        ("bug", Category::BugReport),
        ("feature", Category::FeatureRequest),
        ("question", Category::Support),
        ("support", Category::Support),
    ]
    .into_iter()
    .map(|(tag, category)| CategoryRule {
        tag_contains: tag.to_owned(),
        category,
    })
    .collect()
}

/// Paged JSON HTTP endpoint a source is fetched from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub url: String,
    /// Dot path of the record array inside each response body.
    pub records_path: String,
    /// Dot path of the next-page cursor; absent or null ends paging.
    #[serde(default)]
    pub cursor_path: Option<String>,
    /// Environment variable holding a bearer token.
    #[serde(default)]
    pub token_env: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    100
}

/// Declaration of one data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub source: Source,
    /// Maximum outbound calls per window.
    pub window_limit: u32,
    /// Window length in seconds.
    pub window_secs: u64,
    /// Field mapping; omitted for sources with a built-in preset.
    #[serde(default)]
    pub fields: Option<FieldMapping>,
    #[serde(default)]
    pub endpoint: Option<EndpointConfig>,
}

impl SourceConfig {
    /// The declared mapping, falling back to the source's preset.
    #[must_use]
    pub fn field_mapping(&self) -> Option<FieldMapping> {
        self.fields
            .clone()
            .or_else(|| FieldMapping::preset(&self.source))
    }
}

#[derive(Debug, Deserialize)]
pub struct SourcesFile {
    pub sources: Vec<SourceConfig>,
}

impl SourcesFile {
    #[must_use]
    pub fn get(&self, source: &Source) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| &s.source == source)
    }
}

/// Load and validate the source declarations from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_sources(path: &Path) -> Result<SourcesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SourcesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_sources(&content)
}

/// Parse and validate source declarations from a YAML string.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_sources(yaml: &str) -> Result<SourcesFile, ConfigError> {
    let sources_file: SourcesFile = serde_yaml::from_str(yaml)?;
    validate_sources(&sources_file)?;
    Ok(sources_file)
}

fn validate_sources(sources_file: &SourcesFile) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for config in &sources_file.sources {
        if !seen.insert(config.source.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source: '{}'",
                config.source
            )));
        }

        if config.window_limit == 0 {
            return Err(ConfigError::Validation(format!(
                "source '{}' has window_limit 0; must be at least 1",
                config.source
            )));
        }

        if config.window_secs == 0 {
            return Err(ConfigError::Validation(format!(
                "source '{}' has window_secs 0; must be at least 1",
                config.source
            )));
        }

        if let Some(endpoint) = &config.endpoint {
            if endpoint.url.trim().is_empty() || endpoint.records_path.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "source '{}' declares an endpoint without `url` or `records_path`",
                    config.source
                )));
            }
            if endpoint.page_size == 0 {
                return Err(ConfigError::Validation(format!(
                    "source '{}' has endpoint page_size 0; must be at least 1",
                    config.source
                )));
            }
        }

        let Some(mapping) = config.field_mapping() else {
            return Err(ConfigError::Validation(format!(
                "source '{}' has no built-in mapping; declare `fields`",
                config.source
            )));
        };

        for (name, path) in [
            ("source_id", &mapping.source_id),
            ("content", &mapping.content),
            ("created_at", &mapping.created_at),
        ] {
            if path.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "source '{}' maps required field `{name}` to an empty path",
                    config.source
                )));
            }
        }
    }

    Ok(())
}
