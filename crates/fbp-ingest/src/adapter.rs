//! Source adapters: the per-service fetch side of ingestion.
//!
//! Adapters only return raw JSON pages. Rate limiting, retries and
//! normalization are applied uniformly by [`crate::SourceSync`].

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fbp_core::{EndpointConfig, FieldMapping, Source};
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::error::SourceError;
use crate::normalize::{lookup, parse_timestamp};

/// Top-level keys searched for the record array in JSON exports.
const EXPORT_ARRAY_KEYS: &[&str] = &["records", "data", "tickets", "conversations", "responses"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Maximum number of records to return across all pages.
    pub limit: Option<usize>,
    /// Opaque cursor from the previous page.
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchPage {
    pub records: Vec<Value>,
    pub next_cursor: Option<String>,
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> &Source;

    fn field_mapping(&self) -> &FieldMapping;

    /// Fetch one page of raw records.
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchPage, SourceError>;
}

fn in_range(raw: &Value, mapping: &FieldMapping, request: &FetchRequest) -> bool {
    let Some(created_at) = lookup(raw, &mapping.created_at).and_then(parse_timestamp) else {
        // Let normalization report unparsable records.
        return true;
    };
    request.start_date.is_none_or(|start| created_at >= start)
        && request.end_date.is_none_or(|end| created_at <= end)
}

// ---------------------------------------------------------------------------
// JsonFileAdapter
// ---------------------------------------------------------------------------

/// Serves records from a local JSON export, paged by offset.
#[derive(Debug, Clone)]
pub struct JsonFileAdapter {
    source: Source,
    mapping: FieldMapping,
    records: Vec<Value>,
    page_size: usize,
}

impl JsonFileAdapter {
    #[must_use]
    pub fn new(source: Source, mapping: FieldMapping, records: Vec<Value>) -> Self {
        Self {
            source,
            mapping,
            records,
            page_size: 100,
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Read a JSON array, or an object wrapping one under a common export
    /// key such as `tickets` or `data`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Io`] if the file cannot be read and
    /// [`SourceError::Malformed`] if it holds no record array.
    pub async fn load(
        path: &Path,
        source: Source,
        mapping: FieldMapping,
    ) -> Result<Self, SourceError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SourceError::Io {
                path: path.display().to_string(),
                source: e,
            })?;
        let value: Value = serde_json::from_str(&content)
            .map_err(|e| SourceError::Malformed(format!("{}: {e}", path.display())))?;

        let records = match value {
            Value::Array(items) => items,
            Value::Object(mut obj) => EXPORT_ARRAY_KEYS
                .iter()
                .find_map(|key| match obj.remove(*key) {
                    Some(Value::Array(items)) => Some(items),
                    _ => None,
                })
                .ok_or_else(|| {
                    SourceError::Malformed(format!("{}: no record array found", path.display()))
                })?,
            _ => {
                return Err(SourceError::Malformed(format!(
                    "{}: expected a JSON array",
                    path.display()
                )))
            }
        };

        Ok(Self::new(source, mapping, records))
    }
}

#[async_trait]
impl SourceAdapter for JsonFileAdapter {
    fn source(&self) -> &Source {
        &self.source
    }

    fn field_mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<FetchPage, SourceError> {
        let offset = match &request.cursor {
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| SourceError::Malformed(format!("invalid cursor {cursor:?}")))?,
            None => 0,
        };
        let page_size = request
            .limit
            .map_or(self.page_size, |l| l.min(self.page_size));

        let matching: Vec<&Value> = self
            .records
            .iter()
            .filter(|raw| in_range(raw, &self.mapping, request))
            .collect();

        let end = (offset + page_size).min(matching.len());
        let records = matching
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|v| (*v).clone())
            .collect();
        let next_cursor = (end < matching.len()).then(|| end.to_string());

        Ok(FetchPage {
            records,
            next_cursor,
        })
    }
}

// ---------------------------------------------------------------------------
// HttpAdapter
// ---------------------------------------------------------------------------

/// Fetches pages from a JSON HTTP API described by an [`EndpointConfig`].
///
/// Query parameters: `per_page`, `cursor`, `start_time` and `end_time`
/// (unix seconds). Status codes map onto [`SourceError`] so the sync loop
/// can tell transient from permanent failures.
pub struct HttpAdapter {
    client: Client,
    source: Source,
    mapping: FieldMapping,
    endpoint: EndpointConfig,
    token: Option<String>,
}

impl HttpAdapter {
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(
        source: Source,
        mapping: FieldMapping,
        endpoint: EndpointConfig,
        token: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("fbp-ingest/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            source,
            mapping,
            endpoint,
            token,
        })
    }

    fn query(&self, request: &FetchRequest) -> Vec<(&'static str, String)> {
        let per_page = request
            .limit
            .map_or(self.endpoint.page_size, |l| l.min(self.endpoint.page_size));
        let mut query = vec![("per_page", per_page.to_string())];
        if let Some(cursor) = &request.cursor {
            query.push(("cursor", cursor.clone()));
        }
        if let Some(start) = request.start_date {
            query.push(("start_time", start.timestamp().to_string()));
        }
        if let Some(end) = request.end_date {
            query.push(("end_time", end.timestamp().to_string()));
        }
        query
    }
}

#[async_trait]
impl SourceAdapter for HttpAdapter {
    fn source(&self) -> &Source {
        &self.source
    }

    fn field_mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<FetchPage, SourceError> {
        let mut builder = self
            .client
            .get(&self.endpoint.url)
            .query(&self.query(request));
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout
            } else {
                SourceError::Http(e)
            }
        })?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok());
            return Err(SourceError::RateLimited { retry_after_secs });
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SourceError::Unauthorized(format!(
                "HTTP {} from {}",
                status.as_u16(),
                self.endpoint.url
            )));
        }
        if status.is_server_error() {
            return Err(SourceError::Unavailable {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(SourceError::Rejected {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let parsed: Value = serde_json::from_str(&body).map_err(|e| {
            SourceError::Malformed(format!("page from {}: {e}", self.endpoint.url))
        })?;

        let records = match lookup(&parsed, &self.endpoint.records_path) {
            Some(Value::Array(items)) => items.clone(),
            Some(_) => {
                return Err(SourceError::Malformed(format!(
                    "`{}` is not an array",
                    self.endpoint.records_path
                )))
            }
            None => Vec::new(),
        };

        let next_cursor = self
            .endpoint
            .cursor_path
            .as_deref()
            .and_then(|path| lookup(&parsed, path))
            .and_then(|v| match v {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });

        tracing::debug!(
            source = %self.source,
            records = records.len(),
            has_next = next_cursor.is_some(),
            "fetched page"
        );

        Ok(FetchPage {
            records,
            next_cursor,
        })
    }
}
