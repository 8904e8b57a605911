//! `ingest` command: sync declared sources, or a local export, into a
//! record snapshot.
//!
//! Each source syncs concurrently under its own rate limiter. A failed
//! source is reported and skipped; records from the others are still
//! written.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use fbp_core::{load_sources, AppConfig, FieldMapping, Source, SourcesFile};
use fbp_ingest::{
    sync_all, FetchRequest, HttpAdapter, JsonFileAdapter, RateLimiter, RetryPolicy, SourceSync,
};
use tokio_util::sync::CancellationToken;

use crate::snapshot;

/// Slots per second for local exports, which have no remote quota.
const LOCAL_WINDOW_LIMIT: u32 = 1000;

#[derive(Debug, Clone)]
pub(crate) struct IngestOptions {
    pub source: Option<Source>,
    pub file: Option<PathBuf>,
    pub since: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
    pub limit: Option<usize>,
    pub out: PathBuf,
    pub dry_run: bool,
}

impl IngestOptions {
    fn request(&self) -> FetchRequest {
        FetchRequest {
            start_date: self.since.and_then(start_of_day),
            end_date: self.until.and_then(end_of_day),
            limit: self.limit,
            cursor: None,
        }
    }
}

fn start_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
}

fn end_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(23, 59, 59).map(|dt| dt.and_utc())
}

/// Build one HTTP sync per declared source with an endpoint.
///
/// Sources without an endpoint or a usable field mapping are skipped with a
/// warning.
///
/// # Errors
///
/// Returns an error if an HTTP client cannot be constructed.
pub(crate) fn build_http_syncs(
    config: &AppConfig,
    sources: &SourcesFile,
    filter: Option<&Source>,
) -> anyhow::Result<Vec<SourceSync>> {
    let mut syncs = Vec::new();
    for declared in sources
        .sources
        .iter()
        .filter(|s| filter.is_none_or(|f| f == &s.source))
    {
        let Some(endpoint) = declared.endpoint.clone() else {
            tracing::warn!(source = %declared.source, "skipping source: no endpoint declared");
            continue;
        };
        let Some(mapping) = declared.field_mapping() else {
            tracing::warn!(source = %declared.source, "skipping source: no field mapping");
            continue;
        };
        let token = endpoint
            .token_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok());
        if endpoint.token_env.is_some() && token.is_none() {
            tracing::warn!(source = %declared.source, "token env var not set, fetching unauthenticated");
        }

        let adapter = HttpAdapter::new(
            declared.source.clone(),
            mapping,
            endpoint,
            token,
            config.request_timeout_secs,
        )
        .map_err(|e| anyhow::anyhow!("failed to build client for {}: {e}", declared.source))?;

        syncs.push(SourceSync::new(
            Box::new(adapter),
            RateLimiter::from_config(declared),
            RetryPolicy::from_config(config),
        ));
    }
    Ok(syncs)
}

/// Build a sync over a local JSON export.
///
/// The mapping comes from the source's declaration when one exists, else
/// from the built-in preset.
///
/// # Errors
///
/// Returns an error if no mapping is known for `source` or the file cannot
/// be loaded.
pub(crate) async fn build_file_sync(
    config: &AppConfig,
    sources: Option<&SourcesFile>,
    source: &Source,
    path: &Path,
) -> anyhow::Result<SourceSync> {
    let declared = sources.and_then(|s| s.get(source));
    let mapping = declared
        .and_then(fbp_core::SourceConfig::field_mapping)
        .or_else(|| FieldMapping::preset(source))
        .ok_or_else(|| anyhow::anyhow!("no field mapping declared or built in for '{source}'"))?;

    let adapter = JsonFileAdapter::load(path, source.clone(), mapping).await?;
    let limiter = declared.map_or_else(
        || RateLimiter::new(LOCAL_WINDOW_LIMIT, Duration::from_secs(1)),
        RateLimiter::from_config,
    );
    Ok(SourceSync::new(
        Box::new(adapter),
        limiter,
        RetryPolicy::from_config(config),
    ))
}

/// Run the ingest command.
///
/// # Errors
///
/// Returns an error if the sources file or export cannot be loaded, no
/// source is selected, or the snapshot cannot be read or written. Individual
/// source failures are printed and skipped.
pub(crate) async fn run_ingest(
    config: &AppConfig,
    options: &IngestOptions,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let syncs = if let Some(path) = &options.file {
        let source = options
            .source
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("--file requires --source"))?;
        let sources = match load_sources(&config.sources_path) {
            Ok(sources) => Some(sources),
            Err(e) => {
                tracing::debug!(error = %e, "no usable sources file, using preset mapping");
                None
            }
        };
        vec![build_file_sync(config, sources.as_ref(), source, path).await?]
    } else {
        let sources = load_sources(&config.sources_path)?;
        build_http_syncs(config, &sources, options.source.as_ref())?
    };

    if syncs.is_empty() {
        println!("no sources selected; declare endpoints in {}", config.sources_path.display());
        return Ok(());
    }

    if options.dry_run {
        let names: Vec<String> = syncs.iter().map(|s| s.source().to_string()).collect();
        println!(
            "dry-run: would sync {} sources: [{}] into {}",
            syncs.len(),
            names.join(", "),
            options.out.display()
        );
        return Ok(());
    }

    let store = snapshot::load_store(&options.out).await?;
    let results = sync_all(&syncs, &store, &options.request(), cancel).await;

    println!(
        "{:<16}{:<8}{:<10}{:<10}{:<10}{:<10}STATUS",
        "SOURCE", "PAGES", "FETCHED", "INSERTED", "UPDATED", "SKIPPED"
    );
    let mut failed = 0_usize;
    for (source, result) in &results {
        match result {
            Ok(report) => println!(
                "{:<16}{:<8}{:<10}{:<10}{:<10}{:<10}{}",
                source.as_str(),
                report.pages,
                report.fetched,
                report.inserted,
                report.updated,
                report.skipped,
                if report.cancelled { "cancelled" } else { "ok" }
            ),
            Err(e) => {
                failed += 1;
                println!("{:<16}{:<48}failed: {e}", source.as_str(), "");
            }
        }
    }

    let records = snapshot::all_records(&store).await?;
    snapshot::write_records(&options.out, &records).await?;
    println!(
        "\n{} records written to {} ({failed} of {} sources failed)",
        records.len(),
        options.out.display(),
        results.len()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use fbp_core::{build_app_config, parse_sources};

    use super::*;

    fn config() -> AppConfig {
        build_app_config(|_| Err(std::env::VarError::NotPresent)).unwrap()
    }

    #[test]
    fn http_syncs_skip_sources_without_endpoint() {
        let sources = parse_sources(
            r"
sources:
  - source: zendesk
    window_limit: 10
    window_secs: 60
    endpoint:
      url: https://example.zendesk.com/api/v2/tickets.json
      records_path: tickets
  - source: intercom
    window_limit: 10
    window_secs: 60
",
        )
        .unwrap();

        let syncs = build_http_syncs(&config(), &sources, None).unwrap();
        assert_eq!(syncs.len(), 1);
        assert_eq!(syncs[0].source(), &Source::Zendesk);

        let filtered = build_http_syncs(&config(), &sources, Some(&Source::Intercom)).unwrap();
        assert!(filtered.is_empty());
    }

    #[test]
    fn request_covers_whole_days() {
        let options = IngestOptions {
            source: None,
            file: None,
            since: NaiveDate::from_ymd_opt(2024, 3, 1),
            until: NaiveDate::from_ymd_opt(2024, 3, 2),
            limit: Some(50),
            out: PathBuf::from("feedback.json"),
            dry_run: false,
        };
        let request = options.request();
        assert_eq!(
            request.start_date.unwrap().to_rfc3339(),
            "2024-03-01T00:00:00+00:00"
        );
        assert_eq!(
            request.end_date.unwrap().to_rfc3339(),
            "2024-03-02T23:59:59+00:00"
        );
        assert_eq!(request.limit, Some(50));
    }

    #[tokio::test]
    async fn file_ingest_dedupes_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let export = dir.path().join("export.json");
        std::fs::write(
            &export,
            r#"{"tickets": [
                {"id": 1, "subject": "Export", "description": "csv export is slow", "created_at": "2024-03-01T10:00:00Z"},
                {"id": 2, "subject": "Empty", "description": "", "created_at": "2024-03-01T11:00:00Z"},
                {"id": 3, "subject": "Login", "description": "cannot log in", "created_at": "2024-03-02T09:00:00Z"}
            ]}"#,
        )
        .unwrap();

        let options = IngestOptions {
            source: Some(Source::Zendesk),
            file: Some(export),
            since: None,
            until: None,
            limit: None,
            out: dir.path().join("feedback.json"),
            dry_run: false,
        };
        let mut config = config();
        config.sources_path = dir.path().join("missing.yaml");
        let cancel = CancellationToken::new();

        run_ingest(&config, &options, &cancel).await.unwrap();
        run_ingest(&config, &options, &cancel).await.unwrap();

        let records = snapshot::read_records(&options.out).await.unwrap();
        assert_eq!(records.len(), 2);
    }
}
