//! JSON files the CLI uses to carry records and themes between runs.

use std::path::Path;

use anyhow::Context;
use fbp_core::{FeedbackQuery, FeedbackStore, MemoryStore, NormalizedFeedback, Theme};
use serde::{Deserialize, Serialize};

/// Persisted theme set plus the generation of the run that produced it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct ThemeState {
    pub generation: u64,
    pub themes: Vec<Theme>,
}

/// Read a record snapshot. A missing file is an empty snapshot.
pub(crate) async fn read_records(path: &Path) -> anyhow::Result<Vec<NormalizedFeedback>> {
    if !tokio::fs::try_exists(path).await? {
        return Ok(Vec::new());
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

pub(crate) async fn write_records(path: &Path, records: &[NormalizedFeedback]) -> anyhow::Result<()> {
    write_json(path, &records).await
}

/// Read the theme state. A missing file means no previous run.
pub(crate) async fn read_themes(path: &Path) -> anyhow::Result<ThemeState> {
    if !tokio::fs::try_exists(path).await? {
        return Ok(ThemeState::default());
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

pub(crate) async fn write_themes(path: &Path, state: &ThemeState) -> anyhow::Result<()> {
    write_json(path, state).await
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("failed to write {}", path.display()))
}

/// Load a snapshot into a fresh store so upserts dedupe against it.
pub(crate) async fn load_store(path: &Path) -> anyhow::Result<MemoryStore> {
    let store = MemoryStore::new();
    let records = read_records(path).await?;
    let count = records.len();
    for record in records {
        store.upsert(record).await?;
    }
    tracing::debug!(path = %path.display(), records = count, "snapshot loaded");
    Ok(store)
}

/// Every record in the store, newest first.
pub(crate) async fn all_records(store: &MemoryStore) -> anyhow::Result<Vec<NormalizedFeedback>> {
    Ok(store.query(&FeedbackQuery::default()).await?)
}
