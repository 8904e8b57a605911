//! Derived theme clusters and their membership relation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ThemeId = Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeStatus {
    #[default]
    Active,
    /// No members for too many consecutive runs. Retired themes are kept,
    /// never deleted, so a later run can revive them.
    Retired,
}

/// A cluster of related feedback with a human-readable label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub id: ThemeId,
    pub name: String,
    /// Most representative keyword first.
    pub keywords: Vec<String>,
    /// Member count in the run that produced this snapshot.
    pub frequency: usize,
    /// Mean member-to-centroid similarity in `[0.0, 1.0]`.
    pub confidence: f32,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub status: ThemeStatus,
    /// Consecutive runs in which the theme had no members.
    #[serde(default)]
    pub empty_runs: u32,
    /// Frequency per run, oldest first.
    #[serde(default)]
    pub history: Vec<usize>,
}

impl Theme {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ThemeStatus::Active
    }
}

/// One feedback record's membership in one theme for a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeMembership {
    pub theme_id: ThemeId,
    pub feedback_id: Uuid,
    /// Similarity of the record to the theme centroid.
    pub relevance: f32,
}
