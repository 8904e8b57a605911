//! Cross-run theme matching: persisting, emerging, declining and retired.

use std::collections::{BTreeMap, BTreeSet};

use fbp_core::{Theme, ThemeId, ThemeMembership, ThemeStatus};
use serde::Serialize;

use crate::config::EvolutionConfig;

/// Growth above this rate is `Growing`.
const GROWING_RATE: f32 = 0.5;
/// Growth below this rate is `Shrinking`.
const SHRINKING_RATE: f32 = -0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Growth {
    Growing,
    Steady,
    Shrinking,
}

impl Growth {
    fn classify(rate: f32) -> Self {
        if rate > GROWING_RATE {
            Growth::Growing
        } else if rate < SHRINKING_RATE {
            Growth::Shrinking
        } else {
            Growth::Steady
        }
    }
}

/// A current theme matched to a previous one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistingTheme {
    /// Merged theme: previous identity, current content.
    pub theme: Theme,
    pub previous_frequency: usize,
    /// `(new - old) / old`; 1.0 when the previous run had no members.
    pub growth_rate: f32,
    pub growth: Growth,
    pub similarity: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvolutionReport {
    pub persisting: Vec<PersistingTheme>,
    /// Current themes with no previous match.
    pub emerging: Vec<Theme>,
    /// Previously active themes with no members this run.
    pub declining: Vec<Theme>,
    /// Subset of `declining` retired by this run.
    pub retired: Vec<Theme>,
    /// Full theme set to persist, sorted by frequency then name.
    pub themes: Vec<Theme>,
    /// Current-run id to persisted id for matched themes.
    pub id_map: BTreeMap<ThemeId, ThemeId>,
}

impl EvolutionReport {
    /// Point memberships from the current run at persisted theme ids.
    pub fn remap_memberships(&self, memberships: &mut [ThemeMembership]) {
        for membership in memberships {
            if let Some(&persisted) = self.id_map.get(&membership.theme_id) {
                membership.theme_id = persisted;
            }
        }
    }
}

/// Jaccard similarity of two keyword sets; zero when both are empty.
#[must_use]
pub fn keyword_similarity(a: &[String], b: &[String]) -> f32 {
    let a: BTreeSet<&str> = a.iter().map(String::as_str).collect();
    let b: BTreeSet<&str> = b.iter().map(String::as_str).collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let similarity = a.intersection(&b).count() as f32 / union as f32;
    similarity
}

fn growth_rate(old: usize, new: usize) -> f32 {
    if old == 0 {
        return 1.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let rate = (new as f32 - old as f32) / old as f32;
    rate
}

fn sort_themes(themes: &mut [Theme]) {
    themes.sort_by(|a, b| b.frequency.cmp(&a.frequency).then_with(|| a.name.cmp(&b.name)));
}

/// Compare the persisted theme set with a fresh extraction.
///
/// Pairs at or above the match threshold are matched greedily one-to-one in
/// descending similarity. Neither input is modified.
#[must_use]
pub fn track_evolution(
    previous: &[Theme],
    current: &[Theme],
    config: &EvolutionConfig,
) -> EvolutionReport {
    let mut candidates: Vec<(f32, usize, usize)> = Vec::new();
    for (p, prev) in previous.iter().enumerate() {
        for (c, curr) in current.iter().enumerate() {
            let similarity = keyword_similarity(&prev.keywords, &curr.keywords);
            if similarity >= config.match_threshold {
                candidates.push((similarity, p, c));
            }
        }
    }
    candidates.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then_with(|| previous[a.1].name.cmp(&previous[b.1].name))
            .then_with(|| current[a.2].name.cmp(&current[b.2].name))
    });

    let mut matched_previous: BTreeMap<usize, (usize, f32)> = BTreeMap::new();
    let mut matched_current: BTreeSet<usize> = BTreeSet::new();
    for (similarity, p, c) in candidates {
        if matched_previous.contains_key(&p) || matched_current.contains(&c) {
            continue;
        }
        matched_previous.insert(p, (c, similarity));
        matched_current.insert(c);
    }

    let mut report = EvolutionReport::default();

    for (&p, &(c, similarity)) in &matched_previous {
        let prev = &previous[p];
        let curr = &current[c];
        let mut history = prev.history.clone();
        history.push(curr.frequency);
        let merged = Theme {
            id: prev.id,
            first_seen: prev.first_seen.min(curr.first_seen),
            last_seen: curr.last_seen.max(prev.last_seen),
            status: ThemeStatus::Active,
            empty_runs: 0,
            history,
            ..curr.clone()
        };
        let rate = growth_rate(prev.frequency, curr.frequency);
        report.id_map.insert(curr.id, prev.id);
        report.themes.push(merged.clone());
        report.persisting.push(PersistingTheme {
            theme: merged,
            previous_frequency: prev.frequency,
            growth_rate: rate,
            growth: Growth::classify(rate),
            similarity,
        });
    }

    for (c, curr) in current.iter().enumerate() {
        if !matched_current.contains(&c) {
            report.emerging.push(curr.clone());
            report.themes.push(curr.clone());
        }
    }

    for (p, prev) in previous.iter().enumerate() {
        if matched_previous.contains_key(&p) {
            continue;
        }
        if !prev.is_active() {
            report.themes.push(prev.clone());
            continue;
        }
        let mut declined = prev.clone();
        declined.frequency = 0;
        declined.empty_runs += 1;
        declined.history.push(0);
        if declined.empty_runs >= config.retire_after_runs {
            declined.status = ThemeStatus::Retired;
            report.retired.push(declined.clone());
        }
        report.declining.push(declined.clone());
        report.themes.push(declined);
    }

    report.persisting.sort_by(|a, b| {
        b.theme
            .frequency
            .cmp(&a.theme.frequency)
            .then_with(|| a.theme.name.cmp(&b.theme.name))
    });
    sort_themes(&mut report.emerging);
    sort_themes(&mut report.declining);
    sort_themes(&mut report.retired);
    sort_themes(&mut report.themes);

    tracing::info!(
        persisting = report.persisting.len(),
        emerging = report.emerging.len(),
        declining = report.declining.len(),
        retired = report.retired.len(),
        "theme evolution tracked"
    );

    report
}

#[cfg(test)]
#[path = "evolution_test.rs"]
mod tests;
