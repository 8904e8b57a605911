//! Multi-factor impact scoring and ranking.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use fbp_core::{NormalizedFeedback, PriorityLevel, Theme, ThemeId, ThemeMembership};
use serde::Serialize;
use uuid::Uuid;

use crate::config::{Factor, FactorSet, PriorityConfig};
use crate::error::PriorityError;

/// Per-record inputs that do not live on the record itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringContext {
    /// Reference instant for recency decay.
    pub now: DateTime<Utc>,
    /// Theme membership count plus duplicate reports.
    pub frequency: usize,
}

impl ScoringContext {
    #[must_use]
    pub fn new(now: DateTime<Utc>, frequency: usize) -> Self {
        Self { now, frequency }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactorContribution {
    pub factor: Factor,
    /// Sub-score in `[0.0, 1.0]`.
    pub sub_score: f64,
    /// Weight after renormalization over the enabled factors.
    pub weight: f64,
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactAssessment {
    pub impact_score: u8,
    pub priority_level: PriorityLevel,
    pub contributions: Vec<FactorContribution>,
}

/// A record index paired with its assessment, as returned by [`PriorityScorer::rank`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedFeedback {
    pub index: usize,
    pub id: Uuid,
    pub assessment: ImpactAssessment,
}

#[derive(Debug, Clone)]
pub struct PriorityScorer {
    config: PriorityConfig,
}

impl PriorityScorer {
    /// # Errors
    ///
    /// Returns [`PriorityError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: PriorityConfig) -> Result<Self, PriorityError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &PriorityConfig {
        &self.config
    }

    /// Sub-score for one factor, in `[0.0, 1.0]`.
    #[must_use]
    pub fn sub_score(
        &self,
        factor: Factor,
        record: &NormalizedFeedback,
        ctx: &ScoringContext,
    ) -> f64 {
        match factor {
            Factor::CustomerTier => self.config.tier_scores.get(record.customer_tier),
            Factor::Sentiment => {
                let s = f64::from(record.sentiment_score.unwrap_or(0.0)).clamp(-1.0, 1.0);
                (1.0 - s) / 2.0
            }
            Factor::Frequency => {
                #[allow(clippy::cast_precision_loss)]
                let (f, cap) = (ctx.frequency as f64, self.config.frequency_cap as f64);
                ((1.0 + f).ln() / (1.0 + cap).ln()).min(1.0)
            }
            Factor::Recency => {
                let age = (ctx.now - record.created_at).max(chrono::Duration::zero());
                #[allow(clippy::cast_precision_loss)]
                let ratio = age.num_seconds() as f64 / self.config.half_life.num_seconds() as f64;
                0.5_f64.powf(ratio)
            }
        }
    }

    /// Score one record over the enabled factors.
    ///
    /// Weights are renormalized over `factors`, so the result stays on the
    /// same 0-100 scale whichever subset is enabled. With no factors, or
    /// only zero-weight ones, the score is 0.
    #[must_use]
    pub fn score(
        &self,
        record: &NormalizedFeedback,
        factors: &FactorSet,
        ctx: &ScoringContext,
    ) -> ImpactAssessment {
        let total: f64 = factors.iter().map(|&f| self.config.weights.get(f)).sum();

        let contributions: Vec<FactorContribution> = factors
            .iter()
            .map(|&factor| {
                let sub_score = self.sub_score(factor, record, ctx);
                let weight = if total > 0.0 {
                    self.config.weights.get(factor) / total
                } else {
                    0.0
                };
                FactorContribution {
                    factor,
                    sub_score,
                    weight,
                    contribution: sub_score * weight,
                }
            })
            .collect();

        let weighted: f64 = contributions.iter().map(|c| c.contribution).sum();
        let impact_score = to_score(weighted);

        ImpactAssessment {
            impact_score,
            priority_level: self.config.thresholds.level_for(impact_score),
            contributions,
        }
    }

    /// Score every record and order by score desc, then `created_at` desc,
    /// then id.
    ///
    /// # Errors
    ///
    /// Returns [`PriorityError::ContextMismatch`] unless there is exactly one
    /// context per record.
    pub fn rank(
        &self,
        records: &[NormalizedFeedback],
        factors: &FactorSet,
        contexts: &[ScoringContext],
    ) -> Result<Vec<RankedFeedback>, PriorityError> {
        if records.len() != contexts.len() {
            return Err(PriorityError::ContextMismatch {
                records: records.len(),
                contexts: contexts.len(),
            });
        }

        let mut ranked: Vec<RankedFeedback> = records
            .iter()
            .zip(contexts)
            .enumerate()
            .map(|(index, (record, ctx))| RankedFeedback {
                index,
                id: record.id,
                assessment: self.score(record, factors, ctx),
            })
            .collect();

        ranked.sort_by(|a, b| compare_ranked(records, a, b));

        tracing::debug!(
            records = ranked.len(),
            factors = factors.len(),
            top_score = ranked.first().map(|r| r.assessment.impact_score),
            "feedback ranked"
        );
        Ok(ranked)
    }
}

fn compare_ranked(records: &[NormalizedFeedback], a: &RankedFeedback, b: &RankedFeedback) -> Ordering {
    b.assessment
        .impact_score
        .cmp(&a.assessment.impact_score)
        .then_with(|| records[b.index].created_at.cmp(&records[a.index].created_at))
        .then_with(|| a.id.cmp(&b.id))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_score(weighted: f64) -> u8 {
    if !weighted.is_finite() {
        return 0;
    }
    (weighted * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Per-record frequency: the summed sizes of every theme the record belongs to.
///
/// Theme size is the theme's recorded frequency, or the membership count for
/// themes missing from `themes`.
#[must_use]
pub fn frequency_index(
    themes: &[Theme],
    memberships: &[ThemeMembership],
) -> BTreeMap<Uuid, usize> {
    let mut sizes: BTreeMap<ThemeId, usize> = BTreeMap::new();
    for membership in memberships {
        *sizes.entry(membership.theme_id).or_default() += 1;
    }
    for theme in themes {
        if sizes.contains_key(&theme.id) {
            sizes.insert(theme.id, theme.frequency);
        }
    }

    let mut index: BTreeMap<Uuid, usize> = BTreeMap::new();
    for membership in memberships {
        let size = sizes.get(&membership.theme_id).copied().unwrap_or(0);
        *index.entry(membership.feedback_id).or_default() += size;
    }
    index
}

/// Build one context per record from a frequency index and optional
/// duplicate counts (indexed like `records`).
#[must_use]
pub fn contexts_for(
    records: &[NormalizedFeedback],
    index: &BTreeMap<Uuid, usize>,
    duplicates: &[usize],
    now: DateTime<Utc>,
) -> Vec<ScoringContext> {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let themed = index.get(&record.id).copied().unwrap_or(0);
            let dupes = duplicates.get(i).copied().unwrap_or(0);
            ScoringContext::new(now, themed + dupes)
        })
        .collect()
}

/// Write ranked assessments back onto their records.
///
/// Runs only after every record has been scored, so a failure upstream
/// leaves all records untouched.
pub fn apply(records: &mut [NormalizedFeedback], ranked: &[RankedFeedback]) {
    for entry in ranked {
        if let Some(record) = records.get_mut(entry.index) {
            if record.id == entry.id {
                record.impact_score = Some(entry.assessment.impact_score);
                record.priority_level = Some(entry.assessment.priority_level);
            }
        }
    }
}

#[cfg(test)]
#[path = "score_test.rs"]
mod tests;
