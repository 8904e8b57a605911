//! Factor selection, weights, tier sub-scores and level thresholds.

use std::collections::BTreeSet;

use chrono::Duration;
use fbp_core::{AppConfig, CustomerTier, PriorityLevel};
use serde::{Deserialize, Serialize};

use crate::error::PriorityError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    CustomerTier,
    Sentiment,
    Frequency,
    Recency,
}

impl Factor {
    pub const ALL: [Factor; 4] = [
        Factor::CustomerTier,
        Factor::Sentiment,
        Factor::Frequency,
        Factor::Recency,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Factor::CustomerTier => "customer_tier",
            Factor::Sentiment => "sentiment",
            Factor::Frequency => "frequency",
            Factor::Recency => "recency",
        }
    }
}

impl std::fmt::Display for Factor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Factor {
    type Err = PriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "customer_tier" | "tier" => Ok(Factor::CustomerTier),
            "sentiment" => Ok(Factor::Sentiment),
            "frequency" => Ok(Factor::Frequency),
            "recency" => Ok(Factor::Recency),
            other => Err(PriorityError::UnknownFactor(other.to_owned())),
        }
    }
}

/// The enabled factors. Duplicates collapse; iteration order is fixed.
pub type FactorSet = BTreeSet<Factor>;

/// Every factor enabled.
#[must_use]
pub fn all_factors() -> FactorSet {
    Factor::ALL.into_iter().collect()
}

/// Parse factor names, e.g. from a comma-separated CLI flag.
///
/// # Errors
///
/// Returns [`PriorityError::UnknownFactor`] for an unrecognized name.
pub fn parse_factors<S: AsRef<str>>(names: &[S]) -> Result<FactorSet, PriorityError> {
    names.iter().map(|n| n.as_ref().parse()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorWeights {
    pub customer_tier: f64,
    pub sentiment: f64,
    pub frequency: f64,
    pub recency: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            customer_tier: 0.35,
            sentiment: 0.30,
            frequency: 0.20,
            recency: 0.15,
        }
    }
}

impl FactorWeights {
    #[must_use]
    pub fn get(&self, factor: Factor) -> f64 {
        match factor {
            Factor::CustomerTier => self.customer_tier,
            Factor::Sentiment => self.sentiment,
            Factor::Frequency => self.frequency,
            Factor::Recency => self.recency,
        }
    }
}

/// Tier sub-scores in `[0.0, 1.0]`, non-decreasing with tier rank.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierScores {
    pub free: f64,
    pub professional: f64,
    pub business: f64,
    pub enterprise: f64,
}

impl Default for TierScores {
    fn default() -> Self {
        Self {
            free: 0.25,
            professional: 0.5,
            business: 0.75,
            enterprise: 1.0,
        }
    }
}

impl TierScores {
    #[must_use]
    pub fn get(&self, tier: CustomerTier) -> f64 {
        match tier {
            CustomerTier::Free => self.free,
            CustomerTier::Professional => self.professional,
            CustomerTier::Business => self.business,
            CustomerTier::Enterprise => self.enterprise,
        }
    }
}

/// Minimum impact score for each level; anything below `medium` is low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityThresholds {
    pub critical: u8,
    pub high: u8,
    pub medium: u8,
}

impl Default for PriorityThresholds {
    fn default() -> Self {
        Self {
            critical: 90,
            high: 70,
            medium: 40,
        }
    }
}

impl PriorityThresholds {
    #[must_use]
    pub fn level_for(&self, score: u8) -> PriorityLevel {
        if score >= self.critical {
            PriorityLevel::Critical
        } else if score >= self.high {
            PriorityLevel::High
        } else if score >= self.medium {
            PriorityLevel::Medium
        } else {
            PriorityLevel::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriorityConfig {
    pub weights: FactorWeights,
    pub tier_scores: TierScores,
    pub thresholds: PriorityThresholds,
    /// Age at which the recency sub-score halves.
    pub half_life: Duration,
    /// Frequency at which the frequency sub-score saturates.
    pub frequency_cap: usize,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            weights: FactorWeights::default(),
            tier_scores: TierScores::default(),
            thresholds: PriorityThresholds::default(),
            half_life: Duration::hours(168),
            frequency_cap: 25,
        }
    }
}

impl PriorityConfig {
    /// # Errors
    ///
    /// Returns [`PriorityError::InvalidConfig`] if the half-life is out of
    /// range.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, PriorityError> {
        let hours = i64::try_from(config.priority_half_life_hours).map_err(|_| {
            PriorityError::InvalidConfig("half-life hours out of range".to_owned())
        })?;
        let half_life = Duration::try_hours(hours).ok_or_else(|| {
            PriorityError::InvalidConfig("half-life hours out of range".to_owned())
        })?;
        let priority = Self {
            half_life,
            ..Self::default()
        };
        priority.validate()?;
        Ok(priority)
    }

    /// # Errors
    ///
    /// Returns [`PriorityError::InvalidConfig`] for negative or non-finite
    /// weights, tier scores outside `[0, 1]` or decreasing with rank,
    /// thresholds that are not strictly descending, a non-positive
    /// half-life, or a zero frequency cap.
    pub fn validate(&self) -> Result<(), PriorityError> {
        let invalid = |msg: String| Err(PriorityError::InvalidConfig(msg));

        for factor in Factor::ALL {
            let w = self.weights.get(factor);
            if !w.is_finite() || w < 0.0 {
                return invalid(format!("weight for {factor} must be >= 0, got {w}"));
            }
        }

        let mut previous = 0.0;
        for tier in CustomerTier::ALL {
            let s = self.tier_scores.get(tier);
            if !(0.0..=1.0).contains(&s) {
                return invalid(format!("tier score for {} must be in [0, 1], got {s}", tier.as_str()));
            }
            if s < previous {
                return invalid(format!(
                    "tier scores must not decrease with tier rank ({} is {s})",
                    tier.as_str()
                ));
            }
            previous = s;
        }

        let t = self.thresholds;
        if !(t.critical <= 100 && t.critical > t.high && t.high > t.medium) {
            return invalid(format!(
                "thresholds must be descending and at most 100 (critical {}, high {}, medium {})",
                t.critical, t.high, t.medium
            ));
        }

        if self.half_life <= Duration::zero() {
            return invalid("half-life must be positive".to_owned());
        }
        if self.frequency_cap == 0 {
            return invalid("frequency cap must be at least 1".to_owned());
        }
        Ok(())
    }
}
