use fbp_core::{AppConfig, SentimentLabel};
use serde::{Deserialize, Serialize};

/// Signed polarity and certainty reported by one classifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Polarity {
    /// In `[-1.0, 1.0]`.
    pub score: f32,
    /// In `[0.0, 1.0]`.
    pub confidence: f32,
}

impl Polarity {
    #[must_use]
    pub fn new(score: f32, confidence: f32) -> Self {
        Self {
            score: clamp_finite(score, -1.0, 1.0),
            confidence: clamp_finite(confidence, 0.0, 1.0),
        }
    }
}

fn clamp_finite(value: f32, min: f32, max: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        0.0
    }
}

/// Which path produced an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Model,
    Lexicon,
    /// Every classifier failed; the record was scored neutral.
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentAssessment {
    pub label: SentimentLabel,
    pub score: f32,
    pub confidence: f32,
    pub strategy: Strategy,
}

impl SentimentAssessment {
    #[must_use]
    pub fn neutral() -> Self {
        Self {
            label: SentimentLabel::Neutral,
            score: 0.0,
            confidence: 0.0,
            strategy: Strategy::Neutral,
        }
    }
}

/// Score cut-offs for deriving a label: strictly above `positive` is
/// positive, strictly below `negative` is negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentThresholds {
    pub positive: f32,
    pub negative: f32,
}

impl Default for SentimentThresholds {
    fn default() -> Self {
        Self {
            positive: 0.05,
            negative: -0.05,
        }
    }
}

impl SentimentThresholds {
    #[must_use]
    pub fn label_for(&self, score: f32) -> SentimentLabel {
        if score > self.positive {
            SentimentLabel::Positive
        } else if score < self.negative {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Model results below this confidence are re-scored by the fallback.
    pub confidence_floor: f32,
    pub thresholds: SentimentThresholds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confidence_floor: 0.6,
            thresholds: SentimentThresholds::default(),
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            confidence_floor: config.sentiment_confidence_floor,
            thresholds: SentimentThresholds {
                positive: config.sentiment_positive_threshold,
                negative: config.sentiment_negative_threshold,
            },
        }
    }
}
