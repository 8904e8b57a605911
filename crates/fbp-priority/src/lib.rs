//! Impact scoring and ranking for normalized feedback.

pub mod config;
pub mod error;
pub mod score;

pub use config::{
    all_factors, parse_factors, Factor, FactorSet, FactorWeights, PriorityConfig,
    PriorityThresholds, TierScores,
};
pub use error::PriorityError;
pub use score::{
    apply, contexts_for, frequency_index, FactorContribution, ImpactAssessment, PriorityScorer,
    RankedFeedback, ScoringContext,
};
