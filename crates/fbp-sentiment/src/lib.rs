//! Sentiment classification with a model backend and lexicon fallback, plus
//! time-bucketed trend aggregation.

pub mod classifier;
pub mod engine;
pub mod error;
pub mod lexicon;
pub mod model;
pub mod trend;
pub mod types;

pub use classifier::SentimentClassifier;
pub use engine::{assign, SentimentEngine};
pub use error::SentimentError;
pub use lexicon::{lexicon_polarity, LexiconClassifier};
pub use model::ModelClassifier;
pub use trend::{
    aggregate, aggregate_with_band, label_distribution, BucketSize, LabelDistribution,
    SentimentBucket, SentimentTrend, TrendDirection, DEFAULT_STABLE_BAND,
    MAX_FILLED_BUCKETS,
};
pub use types::{EngineConfig, Polarity, SentimentAssessment, SentimentThresholds, Strategy};
