//! Theme extraction over feedback text: TF-IDF vectors, seeded k-means
//! clustering, deterministic naming, and cross-run evolution tracking.

pub mod config;
pub mod error;
pub mod evolution;
pub mod extract;
pub mod kmeans;
pub mod similar;
pub mod text;
pub mod tfidf;

pub use config::{EvolutionConfig, ThemeConfig};
pub use error::ThemeError;
pub use evolution::{
    keyword_similarity, track_evolution, EvolutionReport, Growth, PersistingTheme,
};
pub use extract::{theme_id, ThemeExtraction, ThemeExtractor};
pub use similar::{duplicate_counts, group_similar, DEFAULT_SIMILARITY_THRESHOLD};
pub use tfidf::TfidfMatrix;
