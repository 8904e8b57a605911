//! Shared data model, configuration, and persistence contract for the
//! feedback pipeline.
//!
//! Every other crate in the workspace exchanges [`NormalizedFeedback`] and
//! [`Theme`] values defined here.

pub mod app_config;
pub mod config;
pub mod error;
pub mod feedback;
pub mod sources;
pub mod store;
pub mod theme;

pub use app_config::{AppConfig, Environment};
pub use config::{build_app_config, load_app_config, load_app_config_from_env};
pub use error::{ConfigError, StoreError};
pub use feedback::{
    derive_title, Category, CustomerTier, FeedbackPatch, NormalizedFeedback, ParseEnumError,
    PriorityLevel, SentimentLabel, Source, ValidationError,
};
pub use sources::{
    load_sources, parse_sources, CategoryRule, EndpointConfig, FieldMapping, SourceConfig,
    SourcesFile, TierRule,
};
pub use store::{FeedbackQuery, FeedbackStore, MemoryStore, ThemeWindow, UpsertOutcome};
pub use theme::{Theme, ThemeId, ThemeMembership, ThemeStatus};
