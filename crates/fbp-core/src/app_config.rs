use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub sources_path: PathBuf,
    pub request_timeout_secs: u64,
    pub retry_max: u32,
    pub retry_base_ms: u64,
    pub retry_max_delay_ms: u64,
    pub sentiment_model_url: Option<String>,
    pub sentiment_model_api_key: Option<String>,
    pub sentiment_confidence_floor: f32,
    pub sentiment_positive_threshold: f32,
    pub sentiment_negative_threshold: f32,
    pub theme_seed: u64,
    pub theme_max_iterations: usize,
    pub theme_match_threshold: f32,
    pub theme_retire_after_runs: u32,
    pub priority_half_life_hours: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("sources_path", &self.sources_path)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("retry_max", &self.retry_max)
            .field("retry_base_ms", &self.retry_base_ms)
            .field("retry_max_delay_ms", &self.retry_max_delay_ms)
            .field("sentiment_model_url", &self.sentiment_model_url)
            .field(
                "sentiment_model_api_key",
                &self.sentiment_model_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "sentiment_confidence_floor",
                &self.sentiment_confidence_floor,
            )
            .field(
                "sentiment_positive_threshold",
                &self.sentiment_positive_threshold,
            )
            .field(
                "sentiment_negative_threshold",
                &self.sentiment_negative_threshold,
            )
            .field("theme_seed", &self.theme_seed)
            .field("theme_max_iterations", &self.theme_max_iterations)
            .field("theme_match_threshold", &self.theme_match_threshold)
            .field("theme_retire_after_runs", &self.theme_retire_after_runs)
            .field("priority_half_life_hours", &self.priority_half_life_hours)
            .finish()
    }
}
