use std::collections::HashMap;
use std::env::VarError;

use super::*;

fn lookup_from_map<'a>(
    map: &'a HashMap<&'a str, &'a str>,
) -> impl Fn(&str) -> Result<String, VarError> + 'a {
    move |key| {
        map.get(key)
            .map(|v| (*v).to_string())
            .ok_or(VarError::NotPresent)
    }
}

#[test]
fn parse_environment_known_values() {
    assert_eq!(
        parse_environment("development").unwrap(),
        Environment::Development
    );
    assert_eq!(parse_environment("test").unwrap(), Environment::Test);
    assert_eq!(
        parse_environment("production").unwrap(),
        Environment::Production
    );
}

#[test]
fn parse_environment_unknown_fails() {
    let err = parse_environment("staging").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnvVar { ref var, .. } if var == "FBP_ENV"));
}

#[test]
fn build_app_config_uses_defaults_for_empty_env() {
    let map = HashMap::new();
    let config = build_app_config(lookup_from_map(&map)).unwrap();

    assert_eq!(config.env, Environment::Development);
    assert_eq!(config.log_level, "info");
    assert_eq!(
        config.sources_path.to_str(),
        Some("./config/sources.yaml")
    );
    assert_eq!(config.retry_max, 3);
    assert_eq!(config.retry_base_ms, 1000);
    assert_eq!(config.retry_max_delay_ms, 60_000);
    assert!(config.sentiment_model_url.is_none());
    assert!((config.sentiment_confidence_floor - 0.6).abs() < f32::EPSILON);
    assert!((config.sentiment_positive_threshold - 0.05).abs() < f32::EPSILON);
    assert!((config.sentiment_negative_threshold + 0.05).abs() < f32::EPSILON);
    assert_eq!(config.theme_seed, 42);
    assert_eq!(config.theme_retire_after_runs, 3);
    assert_eq!(config.priority_half_life_hours, 168);
}

#[test]
fn build_app_config_reads_overrides() {
    let mut map = HashMap::new();
    map.insert("FBP_ENV", "production");
    map.insert("FBP_RETRY_MAX", "5");
    map.insert("FBP_SENTIMENT_MODEL_URL", "http://model.internal:8080/");
    map.insert("FBP_THEME_SEED", "7");
    let config = build_app_config(lookup_from_map(&map)).unwrap();

    assert_eq!(config.env, Environment::Production);
    assert_eq!(config.retry_max, 5);
    assert_eq!(
        config.sentiment_model_url.as_deref(),
        Some("http://model.internal:8080")
    );
    assert_eq!(config.theme_seed, 7);
}

#[test]
fn build_app_config_rejects_non_numeric_retry() {
    let mut map = HashMap::new();
    map.insert("FBP_RETRY_MAX", "many");
    let err = build_app_config(lookup_from_map(&map)).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnvVar { ref var, .. } if var == "FBP_RETRY_MAX"));
}

#[test]
fn build_app_config_rejects_inverted_sentiment_thresholds() {
    let mut map = HashMap::new();
    map.insert("FBP_SENTIMENT_POSITIVE_THRESHOLD", "-0.2");
    map.insert("FBP_SENTIMENT_NEGATIVE_THRESHOLD", "0.2");
    let err = build_app_config(lookup_from_map(&map)).unwrap_err();
    assert!(err.to_string().contains("FBP_SENTIMENT_NEGATIVE_THRESHOLD"));
}

#[test]
fn build_app_config_rejects_zero_half_life() {
    let mut map = HashMap::new();
    map.insert("FBP_PRIORITY_HALF_LIFE_HOURS", "0");
    let err = build_app_config(lookup_from_map(&map)).unwrap_err();
    assert!(err.to_string().contains("FBP_PRIORITY_HALF_LIFE_HOURS"));
}

#[test]
fn debug_output_redacts_model_api_key() {
    let mut map = HashMap::new();
    map.insert("FBP_SENTIMENT_MODEL_API_KEY", "secret-token");
    let config = build_app_config(lookup_from_map(&map)).unwrap();
    let rendered = format!("{config:?}");
    assert!(!rendered.contains("secret-token"));
    assert!(rendered.contains("[redacted]"));
}
