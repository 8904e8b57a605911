use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_f32 = |var: &str, default: &str| -> Result<f32, ConfigError> {
        let value = or_default(var, default)
            .parse::<f32>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(invalid(var, "must be a finite number".to_string()))
        }
    };

    let env = parse_environment(&or_default("FBP_ENV", "development"))?;
    let log_level = or_default("FBP_LOG_LEVEL", "info");
    let sources_path = PathBuf::from(or_default("FBP_SOURCES_PATH", "./config/sources.yaml"));

    let request_timeout_secs = parse_u64("FBP_REQUEST_TIMEOUT_SECS", "30")?;
    let retry_max = parse_u32("FBP_RETRY_MAX", "3")?;
    let retry_base_ms = parse_u64("FBP_RETRY_BASE_MS", "1000")?;
    let retry_max_delay_ms = parse_u64("FBP_RETRY_MAX_DELAY_MS", "60000")?;
    if retry_max_delay_ms < retry_base_ms {
        return Err(invalid(
            "FBP_RETRY_MAX_DELAY_MS",
            format!("must be >= FBP_RETRY_BASE_MS ({retry_base_ms})"),
        ));
    }

    let sentiment_model_url = lookup("FBP_SENTIMENT_MODEL_URL")
        .ok()
        .map(|url| url.trim_end_matches('/').to_string())
        .filter(|url| !url.is_empty());
    let sentiment_model_api_key = lookup("FBP_SENTIMENT_MODEL_API_KEY")
        .ok()
        .filter(|key| !key.is_empty());

    let sentiment_confidence_floor = parse_f32("FBP_SENTIMENT_CONFIDENCE_FLOOR", "0.6")?;
    if !(0.0..=1.0).contains(&sentiment_confidence_floor) {
        return Err(invalid(
            "FBP_SENTIMENT_CONFIDENCE_FLOOR",
            "must be within [0.0, 1.0]".to_string(),
        ));
    }
    let sentiment_positive_threshold = parse_f32("FBP_SENTIMENT_POSITIVE_THRESHOLD", "0.05")?;
    let sentiment_negative_threshold = parse_f32("FBP_SENTIMENT_NEGATIVE_THRESHOLD", "-0.05")?;
    if sentiment_negative_threshold > sentiment_positive_threshold {
        return Err(invalid(
            "FBP_SENTIMENT_NEGATIVE_THRESHOLD",
            format!("must not exceed the positive threshold ({sentiment_positive_threshold})"),
        ));
    }

    let theme_seed = parse_u64("FBP_THEME_SEED", "42")?;
    let theme_max_iterations = parse_usize("FBP_THEME_MAX_ITERATIONS", "100")?;
    let theme_match_threshold = parse_f32("FBP_THEME_MATCH_THRESHOLD", "0.3")?;
    if !(theme_match_threshold > 0.0 && theme_match_threshold <= 1.0) {
        return Err(invalid(
            "FBP_THEME_MATCH_THRESHOLD",
            "must be within (0.0, 1.0]".to_string(),
        ));
    }
    let theme_retire_after_runs = parse_u32("FBP_THEME_RETIRE_AFTER_RUNS", "3")?;
    if theme_retire_after_runs == 0 {
        return Err(invalid(
            "FBP_THEME_RETIRE_AFTER_RUNS",
            "must be at least 1".to_string(),
        ));
    }

    let priority_half_life_hours = parse_u64("FBP_PRIORITY_HALF_LIFE_HOURS", "168")?;
    if priority_half_life_hours == 0 {
        return Err(invalid(
            "FBP_PRIORITY_HALF_LIFE_HOURS",
            "must be greater than zero".to_string(),
        ));
    }

    Ok(AppConfig {
        env,
        log_level,
        sources_path,
        request_timeout_secs,
        retry_max,
        retry_base_ms,
        retry_max_delay_ms,
        sentiment_model_url,
        sentiment_model_api_key,
        sentiment_confidence_floor,
        sentiment_positive_threshold,
        sentiment_negative_threshold,
        theme_seed,
        theme_max_iterations,
        theme_match_threshold,
        theme_retire_after_runs,
        priority_half_life_hours,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "FBP_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
