use fbp_core::AppConfig;

use crate::error::ThemeError;

/// Parameters for vectorization and clustering.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeConfig {
    /// Seed for k-means++ initialization.
    pub seed: u64,
    pub max_iterations: usize,
    /// Largest centroid move that still counts as converged.
    pub tolerance: f64,
    /// Minimum number of documents a term must appear in. Relaxed to 1 for
    /// corpora smaller than [`SMALL_CORPUS`](crate::tfidf::SMALL_CORPUS).
    pub min_df: usize,
    pub max_features: usize,
    /// Keywords kept per theme.
    pub top_keywords: usize,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            max_iterations: 100,
            tolerance: 1e-4,
            min_df: 2,
            max_features: 1000,
            top_keywords: 5,
        }
    }
}

impl ThemeConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            seed: config.theme_seed,
            max_iterations: config.theme_max_iterations,
            ..Self::default()
        }
    }

    /// # Errors
    ///
    /// Returns [`ThemeError::InvalidParameter`] for zero limits or a
    /// negative or non-finite tolerance.
    pub fn validate(&self) -> Result<(), ThemeError> {
        if self.max_iterations == 0 {
            return Err(ThemeError::InvalidParameter(
                "max_iterations must be at least 1".to_owned(),
            ));
        }
        if self.max_features == 0 || self.top_keywords == 0 {
            return Err(ThemeError::InvalidParameter(
                "max_features and top_keywords must be at least 1".to_owned(),
            ));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(ThemeError::InvalidParameter(format!(
                "tolerance must be a non-negative number, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Parameters for matching themes across runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvolutionConfig {
    /// Minimum keyword Jaccard similarity for two themes to be the same.
    pub match_threshold: f32,
    /// Consecutive empty runs before a theme is retired.
    pub retire_after_runs: u32,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.3,
            retire_after_runs: 3,
        }
    }
}

impl EvolutionConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            match_threshold: config.theme_match_threshold,
            retire_after_runs: config.theme_retire_after_runs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ThemeConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_iterations_rejected() {
        let config = ThemeConfig {
            max_iterations: 0,
            ..ThemeConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn nan_tolerance_rejected() {
        let config = ThemeConfig {
            tolerance: f64::NAN,
            ..ThemeConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
