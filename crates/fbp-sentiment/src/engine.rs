//! Strategy selection between the model backend and the lexicon fallback.

use fbp_core::{AppConfig, NormalizedFeedback};

use crate::classifier::SentimentClassifier;
use crate::error::SentimentError;
use crate::lexicon::LexiconClassifier;
use crate::model::ModelClassifier;
use crate::types::{EngineConfig, Polarity, SentimentAssessment, Strategy};

/// Classifies feedback with the model when it is available and confident,
/// falling back to the lexicon otherwise. Never fails: a record that no
/// classifier can score is reported neutral with zero confidence.
pub struct SentimentEngine {
    model: Option<Box<dyn SentimentClassifier>>,
    fallback: Box<dyn SentimentClassifier>,
    config: EngineConfig,
}

impl SentimentEngine {
    #[must_use]
    pub fn new(
        model: Option<Box<dyn SentimentClassifier>>,
        fallback: Box<dyn SentimentClassifier>,
        config: EngineConfig,
    ) -> Self {
        Self {
            model,
            fallback,
            config,
        }
    }

    /// Lexicon-only engine.
    #[must_use]
    pub fn lexicon_only(config: EngineConfig) -> Self {
        Self::new(None, Box::new(LexiconClassifier), config)
    }

    /// Build an engine from application config, probing the model backend
    /// once. An unset or unreachable backend yields a lexicon-only engine.
    pub async fn select(config: &AppConfig) -> Self {
        let engine_config = EngineConfig::from_app_config(config);
        let Some(url) = config.sentiment_model_url.as_deref() else {
            tracing::info!("no sentiment model configured, using lexicon classifier");
            return Self::lexicon_only(engine_config);
        };

        let model = match ModelClassifier::new(
            url,
            config.sentiment_model_api_key.clone(),
            config.request_timeout_secs,
        ) {
            Ok(model) => model,
            Err(e) => {
                tracing::warn!(error = %e, "sentiment model client unavailable, using lexicon");
                return Self::lexicon_only(engine_config);
            }
        };

        match model.probe().await {
            Ok(()) => {
                tracing::info!(url, "sentiment model available");
                Self::new(
                    Some(Box::new(model)),
                    Box::new(LexiconClassifier),
                    engine_config,
                )
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "sentiment model probe failed, using lexicon");
                Self::lexicon_only(engine_config)
            }
        }
    }

    #[must_use]
    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    fn assessment(&self, polarity: Polarity, strategy: Strategy) -> SentimentAssessment {
        SentimentAssessment {
            label: self.config.thresholds.label_for(polarity.score),
            score: polarity.score,
            confidence: polarity.confidence,
            strategy,
        }
    }

    /// Accept a confident model result, otherwise score with the fallback.
    async fn resolve(
        &self,
        text: &str,
        model_result: Option<Result<Polarity, SentimentError>>,
    ) -> SentimentAssessment {
        match model_result {
            Some(Ok(polarity)) if polarity.confidence >= self.config.confidence_floor => {
                return self.assessment(polarity, Strategy::Model);
            }
            Some(Ok(polarity)) => {
                tracing::debug!(
                    confidence = polarity.confidence,
                    floor = self.config.confidence_floor,
                    "model confidence below floor, using fallback"
                );
            }
            Some(Err(e)) => {
                tracing::debug!(error = %e, kind = e.kind(), "model failed, using fallback");
            }
            None => {}
        }

        match self.fallback.classify(text).await {
            Ok(polarity) => self.assessment(polarity, Strategy::Lexicon),
            Err(e) => {
                tracing::warn!(
                    classifier = self.fallback.name(),
                    error = %e,
                    "all classifiers failed, scoring neutral"
                );
                SentimentAssessment::neutral()
            }
        }
    }

    pub async fn classify_text(&self, text: &str) -> SentimentAssessment {
        let model_result = match &self.model {
            Some(model) => Some(model.classify(text).await),
            None => None,
        };
        self.resolve(text, model_result).await
    }

    pub async fn classify(&self, record: &NormalizedFeedback) -> SentimentAssessment {
        self.classify_text(&record.content).await
    }

    /// Classify records with one batched model call, falling back per
    /// record. Results are in input order.
    pub async fn classify_batch(&self, records: &[NormalizedFeedback]) -> Vec<SentimentAssessment> {
        let texts: Vec<&str> = records.iter().map(|r| r.content.as_str()).collect();
        let model_results: Vec<Option<Result<Polarity, SentimentError>>> = match &self.model {
            Some(model) => {
                let results = model.classify_batch(&texts).await;
                if results.len() == texts.len() {
                    results.into_iter().map(Some).collect()
                } else {
                    tracing::warn!(
                        classifier = model.name(),
                        expected = texts.len(),
                        got = results.len(),
                        "model returned wrong result count, using fallback for the batch"
                    );
                    texts.iter().map(|_| None).collect()
                }
            }
            None => texts.iter().map(|_| None).collect(),
        };

        let mut assessments = Vec::with_capacity(records.len());
        for (text, model_result) in texts.iter().zip(model_results) {
            assessments.push(self.resolve(text, model_result).await);
        }

        let fallbacks = assessments
            .iter()
            .filter(|a| a.strategy != Strategy::Model)
            .count();
        tracing::info!(
            records = records.len(),
            fallbacks,
            "sentiment batch classified"
        );
        assessments
    }
}

/// Write assessments onto records. Pairs by position; extra entries on
/// either side are ignored.
pub fn assign(records: &mut [NormalizedFeedback], assessments: &[SentimentAssessment]) {
    for (record, assessment) in records.iter_mut().zip(assessments) {
        record.sentiment_label = Some(assessment.label);
        record.sentiment_score = Some(assessment.score);
        record.sentiment_confidence = Some(assessment.confidence);
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
