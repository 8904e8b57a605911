//! HTTP client for a text-classification inference backend.
//!
//! Expects `POST {url}/predict` with `{"inputs": [...]}` and a response of
//! one label distribution per input, e.g.
//! `[[{"label": "POSITIVE", "score": 0.93}, {"label": "NEGATIVE", "score": 0.07}]]`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::classifier::SentimentClassifier;
use crate::error::SentimentError;
use crate::types::Polarity;

/// Maximum number of texts per /predict call.
const BATCH_SIZE: usize = 32;

/// Inputs are truncated to this many characters before sending.
const MAX_INPUT_CHARS: usize = 512;

#[derive(Serialize)]
struct PredictRequest<'a> {
    inputs: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f32,
}

/// Backends return either the full distribution or only the top label.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Prediction {
    Distribution(Vec<LabelScore>),
    Top(LabelScore),
}

impl Prediction {
    fn polarity(&self) -> Polarity {
        match self {
            Prediction::Distribution(labels) => {
                let prob = |wanted: &str| {
                    labels
                        .iter()
                        .filter(|l| l.label.to_lowercase().starts_with(wanted))
                        .map(|l| l.score)
                        .sum::<f32>()
                };
                let confidence = labels.iter().map(|l| l.score).fold(0.0_f32, f32::max);
                Polarity::new(prob("pos") - prob("neg"), confidence)
            }
            Prediction::Top(top) => {
                let label = top.label.to_lowercase();
                let score = if label.starts_with("pos") {
                    top.score
                } else if label.starts_with("neg") {
                    -top.score
                } else {
                    0.0
                };
                Polarity::new(score, top.score)
            }
        }
    }
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(MAX_INPUT_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Sentiment backend reached over HTTP.
pub struct ModelClassifier {
    client: reqwest::Client,
    predict_url: String,
    health_url: String,
    api_key: Option<String>,
}

impl ModelClassifier {
    /// # Errors
    ///
    /// Returns [`SentimentError::ModelUnavailable`] if the HTTP client cannot
    /// be constructed.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, SentimentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SentimentError::ModelUnavailable(format!("client build failed: {e}")))?;
        let base = base_url.trim_end_matches('/');
        Ok(Self {
            client,
            predict_url: format!("{base}/predict"),
            health_url: format!("{base}/health"),
            api_key,
        })
    }

    /// Check that the backend answers its health endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`SentimentError::ModelUnavailable`] on any failure.
    pub async fn probe(&self) -> Result<(), SentimentError> {
        let response = self
            .client
            .get(&self.health_url)
            .send()
            .await
            .map_err(|e| SentimentError::ModelUnavailable(format!("health check failed: {e}")))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(SentimentError::ModelUnavailable(format!(
                "health check returned status {}",
                response.status()
            )))
        }
    }

    /// Classify texts in chunks of [`BATCH_SIZE`], preserving input order.
    async fn predict(&self, texts: &[&str]) -> Result<Vec<Polarity>, SentimentError> {
        let mut all = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(BATCH_SIZE) {
            let inputs: Vec<&str> = chunk.iter().map(|t| truncate(t)).collect();
            let mut builder = self
                .client
                .post(&self.predict_url)
                .json(&PredictRequest { inputs: &inputs });
            if let Some(key) = &self.api_key {
                builder = builder.bearer_auth(key);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| SentimentError::ModelUnavailable(format!("request failed: {e}")))?;

            if !response.status().is_success() {
                return Err(SentimentError::ModelUnavailable(format!(
                    "model returned status {}",
                    response.status()
                )));
            }

            let predictions: Vec<Prediction> = response.json().await.map_err(|e| {
                SentimentError::ModelUnavailable(format!("response parse error: {e}"))
            })?;

            if predictions.len() != chunk.len() {
                return Err(SentimentError::ModelUnavailable(format!(
                    "model returned {} predictions for {} inputs",
                    predictions.len(),
                    chunk.len()
                )));
            }

            all.extend(predictions.iter().map(Prediction::polarity));
        }

        Ok(all)
    }
}

#[async_trait]
impl SentimentClassifier for ModelClassifier {
    fn name(&self) -> &'static str {
        "model"
    }

    async fn classify(&self, text: &str) -> Result<Polarity, SentimentError> {
        if text.trim().is_empty() {
            return Err(SentimentError::MalformedText("text is empty".to_owned()));
        }
        let mut results = self.predict(&[text]).await?;
        results
            .pop()
            .ok_or_else(|| SentimentError::ModelUnavailable("empty prediction".to_owned()))
    }

    async fn classify_batch(&self, texts: &[&str]) -> Vec<Result<Polarity, SentimentError>> {
        let usable: Vec<usize> = (0..texts.len())
            .filter(|&i| !texts[i].trim().is_empty())
            .collect();
        let usable_texts: Vec<&str> = usable.iter().map(|&i| texts[i]).collect();

        let mut results: Vec<Result<Polarity, SentimentError>> = (0..texts.len())
            .map(|_| Err(SentimentError::MalformedText("text is empty".to_owned())))
            .collect();

        if usable_texts.is_empty() {
            return results;
        }

        match self.predict(&usable_texts).await {
            Ok(polarities) => {
                for (i, polarity) in usable.into_iter().zip(polarities) {
                    results[i] = Ok(polarity);
                }
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    inputs = usable_texts.len(),
                    "batch prediction failed"
                );
                for i in usable {
                    results[i] = Err(err.clone());
                }
            }
        }
        results
    }
}
