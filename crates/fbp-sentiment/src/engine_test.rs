use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use fbp_core::{FeedbackPatch, NormalizedFeedback, SentimentLabel, Source};

use super::*;

/// Returns a fixed polarity for every input and counts batch calls.
struct FixedClassifier {
    polarity: Polarity,
    batch_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SentimentClassifier for FixedClassifier {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn classify(&self, _text: &str) -> Result<Polarity, SentimentError> {
        Ok(self.polarity)
    }

    async fn classify_batch(&self, texts: &[&str]) -> Vec<Result<Polarity, SentimentError>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        texts.iter().map(|_| Ok(self.polarity)).collect()
    }
}

/// Fails every input with the given error.
struct FailingClassifier(SentimentError);

#[async_trait]
impl SentimentClassifier for FailingClassifier {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn classify(&self, _text: &str) -> Result<Polarity, SentimentError> {
        Err(self.0.clone())
    }
}

/// Drops the last input from every batch.
struct ShortBatchClassifier;

#[async_trait]
impl SentimentClassifier for ShortBatchClassifier {
    fn name(&self) -> &'static str {
        "short"
    }

    async fn classify(&self, _text: &str) -> Result<Polarity, SentimentError> {
        Ok(Polarity::new(0.9, 0.99))
    }

    async fn classify_batch(&self, texts: &[&str]) -> Vec<Result<Polarity, SentimentError>> {
        let keep = texts.len().saturating_sub(1);
        texts[..keep].iter().map(|_| Ok(Polarity::new(0.9, 0.99))).collect()
    }
}

fn fixed(score: f32, confidence: f32) -> Box<FixedClassifier> {
    Box::new(FixedClassifier {
        polarity: Polarity::new(score, confidence),
        batch_calls: Arc::new(AtomicUsize::new(0)),
    })
}

fn record(source_id: &str, content: &str) -> NormalizedFeedback {
    let mut patch = FeedbackPatch::empty(Source::Zendesk);
    patch.source_id = Some(source_id.to_owned());
    patch.content = Some(content.to_owned());
    patch.created_at = Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
    patch.into_record(Utc::now()).unwrap()
}

#[tokio::test]
async fn confident_model_result_is_used() {
    let engine = SentimentEngine::new(
        Some(fixed(0.8, 0.95)),
        fixed(-0.5, 0.5),
        EngineConfig::default(),
    );
    let a = engine.classify_text("anything").await;
    assert_eq!(a.strategy, Strategy::Model);
    assert_eq!(a.label, SentimentLabel::Positive);
    assert!((a.score - 0.8).abs() < 1e-6);
}

#[tokio::test]
async fn low_confidence_model_result_falls_back() {
    let engine = SentimentEngine::new(
        Some(fixed(0.8, 0.4)),
        fixed(-0.5, 0.5),
        EngineConfig::default(),
    );
    let a = engine.classify_text("anything").await;
    assert_eq!(a.strategy, Strategy::Lexicon);
    assert_eq!(a.label, SentimentLabel::Negative);
}

#[tokio::test]
async fn unavailable_model_falls_back_to_lexicon() {
    let engine = SentimentEngine::new(
        Some(Box::new(FailingClassifier(SentimentError::ModelUnavailable(
            "down".into(),
        )))),
        Box::new(LexiconClassifier),
        EngineConfig::default(),
    );
    let a = engine.classify_text("the export keeps crashing").await;
    assert_eq!(a.strategy, Strategy::Lexicon);
    assert_eq!(a.label, SentimentLabel::Negative);
}

#[tokio::test]
async fn all_classifiers_failing_scores_neutral() {
    let engine = SentimentEngine::lexicon_only(EngineConfig::default());
    let a = engine.classify_text("   ").await;
    assert_eq!(a, SentimentAssessment::neutral());
}

#[tokio::test]
async fn batch_makes_one_model_call_and_keeps_order() {
    let calls = Arc::new(AtomicUsize::new(0));
    let model = Box::new(FixedClassifier {
        polarity: Polarity::new(-0.7, 0.9),
        batch_calls: Arc::clone(&calls),
    });
    let engine = SentimentEngine::new(
        Some(model),
        Box::new(LexiconClassifier),
        EngineConfig::default(),
    );
    let records = vec![
        record("1", "first"),
        record("2", "second"),
        record("3", "third"),
    ];

    let assessments = engine.classify_batch(&records).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(assessments.len(), 3);
    assert!(assessments
        .iter()
        .all(|a| a.strategy == Strategy::Model && a.label == SentimentLabel::Negative));
}

#[tokio::test]
async fn short_model_batch_falls_back_for_every_record() {
    let engine = SentimentEngine::new(
        Some(Box::new(ShortBatchClassifier)),
        Box::new(LexiconClassifier),
        EngineConfig::default(),
    );
    let records = vec![
        record("1", "checkout is broken"),
        record("2", "love the new dashboard"),
        record("3", "search is slow"),
    ];

    let assessments = engine.classify_batch(&records).await;
    assert_eq!(assessments.len(), records.len());
    assert!(assessments.iter().all(|a| a.strategy == Strategy::Lexicon));
    assert_eq!(assessments[0].label, SentimentLabel::Negative);
    assert_eq!(assessments[1].label, SentimentLabel::Positive);
}

#[tokio::test]
async fn lexicon_only_batch_never_aborts() {
    let engine = SentimentEngine::lexicon_only(EngineConfig::default());
    let records = vec![
        record("1", "love the new dashboard, great work"),
        record("2", "..."),
        record("3", "checkout is broken and slow"),
    ];

    let assessments = engine.classify_batch(&records).await;
    assert_eq!(assessments[0].label, SentimentLabel::Positive);
    assert_eq!(assessments[1].strategy, Strategy::Neutral);
    assert_eq!(assessments[2].label, SentimentLabel::Negative);
    for a in &assessments {
        assert!((-1.0..=1.0).contains(&a.score));
    }
}

#[tokio::test]
async fn assign_writes_results_onto_records() {
    let engine = SentimentEngine::lexicon_only(EngineConfig::default());
    let mut records = vec![record("1", "support was helpful"), record("2", "bad")];
    let assessments = engine.classify_batch(&records).await;
    assign(&mut records, &assessments);

    assert_eq!(records[0].sentiment_label, Some(SentimentLabel::Positive));
    assert_eq!(records[1].sentiment_label, Some(SentimentLabel::Negative));
    assert!(records.iter().all(|r| r.sentiment_score.is_some()));
    assert!(records.iter().all(|r| r.sentiment_confidence.is_some()));
}

#[tokio::test]
async fn select_without_model_url_is_lexicon_only() {
    let config = fbp_core::build_app_config(|_| Err(std::env::VarError::NotPresent)).unwrap();
    let engine = SentimentEngine::select(&config).await;
    assert!(!engine.has_model());
}
