//! Integration tests for `ModelClassifier` and engine fallback.
//!
//! Uses `wiremock` to stand up a local inference server for each test so no
//! real network traffic is made.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fbp_sentiment::{
    EngineConfig, LexiconClassifier, ModelClassifier, SentimentClassifier, SentimentEngine,
    SentimentError, Strategy,
};

fn classifier(server: &MockServer) -> ModelClassifier {
    ModelClassifier::new(&server.uri(), Some("model-key".to_owned()), 5)
        .expect("failed to build test ModelClassifier")
}

fn distribution(pos: f32, neg: f32) -> serde_json::Value {
    json!([
        {"label": "POSITIVE", "score": pos},
        {"label": "NEGATIVE", "score": neg}
    ])
}

// ---------------------------------------------------------------------------
// classify / classify_batch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn classify_sends_inputs_and_maps_distribution() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .and(header("authorization", "Bearer model-key"))
        .and(body_partial_json(json!({"inputs": ["love it"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([distribution(0.9, 0.1)])))
        .expect(1)
        .mount(&server)
        .await;

    let polarity = classifier(&server).classify("love it").await.unwrap();
    assert!((polarity.score - 0.8).abs() < 1e-6);
    assert!((polarity.confidence - 0.9).abs() < 1e-6);
}

#[tokio::test]
async fn classify_batch_restores_order_and_rejects_blank_inputs() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .and(body_partial_json(json!({"inputs": ["great", "awful"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            distribution(0.95, 0.05),
            distribution(0.1, 0.9)
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let results = classifier(&server)
        .classify_batch(&["great", "  ", "awful"])
        .await;
    assert_eq!(results.len(), 3);
    assert!(results[0].as_ref().unwrap().score > 0.0);
    assert!(matches!(results[1], Err(SentimentError::MalformedText(_))));
    assert!(results[2].as_ref().unwrap().score < 0.0);
}

#[tokio::test]
async fn batches_are_split_into_chunks_of_32() {
    let server = MockServer::start().await;
    let texts: Vec<String> = (0..40).map(|i| format!("text {i}")).collect();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();

    let first: Vec<serde_json::Value> = (0..32).map(|_| distribution(0.7, 0.3)).collect();
    let second: Vec<serde_json::Value> = (0..8).map(|_| distribution(0.2, 0.8)).collect();
    Mock::given(method("POST"))
        .and(path("/predict"))
        .and(body_partial_json(json!({"inputs": [refs[32]]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(second)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(first)))
        .mount(&server)
        .await;

    let results = classifier(&server).classify_batch(&refs).await;
    assert_eq!(results.len(), 40);
    assert!(results[..32].iter().all(|r| r.as_ref().unwrap().score > 0.0));
    assert!(results[32..].iter().all(|r| r.as_ref().unwrap().score < 0.0));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn prediction_count_mismatch_is_model_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([distribution(0.5, 0.5)])))
        .mount(&server)
        .await;

    let results = classifier(&server).classify_batch(&["one", "two"]).await;
    assert!(results
        .iter()
        .all(|r| matches!(r, Err(SentimentError::ModelUnavailable(_)))));
}

// ---------------------------------------------------------------------------
// probe
// ---------------------------------------------------------------------------

#[tokio::test]
async fn probe_succeeds_on_healthy_backend() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    classifier(&server).probe().await.unwrap();
}

#[tokio::test]
async fn probe_fails_on_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = classifier(&server).probe().await.unwrap_err();
    assert_eq!(err.kind(), "model_unavailable");
}

// ---------------------------------------------------------------------------
// engine fallback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn server_error_falls_back_to_lexicon_per_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let engine = SentimentEngine::new(
        Some(Box::new(classifier(&server))),
        Box::new(LexiconClassifier),
        EngineConfig::default(),
    );
    let a = engine.classify_text("the app crashed again").await;
    assert_eq!(a.strategy, Strategy::Lexicon);
    assert!(a.score < 0.0);
}

#[tokio::test]
async fn uncertain_model_result_is_rescored_by_lexicon() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([distribution(0.55, 0.45)])))
        .mount(&server)
        .await;

    let engine = SentimentEngine::new(
        Some(Box::new(classifier(&server))),
        Box::new(LexiconClassifier),
        EngineConfig::default(),
    );
    let a = engine.classify_text("really helpful support team").await;
    assert_eq!(a.strategy, Strategy::Lexicon);
    assert!(a.score > 0.0);
}
