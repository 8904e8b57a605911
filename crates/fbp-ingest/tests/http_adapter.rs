//! Integration tests for `HttpAdapter`.
//!
//! Uses `wiremock` to stand up a local HTTP server for each test so no
//! real network traffic is made. Covers cursor paging and the mapping of
//! HTTP statuses onto transient and permanent `SourceError`s.

use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fbp_core::{EndpointConfig, FieldMapping, MemoryStore, Source};
use fbp_ingest::{
    FetchRequest, HttpAdapter, RateLimiter, RetryPolicy, SourceAdapter, SourceError, SourceSync,
};

fn endpoint(server: &MockServer) -> EndpointConfig {
    EndpointConfig {
        url: format!("{}/api/v2/tickets.json", server.uri()),
        records_path: "tickets".to_owned(),
        cursor_path: Some("meta.after_cursor".to_owned()),
        token_env: None,
        page_size: 2,
    }
}

fn adapter(server: &MockServer) -> HttpAdapter {
    HttpAdapter::new(
        Source::Zendesk,
        FieldMapping::preset(&Source::Zendesk).expect("zendesk preset"),
        endpoint(server),
        Some("test-token".to_owned()),
        5,
    )
    .expect("failed to build test HttpAdapter")
}

fn ticket(id: i64) -> serde_json::Value {
    json!({
        "id": id,
        "subject": "Sync delays",
        "description": "Data takes hours to appear",
        "created_at": "2025-05-28T14:00:00Z",
        "priority": "high",
        "tags": ["bug"]
    })
}

// ---------------------------------------------------------------------------
// Paging
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sync_follows_cursor_across_pages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/tickets.json"))
        .and(query_param_is_missing("cursor"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tickets": [ticket(1), ticket(2)],
            "meta": {"after_cursor": "c2"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v2/tickets.json"))
        .and(query_param("cursor", "c2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tickets": [ticket(3)],
            "meta": {"after_cursor": null}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryStore::new();
    let sync = SourceSync::new(
        Box::new(adapter(&server)),
        RateLimiter::new(10, Duration::from_secs(1)),
        RetryPolicy::default(),
    );
    let report = sync
        .run(&store, &FetchRequest::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.pages, 2);
    assert_eq!(report.inserted, 3);
    assert_eq!(store.len().await, 3);
}

#[tokio::test]
async fn missing_records_field_is_an_empty_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"meta": {}})))
        .mount(&server)
        .await;

    let page = adapter(&server)
        .fetch(&FetchRequest::default())
        .await
        .unwrap();
    assert!(page.records.is_empty());
    assert!(page.next_cursor.is_none());
}

// ---------------------------------------------------------------------------
// Status mapping
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rate_limited_response_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "12"))
        .mount(&server)
        .await;

    let err = adapter(&server)
        .fetch(&FetchRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SourceError::RateLimited {
            retry_after_secs: Some(12)
        }
    ));
    assert_eq!(err.retry_after(), Some(Duration::from_secs(12)));
}

#[tokio::test]
async fn rate_limit_then_success_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tickets": [ticket(9)]
        })))
        .mount(&server)
        .await;

    let store = MemoryStore::new();
    let sync = SourceSync::new(
        Box::new(adapter(&server)),
        RateLimiter::new(10, Duration::from_secs(1)),
        RetryPolicy {
            max_retries: 2,
            base_delay: Duration::ZERO,
            max_delay: Duration::from_secs(1),
        },
    );
    let report = sync
        .run(&store, &FetchRequest::default(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.inserted, 1);
}

#[tokio::test]
async fn unauthorized_is_permanent_and_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryStore::new();
    let sync = SourceSync::new(
        Box::new(adapter(&server)),
        RateLimiter::new(10, Duration::from_secs(1)),
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        },
    );
    let err = sync
        .run(&store, &FetchRequest::default(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "permanent_source");
}

#[tokio::test]
async fn server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = adapter(&server)
        .fetch(&FetchRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::Unavailable { status: 503 }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn client_error_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(422))
        .mount(&server)
        .await;

    let err = adapter(&server)
        .fetch(&FetchRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::Rejected { status: 422 }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = adapter(&server)
        .fetch(&FetchRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::Malformed(_)));
}
