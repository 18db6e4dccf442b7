//! Retry behavior against a mock HTTP server: transient failures are
//! retried under the shared rate limit, terminal failures are not, and
//! error payloads never carry the credential.

use request_manager::logging::{try_init_logging, LogConfig};
use request_manager::{ApiRequest, ErrorKind, ManagerConfig, RequestManager};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> ManagerConfig {
    try_init_logging(&LogConfig::test());
    ManagerConfig::new(format!("{}/v1", server.uri()), "secret-token-xyz")
        .with_burst_size(50)
        .with_period(Duration::from_millis(20))
}

#[tokio::test]
async fn test_transient_server_error_is_retried_to_success() {
    let server = MockServer::start().await;
    // First two attempts fail, the third succeeds.
    Mock::given(method("GET"))
        .and(path("/v1/flaky"))
        .respond_with(ResponseTemplate::new(500).set_body_string("500"))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .with_priority(2)
        .mount(&server)
        .await;

    let manager = RequestManager::new(config(&server)).unwrap();
    let response = manager.request(ApiRequest::get("/flaky")).await.unwrap();

    assert_eq!(response.data, json!({"ok": true}));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_retry_ceiling_bounds_attempts() {
    let server = MockServer::start().await;
    // Default ceiling of 5 retries: exactly 6 attempts total.
    Mock::given(method("GET"))
        .and(path("/v1/down"))
        .respond_with(ResponseTemplate::new(500).set_body_string("500"))
        .expect(6)
        .mount(&server)
        .await;

    let manager = RequestManager::new(config(&server)).unwrap();
    let err = manager.request(ApiRequest::get("/down")).await.unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::Server));
}

#[tokio::test]
async fn test_custom_retry_ceiling() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/down"))
        .respond_with(ResponseTemplate::new(500).set_body_string("500"))
        .expect(3)
        .mount(&server)
        .await;

    let manager =
        RequestManager::new(config(&server).with_max_retry_count(2)).unwrap();
    let err = manager.request(ApiRequest::get("/down")).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Server));
}

#[tokio::test]
async fn test_not_found_is_never_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("404"))
        .expect(1)
        .mount(&server)
        .await;

    let manager = RequestManager::new(config(&server)).unwrap();
    let err = manager.request(ApiRequest::get("/gone")).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::NotFound));
}

#[tokio::test]
async fn test_authentication_failure_is_retried_then_classified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secure"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .expect(2)
        .mount(&server)
        .await;

    let manager =
        RequestManager::new(config(&server).with_max_retry_count(1)).unwrap();
    let err = manager.request(ApiRequest::get("/secure")).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Authentication));
}

#[tokio::test]
async fn test_terminal_error_payload_never_leaks_the_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secure"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;

    let manager =
        RequestManager::new(config(&server).with_max_retry_count(0)).unwrap();
    let err = manager.request(ApiRequest::get("/secure")).await.unwrap_err();

    let request_error = err.as_request().unwrap();
    let rendered = request_error.payload.to_string();
    assert!(!rendered.contains("secret-token-xyz"));
    // The captured request headers are present, but masked.
    assert_eq!(
        request_error.payload["request"]["headers"]["authorization"],
        json!("[REDACTED]")
    );
}

#[tokio::test]
async fn test_retries_share_the_admission_rate() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/down"))
        .respond_with(ResponseTemplate::new(500).set_body_string("500"))
        .mount(&server)
        .await;

    // One admission per 100ms window: 3 attempts need two refill waits.
    let manager = RequestManager::new(
        config(&server)
            .with_burst_size(1)
            .with_period(Duration::from_millis(100))
            .with_max_retry_count(2),
    )
    .unwrap();

    let start = tokio::time::Instant::now();
    let err = manager.request(ApiRequest::get("/down")).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Server));
    assert!(start.elapsed() >= Duration::from_millis(180));
}
