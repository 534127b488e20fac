//! Validator behavior against a local mock HTTP server: success paths,
//! retry termination, fast rejection, and batch mapping guarantees.

use crawlpool::{RetryPolicy, UrlValidator, ValidationItem, ValidatorConfig};
use serde_json::json;
use std::time::Duration;

fn item(url: &str) -> ValidationItem {
    let mut map = ValidationItem::new();
    map.insert("url".into(), json!(url));
    map
}

fn item_with_date(url: &str, fecha: &str) -> ValidationItem {
    let mut map = item(url);
    map.insert("fecha".into(), json!(fecha));
    map
}

/// Millisecond backoff so retry tests stay fast
fn fast_config() -> ValidatorConfig {
    ValidatorConfig {
        retry: RetryPolicy {
            base: Duration::from_millis(1),
            cap: Duration::from_millis(10),
        },
        request_timeout: Duration::from_secs(5),
        ..ValidatorConfig::default()
    }
}

#[tokio::test]
async fn valid_url_reports_status_and_final_url() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/ok")
        .with_status(200)
        .with_body("alive")
        .create_async()
        .await;

    let validator = UrlValidator::new(fast_config()).unwrap();
    let results = validator
        .validate_batch(vec![item(&format!("{}/ok", server.url()))])
        .await;

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert!(result.is_valid);
    assert_eq!(result.status_code, Some(200));
    assert!(result.final_url.as_deref().unwrap().ends_with("/ok"));
    assert!(result.error_message.is_none());
    mock.assert_async().await;
}

#[tokio::test]
async fn redirects_are_followed_to_the_final_url() {
    let mut server = mockito::Server::new_async().await;
    let _old = server
        .mock("GET", "/old")
        .with_status(302)
        .with_header("location", &format!("{}/new", server.url()))
        .create_async()
        .await;
    let _new = server
        .mock("GET", "/new")
        .with_status(200)
        .create_async()
        .await;

    let validator = UrlValidator::new(fast_config()).unwrap();
    let results = validator
        .validate_batch(vec![item(&format!("{}/old", server.url()))])
        .await;

    let result = &results[0];
    assert!(result.is_valid);
    assert_eq!(result.status_code, Some(200));
    assert!(result.final_url.as_deref().unwrap().ends_with("/new"));
}

#[tokio::test]
async fn persistent_500_is_retried_exactly_max_retries_then_terminal() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/down")
        .with_status(500)
        .expect(3)
        .create_async()
        .await;

    let validator = UrlValidator::new(fast_config()).unwrap();
    let results = validator
        .validate_batch(vec![item(&format!("{}/down", server.url()))])
        .await;

    let result = &results[0];
    assert!(!result.is_valid);
    assert_eq!(result.status_code, Some(500));
    assert!(
        result
            .error_message
            .as_deref()
            .unwrap()
            .contains("HTTP status 500")
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn structurally_invalid_url_is_rejected_without_network() {
    let validator = UrlValidator::new(fast_config()).unwrap();
    let results = validator.validate_batch(vec![item("not a url")]).await;

    let result = &results[0];
    assert!(!result.is_valid);
    assert_eq!(result.status_code, None);
    assert!(
        result
            .error_message
            .as_deref()
            .unwrap()
            .contains("Invalid URL format")
    );
}

#[tokio::test]
async fn non_http_scheme_is_rejected() {
    let validator = UrlValidator::new(fast_config()).unwrap();
    let results = validator
        .validate_batch(vec![item("ftp://archive.example.com/file")])
        .await;
    assert!(!results[0].is_valid);
    assert_eq!(results[0].status_code, None);
}

#[tokio::test]
async fn missing_url_field_is_rejected_immediately() {
    let mut map = ValidationItem::new();
    map.insert("fecha".into(), json!("2025-08-01"));

    let validator = UrlValidator::new(fast_config()).unwrap();
    let results = validator.validate_batch(vec![map]).await;

    let result = &results[0];
    assert!(!result.is_valid);
    assert!(result.error_message.as_deref().unwrap().contains("missing"));
    // Original metadata survives even for rejected items.
    assert_eq!(result.original["fecha"], json!("2025-08-01"));
}

#[tokio::test]
async fn stalled_server_times_out_and_exhausts_retries() {
    // A listener that accepts connections but never answers, so every
    // attempt ends at the request timeout rather than at connect.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            if let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        }
    });

    let config = ValidatorConfig {
        request_timeout: Duration::from_millis(100),
        ..fast_config()
    };
    let validator = UrlValidator::new(config).unwrap();
    let results = validator
        .validate_batch(vec![item(&format!("http://{addr}/slow"))])
        .await;

    let result = &results[0];
    assert!(!result.is_valid);
    assert_eq!(result.status_code, None);
    let message = result.error_message.as_deref().unwrap();
    assert!(message.starts_with("Failed after 3 attempts"));
    assert!(message.contains("Request timed out"));
}

#[tokio::test]
async fn connection_errors_exhaust_retries_with_last_error() {
    // Nothing listens on port 1; every attempt fails at connect.
    let validator = UrlValidator::new(fast_config()).unwrap();
    let results = validator
        .validate_batch(vec![item("http://127.0.0.1:1/")])
        .await;

    let result = &results[0];
    assert!(!result.is_valid);
    assert_eq!(result.status_code, None);
    assert!(
        result
            .error_message
            .as_deref()
            .unwrap()
            .starts_with("Failed after 3 attempts")
    );
}

#[tokio::test]
async fn batch_output_is_one_to_one_with_metadata_preserved() {
    let mut server = mockito::Server::new_async().await;
    let _ok = server
        .mock("GET", "/a")
        .with_status(200)
        .create_async()
        .await;
    let _gone = server
        .mock("GET", "/b")
        .with_status(404)
        .expect(3)
        .create_async()
        .await;

    let validator = UrlValidator::new(fast_config()).unwrap();
    let items = vec![
        item_with_date(&format!("{}/a", server.url()), "2025-08-01"),
        item_with_date(&format!("{}/b", server.url()), "2025-08-02"),
        item_with_date("not a url", "2025-08-03"),
    ];
    let results = validator.validate_batch(items).await;

    assert_eq!(results.len(), 3);
    for fecha in ["2025-08-01", "2025-08-02", "2025-08-03"] {
        assert!(
            results
                .iter()
                .any(|r| r.original["fecha"] == json!(fecha)),
            "missing result for item with fecha={fecha}"
        );
    }
}

#[tokio::test]
async fn mixed_batch_under_concurrency_ceiling() {
    let mut server = mockito::Server::new_async().await;
    let _good = server
        .mock("GET", "/good")
        .with_status(200)
        .create_async()
        .await;
    let flaky = server
        .mock("GET", "/5xx")
        .with_status(503)
        .expect(3)
        .create_async()
        .await;

    let config = ValidatorConfig {
        max_concurrent: 2,
        ..fast_config()
    };
    let validator = UrlValidator::new(config).unwrap();
    let results = validator
        .validate_batch(vec![
            item(&format!("{}/good", server.url())),
            item("not a url"),
            item(&format!("{}/5xx", server.url())),
        ])
        .await;

    assert_eq!(results.len(), 3);

    let good = results.iter().find(|r| r.is_valid).expect("one valid item");
    assert_eq!(good.status_code, Some(200));

    let malformed = results
        .iter()
        .find(|r| r.status_code.is_none() && !r.is_valid)
        .expect("one malformed item");
    assert!(
        malformed
            .error_message
            .as_deref()
            .unwrap()
            .contains("Invalid URL format")
    );

    let flaky_result = results
        .iter()
        .find(|r| r.status_code == Some(503))
        .expect("one 5xx item");
    assert!(!flaky_result.is_valid);
    flaky.assert_async().await;
}

#[tokio::test]
async fn filter_valid_keeps_only_passing_items() {
    let mut server = mockito::Server::new_async().await;
    let _ok = server
        .mock("GET", "/ok")
        .with_status(200)
        .create_async()
        .await;

    let validator = UrlValidator::new(fast_config()).unwrap();
    let survivors = validator
        .filter_valid(vec![
            item_with_date(&format!("{}/ok", server.url()), "2025-08-01"),
            item("not a url"),
        ])
        .await;

    assert_eq!(survivors.len(), 1);
    assert_eq!(survivors[0]["fecha"], json!("2025-08-01"));
}
