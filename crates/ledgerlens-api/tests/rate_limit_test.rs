//! Admission control integration tests.
//!
//! Run with: `cargo test -p ledgerlens-api --test rate_limit_test`

mod helpers;

use helpers::fixtures::csv_statement;
use helpers::{setup_test_app, setup_test_app_with, test_config};
use serde_json::Value;

#[tokio::test]
async fn test_twenty_first_upload_from_one_ip_is_limited() {
    let app = setup_test_app();

    for i in 0..20 {
        let response = app.upload("march.csv", csv_statement(1)).await;
        assert_eq!(response.status_code(), 200, "upload {} failed", i + 1);
    }

    let response = app.upload("march.csv", csv_statement(1)).await;
    assert_eq!(response.status_code(), 429);

    let retry_after: u64 = response
        .header("retry-after")
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after > 0);

    let body: Value = response.json();
    assert_eq!(body["code"], "RATE_LIMIT_EXCEEDED");
    assert!(body["retry_after"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_limits_are_per_ip() {
    let mut config = test_config();
    config.rate_limit.ip_per_hour = 1;
    let app = setup_test_app_with(config);

    let first = app.upload_from("192.0.2.1", "a.csv", csv_statement(1)).await;
    assert_eq!(first.status_code(), 200);
    assert_eq!(first.header("x-ratelimit-remaining"), "0");

    let second = app.upload_from("192.0.2.1", "a.csv", csv_statement(1)).await;
    assert_eq!(second.status_code(), 429);

    let other = app.upload_from("192.0.2.2", "a.csv", csv_statement(1)).await;
    assert_eq!(other.status_code(), 200);
}

#[tokio::test]
async fn test_global_limit() {
    let mut config = test_config();
    config.rate_limit.global_per_minute = 2;
    let app = setup_test_app_with(config);

    for ip in ["192.0.2.1", "192.0.2.2"] {
        let response = app.upload_from(ip, "a.csv", csv_statement(1)).await;
        assert_eq!(response.status_code(), 200);
    }
    let response = app.upload_from("192.0.2.3", "a.csv", csv_statement(1)).await;
    assert_eq!(response.status_code(), 429);
}

#[tokio::test]
async fn test_forged_forwarded_hop_does_not_reset_ip_limit() {
    let mut config = test_config();
    config.rate_limit.ip_per_hour = 1;
    let app = setup_test_app_with(config);

    // The proxy appends 192.0.2.1; the client rotates the hop in front of it
    let first = app
        .upload_from("6.6.6.6, 192.0.2.1", "a.csv", csv_statement(1))
        .await;
    assert_eq!(first.status_code(), 200);

    let second = app
        .upload_from("7.7.7.7, 192.0.2.1", "a.csv", csv_statement(1))
        .await;
    assert_eq!(second.status_code(), 429);
}
