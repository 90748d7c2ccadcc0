//! Integration tests for the upstream feed client
//!
//! Each test starts a throwaway axum upstream on a loopback port and points
//! `HttpFeedClient` at it.
//! Run with: `cargo test --test feed_client_test`

use axum::{extract::Query, http::StatusCode, routing::get, Json, Router};
use chrono::NaiveDate;
use pricepulse_gateway::domain::{FeedError, FeedSource, Timeframe};
use pricepulse_gateway::infrastructure::{FeedMode, HttpFeedClient};
use serde_json::{json, Value};
use std::collections::HashMap;

const DAY0: i64 = 1_704_067_200_000; // 2024-01-01T00:00:00Z
const DAY_MS: i64 = 86_400_000;

/// Serve `app` on an ephemeral port and return its base URL
async fn spawn_upstream(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn market_chart_body() -> Value {
    json!({
        "prices": [[DAY0, 100.0], [DAY0 + DAY_MS, 110.0], [DAY0 + 2 * DAY_MS, 90.0]],
        "market_caps": [],
        "total_volumes": [[DAY0, 5.0], [DAY0 + 2 * DAY_MS, 7.0]]
    })
}

fn market_chart_upstream() -> Router {
    Router::new().route(
        "/coins/{asset}/market_chart",
        get(|Query(params): Query<HashMap<String, String>>| async move {
            if params.get("vs_currency").map(String::as_str) != Some("usd") {
                return (StatusCode::BAD_REQUEST, Json(json!({"error": "vs_currency"})));
            }
            let mut body = market_chart_body();
            body["days"] = json!(params.get("days").cloned().unwrap_or_default());
            (StatusCode::OK, Json(body))
        }),
    )
}

#[tokio::test]
async fn test_market_chart_is_normalized() {
    let base = spawn_upstream(market_chart_upstream()).await;
    let client = HttpFeedClient::with_base_url(&base, "bitcoin", "usd").unwrap();

    let series = client.fetch(&Timeframe::Days(30)).await.unwrap();

    assert_eq!(series.len(), 3);
    assert_eq!(series[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    assert_eq!(series[0].price, 100.0);
    assert_eq!(series[0].volume, 5.0);
    // No volume sample at that timestamp
    assert_eq!(series[1].volume, 0.0);
    assert_eq!(series[2].date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
    assert_eq!(series[2].volume, 7.0);
}

#[tokio::test]
async fn test_fetch_raw_relays_body_untouched() {
    let base = spawn_upstream(market_chart_upstream()).await;
    let client = HttpFeedClient::with_base_url(&base, "bitcoin", "usd").unwrap();

    let body = client.fetch_raw(&Timeframe::Max).await.unwrap();

    assert_eq!(body["days"], "max");
    assert_eq!(body["prices"].as_array().unwrap().len(), 3);
    assert!(body.get("market_caps").is_some());
}

#[tokio::test]
async fn test_snapshot_mode_yields_single_point() {
    let app = Router::new().route(
        "/currentprice.json",
        get(|| async {
            Json(json!({
                "time": {"updatedISO": "2024-03-05T14:30:00+00:00"},
                "bpi": {
                    "USD": {"code": "USD", "rate_float": 67000.5},
                    "EUR": {"code": "EUR", "rate_float": 61000.0}
                }
            }))
        }),
    );
    let base = spawn_upstream(app).await;
    let client = HttpFeedClient::with_base_url(&base, "bitcoin", "usd")
        .unwrap()
        .with_mode(FeedMode::Snapshot)
        .with_snapshot_url(&format!("{}/currentprice.json", base));

    // Timeframe has no effect in snapshot mode
    let series = client.fetch(&Timeframe::Days(365)).await.unwrap();

    assert_eq!(series.len(), 1);
    assert_eq!(series[0].date, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
    assert_eq!(series[0].price, 67000.5);
    assert_eq!(series[0].volume, 0.0);
}

#[tokio::test]
async fn test_non_success_status_is_network_error() {
    let app = Router::new().route(
        "/coins/{asset}/market_chart",
        get(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
    );
    let base = spawn_upstream(app).await;
    let client = HttpFeedClient::with_base_url(&base, "bitcoin", "usd").unwrap();

    let err = client.fetch(&Timeframe::Days(1)).await.unwrap_err();
    assert!(matches!(err, FeedError::Network(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_unrecognized_shape_is_schema_error() {
    let app = Router::new().route(
        "/coins/{asset}/market_chart",
        get(|| async { Json(json!({"status": "ok", "data": [1, 2, 3]})) }),
    );
    let base = spawn_upstream(app).await;
    let client = HttpFeedClient::with_base_url(&base, "bitcoin", "usd").unwrap();

    let err = client.fetch(&Timeframe::Days(1)).await.unwrap_err();
    assert!(matches!(err, FeedError::Schema(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_non_json_body_is_schema_error() {
    let app = Router::new().route(
        "/coins/{asset}/market_chart",
        get(|| async { "<html>maintenance</html>" }),
    );
    let base = spawn_upstream(app).await;
    let client = HttpFeedClient::with_base_url(&base, "bitcoin", "usd").unwrap();

    let err = client.fetch(&Timeframe::Days(1)).await.unwrap_err();
    assert!(matches!(err, FeedError::Schema(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_negative_price_is_schema_error() {
    let app = Router::new().route(
        "/coins/{asset}/market_chart",
        get(|| async { Json(json!({"prices": [[DAY0, -1.0]], "total_volumes": []})) }),
    );
    let base = spawn_upstream(app).await;
    let client = HttpFeedClient::with_base_url(&base, "bitcoin", "usd").unwrap();

    let err = client.fetch(&Timeframe::Days(1)).await.unwrap_err();
    assert!(matches!(err, FeedError::Schema(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_unreachable_upstream_is_network_error() {
    // Bind then drop to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = HttpFeedClient::with_base_url(&format!("http://{}", addr), "bitcoin", "usd").unwrap();

    let err = client.fetch(&Timeframe::Days(1)).await.unwrap_err();
    assert!(matches!(err, FeedError::Network(_)), "got {:?}", err);
    assert_eq!(err.kind(), "network");
}
