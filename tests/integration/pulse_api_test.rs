//! Integration tests for the HTTP surface
//!
//! The router is driven in-process through `tower::ServiceExt::oneshot`. The
//! live pipeline runs on a scripted feed; the proxy route talks to a stub
//! upstream on a loopback port.
//! Run with: `cargo test --test pulse_api_test`

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use pricepulse_gateway::api::routes::create_router;
use pricepulse_gateway::api::state::AppState;
use pricepulse_gateway::application::{PollScheduler, ProxyService};
use pricepulse_gateway::domain::{FeedError, FeedSource, PricePoint, ReferencePolicy, Timeframe};
use pricepulse_gateway::infrastructure::{HttpFeedClient, RateLimiter};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Feed that returns scripted results and records requested timeframes
struct ScriptedFeed {
    responses: Mutex<Vec<Result<Vec<PricePoint>, FeedError>>>,
    requested: Mutex<Vec<Timeframe>>,
}

impl ScriptedFeed {
    fn new(responses: Vec<Result<Vec<PricePoint>, FeedError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().rev().collect()),
            requested: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl FeedSource for ScriptedFeed {
    async fn fetch(&self, timeframe: &Timeframe) -> Result<Vec<PricePoint>, FeedError> {
        self.requested.lock().unwrap().push(*timeframe);
        self.responses
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(FeedError::Network("script exhausted".into())))
    }
}

fn series(prices: &[f64]) -> Vec<PricePoint> {
    prices
        .iter()
        .enumerate()
        .map(|(i, price)| PricePoint {
            date: NaiveDate::from_ymd_opt(2024, 1, 1 + i as u32).unwrap(),
            price: *price,
            volume: 1000.0,
        })
        .collect()
}

async fn spawn_upstream(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

struct TestApp {
    router: Router,
    feed: Arc<ScriptedFeed>,
}

async fn test_app(
    responses: Vec<Result<Vec<PricePoint>, FeedError>>,
    upstream: Router,
    requests_per_minute: u32,
) -> TestApp {
    let feed = ScriptedFeed::new(responses);
    let scheduler = Arc::new(PollScheduler::new(
        feed.clone() as Arc<dyn FeedSource>,
        Timeframe::Days(30),
        ReferencePolicy::PreviousSample,
    ));

    let base = spawn_upstream(upstream).await;
    let client = Arc::new(HttpFeedClient::with_base_url(&base, "bitcoin", "usd").unwrap());
    let proxy_service = Arc::new(ProxyService::new(
        client,
        Arc::new(RateLimiter::new(requests_per_minute)),
    ));

    let state = AppState {
        scheduler,
        proxy_service,
        metrics_handle: None,
    };

    TestApp {
        router: create_router(state, "*".to_string()),
        feed,
    }
}

fn chart_upstream() -> Router {
    Router::new().route(
        "/coins/{asset}/market_chart",
        get(|| async {
            Json(json!({
                "prices": [[1704067200000i64, 42000.0]],
                "market_caps": [[1704067200000i64, 1.0]],
                "total_volumes": [[1704067200000i64, 12.0]]
            }))
        }),
    )
}

fn failing_upstream() -> Router {
    Router::new().route(
        "/coins/{asset}/market_chart",
        get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
    )
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_snapshot_before_first_fetch_is_idle() {
    let app = test_app(vec![], chart_upstream(), 10).await;

    let (status, body) = send(&app.router, Method::GET, "/v1/pulse", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "idle");
    assert_eq!(body["isLoading"], false);
    assert_eq!(body["timeframe"], "30");
    assert!(body["seriesTimeframe"].is_null());
    assert_eq!(body["series"], json!([]));
    assert_eq!(body["metrics"]["currentPrice"], 0.0);
    assert!(body["error"].is_null());
}

#[tokio::test]
async fn test_refetch_publishes_series_and_metrics() {
    let app = test_app(vec![Ok(series(&[100.0, 110.0, 90.0]))], chart_upstream(), 10).await;

    let (status, body) = send(&app.router, Method::POST, "/v1/pulse/refetch", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "applied");
    let snapshot = &body["snapshot"];
    assert_eq!(snapshot["phase"], "ready");
    assert_eq!(snapshot["series"].as_array().unwrap().len(), 3);
    assert_eq!(snapshot["series"][0]["date"], "2024-01-01");
    assert_eq!(snapshot["chartSeries"].as_array().unwrap().len(), 6);
    assert_eq!(snapshot["chartSeries"][1]["isGap"], true);
    assert_eq!(snapshot["chartSeries"][1]["volume"], 0.0);
    assert_eq!(snapshot["metrics"]["currentPrice"], 90.0);
    assert_eq!(snapshot["metrics"]["absoluteChange"], -20.0);
}

#[tokio::test]
async fn test_failed_refetch_keeps_last_known_good_series() {
    let app = test_app(
        vec![
            Ok(series(&[100.0, 110.0])),
            Err(FeedError::Schema("unexpected body".into())),
        ],
        chart_upstream(),
        10,
    )
    .await;

    send(&app.router, Method::POST, "/v1/pulse/refetch", None).await;
    let (status, body) = send(&app.router, Method::POST, "/v1/pulse/refetch", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "failed");
    let snapshot = &body["snapshot"];
    assert_eq!(snapshot["phase"], "failed");
    assert_eq!(snapshot["error"]["kind"], "schema");
    assert_eq!(snapshot["series"].as_array().unwrap().len(), 2);
    assert_eq!(snapshot["metrics"]["currentPrice"], 110.0);

    // Health reflects the failed poll
    let (status, body) = send(&app.router, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["dependencies"]["feed"], "failed");
}

#[tokio::test]
async fn test_timeframe_change_fetches_new_window() {
    let app = test_app(vec![Ok(series(&[5.0, 6.0]))], chart_upstream(), 10).await;

    let (status, body) = send(
        &app.router,
        Method::PUT,
        "/v1/pulse/timeframe",
        Some(json!({"timeframe": "1w"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "applied");
    assert_eq!(body["snapshot"]["timeframe"], "7");
    assert_eq!(body["snapshot"]["seriesTimeframe"], "7");
    assert_eq!(*app.feed.requested.lock().unwrap(), vec![Timeframe::Days(7)]);
}

#[tokio::test]
async fn test_invalid_timeframe_is_rejected() {
    let app = test_app(vec![], chart_upstream(), 10).await;

    let (status, body) = send(
        &app.router,
        Method::PUT,
        "/v1/pulse/timeframe",
        Some(json!({"timeframe": "2w"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid timeframe");
    assert!(app.feed.requested.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_tooltip_for_known_and_unknown_index() {
    let app = test_app(vec![Ok(series(&[100.0, 110.0, 90.0]))], chart_upstream(), 10).await;
    send(&app.router, Method::POST, "/v1/pulse/refetch", None).await;

    let (status, body) = send(&app.router, Method::GET, "/v1/pulse/tooltip/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["price"], 110.0);
    assert_eq!(body["absoluteChange"], 10.0);
    assert_eq!(body["percentChange"], 10.0);

    let (status, body) = send(&app.router, Method::GET, "/v1/pulse/tooltip/0", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["absoluteChange"], 0.0);

    let (status, _) = send(&app.router, Method::GET, "/v1/pulse/tooltip/3", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_ok_when_idle() {
    let app = test_app(vec![], chart_upstream(), 10).await;

    let (status, body) = send(&app.router, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body.get("version").is_some());
}

#[tokio::test]
async fn test_metrics_unavailable_without_recorder() {
    let app = test_app(vec![], chart_upstream(), 10).await;

    let response = app
        .router
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_market_data_relays_upstream_body() {
    let app = test_app(vec![], chart_upstream(), 10).await;

    let (status, body) = send(&app.router, Method::GET, "/api/market-data?days=30", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prices"][0][1], 42000.0);
    assert!(body.get("market_caps").is_some());
    assert!(body.get("total_volumes").is_some());
}

#[tokio::test]
async fn test_market_data_upstream_failure_is_500() {
    let app = test_app(vec![], failing_upstream(), 10).await;

    let (status, body) = send(&app.router, Method::GET, "/api/market-data?days=7", None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Error fetching market data"}));
}

#[tokio::test]
async fn test_market_data_rejects_bad_days() {
    let app = test_app(vec![], chart_upstream(), 10).await;

    let (status, _) = send(&app.router, Method::GET, "/api/market-data?days=soon", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_market_data_throttled_after_budget() {
    let app = test_app(vec![], chart_upstream(), 2).await;

    for _ in 0..2 {
        let (status, _) = send(&app.router, Method::GET, "/api/market-data", None).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = send(&app.router, Method::GET, "/api/market-data", None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "Too many requests");

    let (status, body) = send(&app.router, Method::GET, "/rate-limit", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resources"]["proxy"]["limit"], 2);
    assert_eq!(body["resources"]["proxy"]["remaining"], 0);
}

#[tokio::test]
async fn test_openapi_document_lists_pulse_routes() {
    let app = test_app(vec![], chart_upstream(), 10).await;

    let (status, body) = send(&app.router, Method::GET, "/v1/openapi.json", None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"].get("/v1/pulse").is_some());
    assert!(body["paths"].get("/api/market-data").is_some());
}
