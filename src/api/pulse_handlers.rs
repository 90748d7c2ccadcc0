//! HTTP handlers for the live price pipeline and the feed proxy.
//!
//! The pulse endpoints expose what a chart renderer consumes: the current
//! series, the gap-annotated chart series, headline metrics, loading/error
//! state, plus the refetch and timeframe controls.

use crate::api::state::AppState;
use crate::application::{PollOutcome, ProxyError, PulseSnapshot};
use crate::domain::{PointChange, Timeframe};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use tracing::{error, instrument};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

// ============================================================================
// Request / Response Types
// ============================================================================

/// Query parameters for the market data proxy
#[derive(Debug, Clone, Deserialize, IntoParams, Validate)]
pub struct MarketDataQuery {
    /// Day count or duration code (e.g. "30", "1w", "max")
    #[serde(default = "default_days")]
    #[param(default = "30", example = "1w")]
    #[validate(length(min = 1, max = 10))]
    pub days: String,
}

fn default_days() -> String {
    "30".to_string()
}

/// Body for switching the active timeframe
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct TimeframeRequest {
    /// Day count or duration code (e.g. "1d", "1w", "1m", "max")
    #[validate(length(min = 1, max = 10))]
    #[schema(example = "1w")]
    pub timeframe: String,
}

/// Result of a forced fetch together with the resulting state
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PollResponse {
    pub outcome: PollOutcome,
    pub snapshot: PulseSnapshot,
}

/// Error response
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(error: &str, details: String) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: error.to_string(),
            details: Some(details),
        }),
    )
}

fn parse_timeframe(raw: &str) -> Result<Timeframe, ApiError> {
    raw.parse::<Timeframe>()
        .map_err(|e| bad_request("Invalid timeframe", e.to_string()))
}

/// Run a scheduler operation on its own task so a dropped request does not
/// abandon the fetch halfway.
async fn run_detached<F>(fut: F) -> Result<PollOutcome, ApiError>
where
    F: Future<Output = PollOutcome> + Send + 'static,
{
    tokio::spawn(fut).await.map_err(|e| {
        error!("Scheduler task failed: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Fetch task failed".to_string(),
                details: None,
            }),
        )
    })
}

// ============================================================================
// Pulse Handlers
// ============================================================================

/// Get the current pipeline snapshot
#[utoipa::path(
    get,
    path = "/v1/pulse",
    responses(
        (status = 200, description = "Current series, chart series, metrics and poll state", body = PulseSnapshot)
    ),
    description = "Returns the last-known-good series with its gap-annotated chart series and headline metrics. `isLoading` and `error` describe the latest poll; the data stays visible while either is set.",
    tag = "Pulse"
)]
pub async fn snapshot_handler(State(state): State<AppState>) -> Json<PulseSnapshot> {
    Json(state.scheduler.snapshot())
}

/// Force an immediate fetch
#[utoipa::path(
    post,
    path = "/v1/pulse/refetch",
    responses(
        (status = 200, description = "Fetch completed (applied, failed or discarded)", body = PollResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Pulse"
)]
#[instrument(skip(state))]
pub async fn refetch_handler(
    State(state): State<AppState>,
) -> Result<Json<PollResponse>, ApiError> {
    let scheduler = state.scheduler.clone();
    let outcome = run_detached(async move { scheduler.refetch().await }).await?;
    Ok(Json(PollResponse {
        outcome,
        snapshot: state.scheduler.snapshot(),
    }))
}

/// Switch the active timeframe
#[utoipa::path(
    put,
    path = "/v1/pulse/timeframe",
    request_body = TimeframeRequest,
    responses(
        (status = 200, description = "Timeframe switched and fetched", body = PollResponse),
        (status = 400, description = "Invalid timeframe", body = ErrorResponse)
    ),
    description = "Any fetch still in flight for the previous timeframe is invalidated; its response will be discarded.",
    tag = "Pulse"
)]
#[instrument(skip(state))]
pub async fn timeframe_handler(
    State(state): State<AppState>,
    Json(request): Json<TimeframeRequest>,
) -> Result<Json<PollResponse>, ApiError> {
    if let Err(validation_errors) = request.validate() {
        return Err(bad_request("Validation failed", format!("{:?}", validation_errors)));
    }
    let timeframe = parse_timeframe(&request.timeframe)?;

    let scheduler = state.scheduler.clone();
    let outcome = run_detached(async move { scheduler.set_timeframe(timeframe).await }).await?;
    Ok(Json(PollResponse {
        outcome,
        snapshot: state.scheduler.snapshot(),
    }))
}

/// Change metrics for a hovered chart index
#[utoipa::path(
    get,
    path = "/v1/pulse/tooltip/{index}",
    params(
        ("index" = usize, Path, description = "Chart point index (the `index` field, not the array position)", example = 3)
    ),
    responses(
        (status = 200, description = "Change against the reference sample", body = PointChange),
        (status = 404, description = "No sample at that index", body = ErrorResponse)
    ),
    tag = "Pulse"
)]
pub async fn tooltip_handler(
    Path(index): Path<usize>,
    State(state): State<AppState>,
) -> Result<Json<PointChange>, ApiError> {
    state.scheduler.tooltip(index).map(Json).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("No sample at index {}", index),
                details: None,
            }),
        )
    })
}

// ============================================================================
// Proxy Handler
// ============================================================================

/// Relay upstream market chart data
#[utoipa::path(
    get,
    path = "/api/market-data",
    params(MarketDataQuery),
    responses(
        (status = 200, description = "Upstream JSON body, unchanged", body = serde_json::Value),
        (status = 400, description = "Invalid timeframe", body = ErrorResponse),
        (status = 429, description = "Upstream budget exhausted", body = ErrorResponse),
        (status = 500, description = "Upstream request failed", body = ErrorResponse)
    ),
    description = "Read-only pass-through so browsers never call the upstream host directly.",
    tag = "Proxy"
)]
#[instrument(skip(state))]
pub async fn market_data_handler(
    Query(query): Query<MarketDataQuery>,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    if let Err(validation_errors) = query.validate() {
        return Err(bad_request("Validation failed", format!("{:?}", validation_errors)));
    }
    let timeframe = parse_timeframe(&query.days)?;

    let result = state.proxy_service.relay(&timeframe).await;
    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(ProxyError::Throttled) => StatusCode::TOO_MANY_REQUESTS,
        Err(ProxyError::Upstream(_)) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    metrics::counter!("proxy_requests_total", "status" => status.as_u16().to_string()).increment(1);

    result.map(Json).map_err(|e| {
        let message = match e {
            ProxyError::Throttled => "Too many requests".to_string(),
            ProxyError::Upstream(e) => {
                error!("Proxy upstream failure: {}", e);
                "Error fetching market data".to_string()
            }
        };
        (
            status,
            Json(ErrorResponse {
                error: message,
                details: None,
            }),
        )
    })
}
