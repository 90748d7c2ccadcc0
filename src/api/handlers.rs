use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::api::state::AppState;
use crate::application::PollPhase;
use utoipa::ToSchema;

#[allow(unused_imports)]
use serde_json::json; // Used in utoipa::path examples

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub mode: String,
    pub dependencies: HealthDependencies,
}

#[derive(Serialize, ToSchema)]
pub struct HealthDependencies {
    /// Scheduler phase of the upstream feed
    pub feed: PollPhase,
}

/// Liveness plus the state of the feed poller.
///
/// Reports `degraded` with 503 while the last accepted poll failed; the
/// service keeps serving last-known-good data meanwhile.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Health check passed", body = HealthResponse),
        (status = 503, description = "Last feed poll failed", body = HealthResponse)
    )
)]
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    let phase = state.scheduler.state().phase;
    let overall_status = if phase == PollPhase::Failed {
        "degraded"
    } else {
        "ok"
    };

    let response = HealthResponse {
        status: overall_status.to_string(),
        version: VERSION.to_string(),
        mode: "read-only".to_string(),
        dependencies: HealthDependencies { feed: phase },
    };

    if overall_status == "ok" {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

#[utoipa::path(
    get,
    path = "/metrics",
    tag = "system",
    responses(
        (status = 200, description = "Prometheus metrics", content_type = "text/plain"),
        (status = 503, description = "Metrics recorder not installed")
    )
)]
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics_handle {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed".to_string(),
        ),
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct RateLimitResponse {
    pub resources: RateLimitResources,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct RateLimitResources {
    /// Budget for proxied market-data requests
    pub proxy: RateLimitInfo,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    pub reset: i64,
    pub used: u32,
}

/// Get the upstream request budget of the proxy route.
#[utoipa::path(
    get,
    path = "/rate-limit",
    tag = "system",
    responses(
        (status = 200, description = "Rate limit status retrieved successfully", body = RateLimitResponse,
            example = json!({
                "resources": {
                    "proxy": {
                        "limit": 30,
                        "remaining": 28,
                        "reset": 1735678800,
                        "used": 2
                    }
                }
            })
        )
    )
)]
#[instrument(skip(state))]
pub async fn rate_limit_handler(State(state): State<AppState>) -> Json<RateLimitResponse> {
    let stats = state.proxy_service.rate_limiter().get_stats().await;

    Json(RateLimitResponse {
        resources: RateLimitResources {
            proxy: RateLimitInfo {
                limit: stats.limit,
                remaining: stats.remaining,
                reset: stats.reset,
                used: stats.used,
            },
        },
    })
}
