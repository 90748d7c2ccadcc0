//! Price Pulse Gateway
//!
//! A REST gateway that polls a public market-data feed, normalizes it into a
//! daily price series and serves chart-ready series plus headline change
//! metrics. A rate-limited relay exposes the raw upstream time series on the
//! same origin.
//!
//! # Architecture
//!
//! - **Domain**: price entities, timeframe selector and the `FeedSource` trait
//! - **Application**: metric derivation, chart series, tooltips, poll scheduler
//! - **Infrastructure**: upstream HTTP client and the proxy rate limiter
//! - **API**: HTTP handlers, routing and middleware
//!
//! # Configuration
//!
//! The gateway reads `config.yaml` (or `CONFIG_PATH`) and these variables:
//! - `PORT`: listen port override
//! - `FEED_BASE_URL`: upstream base URL override
//! - `RUST_LOG`: logging level (default: info)
//! - `LOG_FORMAT`: `json` for structured logs, anything else for text
//!
//! # Quick Start
//!
//! ```bash
//! cargo run --release
//!
//! curl http://localhost:3010/health
//! curl http://localhost:3010/v1/pulse
//! curl -X PUT http://localhost:3010/v1/pulse/timeframe -H 'content-type: application/json' -d '{"timeframe":"1w"}'
//! curl "http://localhost:3010/api/market-data?days=30"
//! ```

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use pricepulse_gateway::api::routes::create_router;
use pricepulse_gateway::api::state::AppState;
use pricepulse_gateway::application::{PollScheduler, ProxyService};
use pricepulse_gateway::config::AppConfig;
use pricepulse_gateway::domain::FeedSource;
use pricepulse_gateway::infrastructure::{HttpFeedClient, RateLimiter};
use std::env;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let env_filter = EnvFilter::new(env::var("RUST_LOG").unwrap_or_else(|_| "info".into()));

    if log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // Load Config
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
    let mut config = AppConfig::load(&config_path)?;
    config.apply_env_overrides();
    let timeframe = config.feed.timeframe()?;

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    // Infrastructure
    let feed_client = Arc::new(
        HttpFeedClient::with_base_url(
            &config.feed.base_url,
            &config.feed.asset,
            &config.feed.vs_currency,
        )?
        .with_mode(config.feed.mode)
        .with_snapshot_url(&config.feed.snapshot_url),
    );
    tracing::info!(
        "Feed client initialized: mode={}, asset={}, vs={}",
        config.feed.mode.as_str(),
        config.feed.asset,
        config.feed.vs_currency
    );

    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.requests_per_minute));
    tracing::info!(
        "Rate limiter initialized: {} requests/minute",
        config.rate_limit.requests_per_minute
    );

    // Application
    let scheduler = Arc::new(PollScheduler::new(
        feed_client.clone() as Arc<dyn FeedSource>,
        timeframe,
        config.feed.reference_policy,
    ));
    let poller = scheduler.spawn(config.feed.poll_interval());

    let proxy_service = Arc::new(ProxyService::new(feed_client, rate_limiter));

    let state = AppState {
        scheduler,
        proxy_service,
        metrics_handle: Some(metrics_handle),
    };

    let app = create_router(state, config.server.allowed_origins.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to address {}", addr))?;
    tracing::info!("Price Pulse gateway running at http://{}", addr);

    // Graceful shutdown handling
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error during operation")?;

    poller.shutdown();
    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C) to initiate graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}
