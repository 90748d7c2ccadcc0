use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        // System Handlers
        crate::api::handlers::health_handler,
        crate::api::handlers::metrics_handler,
        crate::api::handlers::rate_limit_handler,
        // Pulse Handlers
        crate::api::pulse_handlers::snapshot_handler,
        crate::api::pulse_handlers::refetch_handler,
        crate::api::pulse_handlers::timeframe_handler,
        crate::api::pulse_handlers::tooltip_handler,
        // Proxy Handler
        crate::api::pulse_handlers::market_data_handler
    ),
    components(
        schemas(
            crate::api::handlers::HealthResponse,
            crate::api::handlers::HealthDependencies,
            crate::api::handlers::RateLimitResponse,
            crate::api::handlers::RateLimitResources,
            crate::api::handlers::RateLimitInfo,
            crate::api::pulse_handlers::TimeframeRequest,
            crate::api::pulse_handlers::PollResponse,
            crate::api::pulse_handlers::ErrorResponse,
            crate::application::PulseSnapshot,
            crate::application::PollOutcome,
            crate::application::PollPhase,
            crate::application::poll_scheduler::PollError,
            crate::domain::PricePoint,
            crate::domain::ChartPoint,
            crate::domain::DerivedMetrics,
            crate::domain::PointChange
        )
    ),
    tags(
        (name = "system", description = "System endpoints for health checks and metrics"),
        (name = "Pulse", description = "Live price series, headline metrics and poll control"),
        (name = "Proxy", description = "Same-origin relay of upstream market chart data")
    ),
    info(
        title = "Price Pulse Gateway",
        version = "0.1.0",
        description = "Polls a market price feed, normalizes it into a daily series and serves chart-ready series, headline change metrics and a rate-limited upstream relay."
    )
)]
pub struct ApiDoc;
