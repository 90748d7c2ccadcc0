pub mod metrics_deriver;
pub mod poll_scheduler;
pub mod proxy_service;
pub mod series_transformer;
pub mod tooltip;

pub use metrics_deriver::derive_metrics;
pub use poll_scheduler::{PollHandle, PollOutcome, PollPhase, PollScheduler, PulseSnapshot};
pub use proxy_service::{ProxyError, ProxyService};
pub use series_transformer::to_chart_series;
pub use tooltip::tooltip_metrics;
