use crate::application::{PollScheduler, ProxyService};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<PollScheduler>,
    pub proxy_service: Arc<ProxyService>,
    /// Installed once at startup; absent in tests
    pub metrics_handle: Option<PrometheusHandle>,
}
