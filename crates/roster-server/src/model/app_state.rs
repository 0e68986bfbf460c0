//! Shared state handed to every HTTP handler

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use roster_registry::Registry;

use super::server_status::ServerStatusManager;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub server_status: ServerStatusManager,
    /// Renders the Prometheus exposition; absent when no recorder was installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        registry: Arc<Registry>,
        server_status: ServerStatusManager,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            registry,
            server_status,
            metrics,
        }
    }
}
