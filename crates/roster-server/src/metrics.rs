// Metrics module for observability
// Installs the Prometheus recorder and records per-request HTTP metrics

use std::time::Instant;

use actix_web::{
    Error,
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    middleware::Next,
};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and describe all metrics
///
/// Returns `None` when a recorder is already installed; metrics then go to
/// that recorder and `/v1/ops/metrics` answers 503.
pub fn init_metrics() -> Option<PrometheusHandle> {
    let handle = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::error!("Failed to install Prometheus metrics exporter: {}", e);
            None
        }
    };

    describe_counter!(
        "http_requests_total",
        "Total number of HTTP requests received"
    );
    describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_counter!(
        "http_requests_errors_total",
        "Total number of HTTP request errors"
    );

    roster_registry::metrics::describe_metrics();

    tracing::info!("Metrics initialized");
    handle
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string(), "status" => status.to_string()).increment(1);
    histogram!("http_request_duration_seconds", "method" => method.to_string(), "path" => path.to_string()).record(duration_secs);

    if status >= 400 {
        counter!("http_requests_errors_total", "method" => method.to_string(), "path" => path.to_string(), "status" => status.to_string()).increment(1);
    }
}

/// Middleware timing every request; labels use the route pattern, not the raw path
pub async fn http_metrics(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let started = Instant::now();
    let method = req.method().to_string();

    let res = next.call(req).await?;

    let path = res
        .request()
        .match_pattern()
        .unwrap_or_else(|| "unmatched".to_string());
    record_http_request(
        &method,
        &path,
        res.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    Ok(res)
}
