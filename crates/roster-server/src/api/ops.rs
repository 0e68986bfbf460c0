//! Operational endpoints: registry overview and Prometheus exposition

use actix_web::{HttpResponse, Responder, get, http::header::ContentType, web};
use roster_registry::RegistryOverview;

use crate::error::SERVER_ERROR;
use crate::model::{app_state::AppState, response::Result};

/// GET /v1/ops/status
#[get("/status")]
pub async fn status(data: web::Data<AppState>) -> impl Responder {
    Result::<RegistryOverview>::http_success(data.registry.overview())
}

/// GET /v1/ops/metrics
///
/// Plain-text exposition format, not wrapped in the response envelope.
#[get("/metrics")]
pub async fn metrics(data: web::Data<AppState>) -> impl Responder {
    match &data.metrics {
        Some(handle) => HttpResponse::Ok()
            .content_type(ContentType::plaintext())
            .body(handle.render()),
        None => Result::<bool>::http_error(503, SERVER_ERROR, "metrics recorder not installed", false),
    }
}
