//! Liveness and readiness probes

use actix_web::{Responder, get, web};

use crate::error::SERVER_ERROR;
use crate::model::{app_state::AppState, response::Result};

/// GET /v1/health/liveness
///
/// Returns "ok" while the process is alive.
#[get("/liveness")]
pub async fn liveness() -> impl Responder {
    Result::<String>::http_success("ok".to_string())
}

/// GET /v1/health/readiness
///
/// Returns 503 until startup has finished, and again once shutdown begins.
#[get("/readiness")]
pub async fn readiness(data: web::Data<AppState>) -> impl Responder {
    if !data.server_status.is_up() {
        let status = data.server_status.status().to_string();
        return Result::<String>::http_response(
            503,
            SERVER_ERROR.code,
            format!("server is {} now, please try again later!", status),
            "not ready".to_string(),
        );
    }
    Result::<String>::http_success("ok".to_string())
}
