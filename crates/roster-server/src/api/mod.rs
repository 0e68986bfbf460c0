//! HTTP API of the registry

use actix_web::{HttpRequest, HttpResponse, error::InternalError, web};

use crate::error::{AppError, PARAMETER_VALIDATE_ERROR, RESOURCE_NOT_FOUND};
use crate::model::response::Result;

pub mod health;
pub mod instance;
pub mod model;
pub mod ops;
pub mod peer;
pub mod route;

/// Handler result; errors render through [`AppError`]
pub type ApiResult = std::result::Result<HttpResponse, AppError>;

/// JSON extractor settings: undecodable bodies answer 400 in the response envelope
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let detail = err.to_string();
        InternalError::from_response(
            err,
            Result::<bool>::http_error(400, PARAMETER_VALIDATE_ERROR, &detail, false),
        )
        .into()
    })
}

/// Fallback for unmatched routes
pub async fn not_found(req: HttpRequest) -> HttpResponse {
    Result::<bool>::http_error(404, RESOURCE_NOT_FOUND, req.path(), false)
}
