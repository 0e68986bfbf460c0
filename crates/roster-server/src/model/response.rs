//! HTTP response types for Roster server
//!
//! Every endpoint answers with the `{ code, message, data }` envelope.

use actix_web::{HttpResponse, HttpResponseBuilder, http::StatusCode};
use roster_common::error::{ErrorCode, SUCCESS};
use serde::{Deserialize, Serialize};

/// Generic result wrapper for API responses
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Result<T> {
    pub code: i32,
    pub message: String,
    pub data: T,
}

impl<T> Result<T> {
    pub fn new(code: i32, message: String, data: T) -> Self {
        Result::<T> {
            code,
            message,
            data,
        }
    }

    pub fn success(data: T) -> Result<T> {
        Result::<T> {
            code: SUCCESS.code,
            message: SUCCESS.message.to_string(),
            data,
        }
    }

    pub fn http_success(data: impl Serialize) -> HttpResponse {
        HttpResponse::Ok().json(Result::success(data))
    }

    pub fn http_response(
        status: u16,
        code: i32,
        message: String,
        data: impl Serialize,
    ) -> HttpResponse {
        HttpResponseBuilder::new(StatusCode::from_u16(status).unwrap_or_default())
            .json(Result::new(code, message, data))
    }

    /// Respond with an error code and a detail message
    pub fn http_error(status: u16, error_code: ErrorCode<'_>, detail: &str, data: impl Serialize) -> HttpResponse {
        Self::http_response(
            status,
            error_code.code,
            format!("{}: {}", error_code.message, detail),
            data,
        )
    }
}
