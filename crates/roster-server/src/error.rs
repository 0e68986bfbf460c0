// Error handling for the HTTP layer
// Maps registry errors onto HTTP status codes and the response envelope

use std::fmt::{Display, Formatter};

use actix_web::HttpResponse;
use actix_web::http::StatusCode;

pub use roster_common::error::{
    INSTANCE_NOT_FOUND, INSTANCE_STATUS_ERROR, PARAMETER_MISSING, PARAMETER_VALIDATE_ERROR,
    RESOURCE_NOT_FOUND, RosterError, SERVER_ERROR,
};

use crate::model::response::Result;

// Local wrapper for application errors to implement actix-web error handling
// (Cannot impl foreign trait for foreign type due to orphan rules)
#[derive(Debug)]
pub struct AppError {
    inner: anyhow::Error,
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError { inner: value }
    }
}

impl From<RosterError> for AppError {
    fn from(value: RosterError) -> Self {
        AppError {
            inner: anyhow::Error::new(value),
        }
    }
}

impl AppError {
    pub fn inner(&self) -> &anyhow::Error {
        &self.inner
    }

    pub fn downcast_ref<E: std::error::Error + Send + Sync + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }
}

impl actix_web::error::ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        let status = self
            .downcast_ref::<RosterError>()
            .map(|e| e.http_status())
            .unwrap_or(500);
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        match self.downcast_ref::<RosterError>() {
            Some(e) => {
                let code = e.error_code();
                Result::<Option<()>>::http_response(e.http_status(), code.code, e.to_string(), None::<()>)
            }
            None => Result::<Option<()>>::http_response(
                500,
                SERVER_ERROR.code,
                self.inner.to_string(),
                None::<()>,
            ),
        }
    }
}
