//! Error types and error codes for Roster
//!
//! This module defines:
//! - `RosterError`: Registry-level error enum
//! - `ErrorCode`: Structured error codes for API responses

use serde::{Deserialize, Serialize};

/// Registry error types
///
/// None of these is fatal to the process. `NotFound` tells the caller to
/// re-register, `ReplicationFailure` never reaches the registering client.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RosterError {
    #[error("instance '{instance_id}' of service '{service_name}' not found")]
    NotFound {
        service_name: String,
        instance_id: String,
    },

    #[error("malformed registration: {0}")]
    MalformedRegistration(String),

    #[error("replication to peer '{peer}' failed: {message}")]
    ReplicationFailure { peer: String, message: String },

    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl RosterError {
    pub fn not_found(service_name: &str, instance_id: &str) -> Self {
        RosterError::NotFound {
            service_name: service_name.to_string(),
            instance_id: instance_id.to_string(),
        }
    }

    pub fn replication(peer: &str, message: impl Into<String>) -> Self {
        RosterError::ReplicationFailure {
            peer: peer.to_string(),
            message: message.into(),
        }
    }

    /// HTTP status matching this error kind
    pub fn http_status(&self) -> u16 {
        match self {
            RosterError::NotFound { .. } => 404,
            RosterError::MalformedRegistration(_) => 400,
            RosterError::IllegalState(_) => 409,
            RosterError::ReplicationFailure { .. } => 503,
            RosterError::ConfigError(_) | RosterError::InternalError(_) => 500,
        }
    }

    /// API error code matching this error kind
    pub fn error_code(&self) -> ErrorCode<'static> {
        match self {
            RosterError::NotFound { .. } => INSTANCE_NOT_FOUND,
            RosterError::MalformedRegistration(_) => PARAMETER_VALIDATE_ERROR,
            RosterError::IllegalState(_) => ILLEGAL_STATE,
            RosterError::ReplicationFailure { .. } => NODE_SYNC_ERROR,
            RosterError::ConfigError(_) | RosterError::InternalError(_) => SERVER_ERROR,
        }
    }
}

/// Result alias used throughout the registry crates
pub type RosterResult<T> = std::result::Result<T, RosterError>;

/// Error code structure for API responses
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCode<'a> {
    pub code: i32,
    pub message: &'a str,
}

pub const SUCCESS: ErrorCode<'static> = ErrorCode {
    code: 0,
    message: "success",
};

pub const PARAMETER_MISSING: ErrorCode<'static> = ErrorCode {
    code: 10000,
    message: "parameter missing",
};

pub const PARAMETER_VALIDATE_ERROR: ErrorCode<'static> = ErrorCode {
    code: 20002,
    message: "parameter validate error",
};

pub const RESOURCE_NOT_FOUND: ErrorCode<'static> = ErrorCode {
    code: 20004,
    message: "resource not found",
};

pub const INSTANCE_NOT_FOUND: ErrorCode<'static> = ErrorCode {
    code: 21003,
    message: "instance not found",
};

pub const INSTANCE_STATUS_ERROR: ErrorCode<'static> = ErrorCode {
    code: 21004,
    message: "instance status error",
};

pub const ILLEGAL_STATE: ErrorCode<'static> = ErrorCode {
    code: 23000,
    message: "illegal state",
};

pub const NODE_SYNC_ERROR: ErrorCode<'static> = ErrorCode {
    code: 23003,
    message: "peer node sync error",
};

pub const SERVER_ERROR: ErrorCode<'static> = ErrorCode {
    code: 30000,
    message: "server error",
};
