//! Roster Common - Shared types and utilities
//!
//! This crate provides the foundational pieces used across all Roster crates:
//! - Error types and error codes
//! - Registration input validation
//! - Utility functions and macros

pub mod error;
pub mod macros;
pub mod utils;
pub mod validation;

// Re-exports for convenience
pub use error::{ErrorCode, RosterError, RosterResult};
pub use utils::{is_valid, local_ip, now_millis, url_host_port};

/// Scheme used when a registration does not name one
pub const DEFAULT_SCHEME: &str = "http";

/// Service name under which a registry node registers itself
pub const DEFAULT_REGISTRY_SERVICE_NAME: &str = "roster-registry";

/// Request field names
pub const SERVICE_NAME: &str = "serviceName";
pub const INSTANCE_ID: &str = "instanceId";
pub const HOST: &str = "host";
pub const PORT: &str = "port";
pub const SCHEME: &str = "scheme";
pub const METADATA: &str = "metadata";
