//! Roster Server - HTTP front end of the service registry
//!
//! - `api`: registration, query, replication and ops endpoints
//! - `model`: configuration, application state, response envelope
//! - `startup`: logging, HTTP server, self-registration, shutdown

pub mod api;
pub mod error;
pub mod metrics;
pub mod model;
pub mod startup;
