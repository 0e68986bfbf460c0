//! Application startup utilities module.

mod http;
pub mod logging;
mod self_registration;
mod shutdown;

pub use http::main_server;
pub use logging::{LoggingConfig, LoggingGuard, init_logging};
pub use self_registration::SelfRegistration;
pub use shutdown::{GracefulShutdown, wait_for_shutdown_signal};
