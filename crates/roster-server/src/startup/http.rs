//! HTTP server setup

use std::sync::Arc;

use actix_web::{
    App, HttpServer,
    dev::Server,
    middleware::{Compress, Logger, from_fn},
    web,
};

use crate::{api, metrics::http_metrics, model::app_state::AppState};

/// Creates and binds the registry HTTP server.
///
/// Every route lives under `context_path`; see [`api::route::routes`].
pub fn main_server(
    app_state: Arc<AppState>,
    context_path: String,
    address: String,
    port: u16,
) -> Result<Server, std::io::Error> {
    Ok(HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Compress::default())
            .wrap(from_fn(http_metrics))
            .app_data(web::Data::from(app_state.clone()))
            .app_data(api::json_config())
            .service(web::scope(&context_path).service(api::route::routes()))
            .default_service(web::to(api::not_found))
    })
    .disable_signals()
    .bind((address, port))?
    .run())
}
