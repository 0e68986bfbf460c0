//! Main entry point for the Roster registry server.

use std::sync::Arc;

use roster_common::local_ip;
use roster_registry::{HttpPeerClient, Registry};
use roster_server::{
    metrics,
    model::{app_state::AppState, config::Configuration, server_status::ServerStatusManager},
    startup::{self, GracefulShutdown, LoggingConfig, SelfRegistration},
};
use tracing::{error, info};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let configuration = match Configuration::new() {
        Ok(configuration) => configuration,
        Err(e) => {
            let _logging_guard = startup::init_logging(&LoggingConfig::from_env())?;
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let _logging_guard = startup::init_logging(&configuration.logging_config())?;
    let metrics_handle = metrics::init_metrics();

    let server_address = configuration.server_address();
    let server_port = configuration.server_port();
    let context_path = configuration.context_path();
    let registry_config = configuration.registry_config();

    let peer_client = HttpPeerClient::new(&context_path, registry_config.replication.request_timeout)?;
    let registry = Arc::new(Registry::new(registry_config, Arc::new(peer_client)));

    let shutdown = startup::wait_for_shutdown_signal();
    let graceful_shutdown = GracefulShutdown::new(shutdown, configuration.shutdown_timeout());

    let mut background = registry.start(&graceful_shutdown.signal()).await;

    let server_status = ServerStatusManager::new();
    let app_state = Arc::new(AppState::new(
        registry.clone(),
        server_status.clone(),
        metrics_handle,
    ));

    info!(
        node_id = %registry.node_id(),
        "Starting registry server on {}:{}{}",
        server_address,
        server_port,
        context_path
    );
    let server = startup::main_server(app_state, context_path.clone(), server_address, server_port)?;
    let server_handle = server.handle();
    server_status.set_up();

    if configuration.register_with_registry() {
        let node = SelfRegistration {
            service_name: configuration.node_service_name(),
            instance_id: registry.node_id().to_string(),
            host: local_ip(),
            port: server_port,
            context_path,
            heartbeat_interval: configuration.heartbeat_interval(),
        };
        background.push(node.spawn(registry.clone(), &graceful_shutdown.signal()));
    }

    let mut listener = graceful_shutdown.signal().subscribe();
    let mut server_task = actix_web::rt::spawn(server);

    tokio::select! {
        result = &mut server_task => {
            match result {
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task failed: {}", e),
                Ok(Ok(())) => info!("Server stopped"),
            }
        }
        _ = listener.cancelled() => {
            info!("Stopping HTTP server...");
            server_handle.stop(true).await;
            if let Err(e) = server_task.await {
                error!("Server task failed: {}", e);
            }
        }
    }

    server_status.set_down();
    graceful_shutdown.drain(background).await;

    info!("Roster server shutdown complete");
    Ok(())
}
