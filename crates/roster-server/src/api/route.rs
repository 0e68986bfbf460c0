//! Registry API routing configuration

use actix_web::{Scope, web};

use super::{health, instance, ops, peer};

/// Create the registry routes
///
/// Routes:
/// - POST /v1/apps/{service} - Register instance
/// - PUT /v1/apps/{service}/{id} - Renew lease
/// - DELETE /v1/apps/{service}/{id} - Deregister instance
/// - PUT /v1/apps/{service}/{id}/status - Override status
/// - GET /v1/apps/{service}/{id} - Instance detail
/// - GET /v1/apps/{service} - UP instances of a service
/// - GET /v1/apps - Full registry snapshot
/// - POST /v1/peers/replicate - Apply an event from a peer
/// - GET /v1/ops/status - Registry overview
/// - GET /v1/ops/metrics - Prometheus exposition
/// - GET /v1/health/liveness - Liveness probe
/// - GET /v1/health/readiness - Readiness probe
pub fn routes() -> Scope {
    web::scope("/v1")
        .service(
            web::scope("/apps")
                .service(instance::list_all)
                .service(instance::register_instance)
                .service(instance::list_instances)
                .service(instance::update_status)
                .service(instance::renew_instance)
                .service(instance::deregister_instance)
                .service(instance::get_instance),
        )
        .service(web::scope("/peers").service(peer::replicate))
        .service(
            web::scope("/ops")
                .service(ops::status)
                .service(ops::metrics),
        )
        .service(
            web::scope("/health")
                .service(health::liveness)
                .service(health::readiness),
        )
}
