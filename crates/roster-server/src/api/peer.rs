//! Peer replication endpoint
//!
//! A 404 answer tells the sender we never saw the instance, which makes it
//! re-send the full registration.

use actix_web::{post, web};
use roster_registry::ReplicationMessage;
use tracing::{debug, warn};

use super::ApiResult;
use crate::model::{app_state::AppState, response::Result};

/// POST /v1/peers/replicate
#[post("/replicate")]
pub async fn replicate(
    data: web::Data<AppState>,
    message: web::Json<ReplicationMessage>,
) -> ApiResult {
    let message = message.into_inner();
    let source = message.source.clone();
    let kind = message.event.kind();
    let (service_name, instance_id) = {
        let (service, id) = message.event.key();
        (service.to_string(), id.to_string())
    };

    if let Err(e) = data.registry.apply_replicated(message) {
        warn!(
            source = %source,
            kind,
            service_name = %service_name,
            instance_id = %instance_id,
            "Rejected replicated event: {}",
            e
        );
        return Err(e.into());
    }

    debug!(source = %source, kind, service_name = %service_name, instance_id = %instance_id, "Replicated event applied");
    Ok(Result::<bool>::http_success(true))
}
