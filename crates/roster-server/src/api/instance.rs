//! Instance API handlers
//!
//! - POST /v1/apps/{service} - Register instance
//! - PUT /v1/apps/{service}/{id} - Renew lease
//! - DELETE /v1/apps/{service}/{id} - Deregister instance
//! - PUT /v1/apps/{service}/{id}/status?value= - Override status
//! - GET /v1/apps/{service}/{id} - Instance detail
//! - GET /v1/apps/{service} - UP instances of a service
//! - GET /v1/apps - Full registry snapshot

use actix_web::{Responder, delete, get, post, put, web};
use roster_registry::{InstanceRecord, InstanceStatus, RegistrySnapshot, ServiceGroup};
use tracing::{debug, info};

use super::ApiResult;
use super::model::{InstancePath, RegisterBody, StatusQuery};
use crate::error::{INSTANCE_STATUS_ERROR, PARAMETER_MISSING};
use crate::model::{app_state::AppState, response::Result};

/// Register instance
///
/// POST /v1/apps/{service}
#[post("/{service}")]
pub async fn register_instance(
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<RegisterBody>,
) -> ApiResult {
    let service_name = path.into_inner();
    let body = body.into_inner();

    let Some(port) = body.port else {
        return Ok(Result::<bool>::http_error(400, PARAMETER_MISSING, "port", false));
    };

    let record = data
        .registry
        .register(body.into_registration(&service_name, port))?;

    info!(
        service_name = %record.service_name,
        instance_id = %record.instance_id,
        address = %record.address(),
        status = %record.status,
        "Instance registered"
    );
    Ok(Result::<InstanceRecord>::http_success(record))
}

/// Renew lease
///
/// PUT /v1/apps/{service}/{id}
#[put("/{service}/{id}")]
pub async fn renew_instance(data: web::Data<AppState>, path: web::Path<InstancePath>) -> ApiResult {
    data.registry.renew(&path.service, &path.id)?;

    debug!(service_name = %path.service, instance_id = %path.id, "Lease renewed");
    Ok(Result::<bool>::http_success(true))
}

/// Deregister instance; absent instances answer `false`
///
/// DELETE /v1/apps/{service}/{id}
#[delete("/{service}/{id}")]
pub async fn deregister_instance(
    data: web::Data<AppState>,
    path: web::Path<InstancePath>,
) -> impl Responder {
    let removed = data.registry.deregister(&path.service, &path.id);

    info!(
        service_name = %path.service,
        instance_id = %path.id,
        removed,
        "Instance deregistered"
    );
    Result::<bool>::http_success(removed)
}

/// Override instance status
///
/// PUT /v1/apps/{service}/{id}/status?value=OUT_OF_SERVICE
#[put("/{service}/{id}/status")]
pub async fn update_status(
    data: web::Data<AppState>,
    path: web::Path<InstancePath>,
    query: web::Query<StatusQuery>,
) -> ApiResult {
    let value = query.value_or_default();
    if value.is_empty() {
        return Ok(Result::<bool>::http_error(400, PARAMETER_MISSING, "value", false));
    }
    let status = match value.parse::<InstanceStatus>() {
        Ok(status) => status,
        Err(e) => {
            return Ok(Result::<bool>::http_error(
                400,
                INSTANCE_STATUS_ERROR,
                &e.to_string(),
                false,
            ));
        }
    };

    let record = data
        .registry
        .update_status(&path.service, &path.id, status)?;

    info!(
        service_name = %path.service,
        instance_id = %path.id,
        status = %record.status,
        "Instance status updated"
    );
    Ok(Result::<InstanceRecord>::http_success(record))
}

/// Instance detail, any status
///
/// GET /v1/apps/{service}/{id}
#[get("/{service}/{id}")]
pub async fn get_instance(data: web::Data<AppState>, path: web::Path<InstancePath>) -> ApiResult {
    let record = data.registry.get_instance(&path.service, &path.id)?;
    Ok(Result::<InstanceRecord>::http_success(record))
}

/// UP instances of one service; unknown services answer an empty list
///
/// GET /v1/apps/{service}
#[get("/{service}")]
pub async fn list_instances(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let group = data.registry.lookup(&path);
    Result::<ServiceGroup>::http_success(group)
}

/// Every instance of every service
///
/// GET /v1/apps
#[get("")]
pub async fn list_all(data: web::Data<AppState>) -> impl Responder {
    Result::<RegistrySnapshot>::http_success(data.registry.snapshot())
}
