// HTTP API tests for the registry endpoints
//
// Each test builds the real route tree over an in-memory registry driven by a
// manual clock, with no peers configured.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, http::StatusCode, test, web};
use roster_registry::{
    Clock, HttpPeerClient, InstanceRegistration, ManualClock, Registry, RegistryConfig,
    ReplicationEvent, ReplicationMessage,
};
use roster_server::{
    api::{self, route},
    error::{
        INSTANCE_NOT_FOUND, INSTANCE_STATUS_ERROR, PARAMETER_MISSING, PARAMETER_VALIDATE_ERROR,
        RESOURCE_NOT_FOUND,
    },
    model::{app_state::AppState, server_status::ServerStatusManager},
};
use serde_json::{Value, json};

const NODE_ID: &str = "node-a";

fn create_app_state() -> (Arc<AppState>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let peer_client = HttpPeerClient::new("/roster", Duration::from_secs(1)).unwrap();
    let registry = Registry::with_clock(
        RegistryConfig {
            node_id: NODE_ID.to_string(),
            ..Default::default()
        },
        clock.clone(),
        Arc::new(peer_client),
    );
    let state = AppState::new(Arc::new(registry), ServerStatusManager::new(), None);
    (Arc::new(state), clock)
}

macro_rules! create_test_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::from($state.clone()))
                .app_data(api::json_config())
                .service(web::scope("/roster").service(route::routes()))
                .default_service(web::to(api::not_found)),
        )
        .await
    };
}

fn register_body(id: &str, port: u16) -> Value {
    json!({
        "instanceId": id,
        "host": "10.0.0.5",
        "port": port,
        "metadata": { "zone": "eu-1" }
    })
}

#[actix_web::test]
async fn test_register_query_deregister() {
    let (state, _clock) = create_app_state();
    let app = create_test_app!(state);

    let req = test::TestRequest::post()
        .uri("/roster/v1/apps/currency-exchange")
        .set_json(register_body("ce-1", 8000))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["instanceId"], "ce-1");
    assert_eq!(body["data"]["status"], "UP");
    assert_eq!(body["data"]["scheme"], "http");

    let req = test::TestRequest::get()
        .uri("/roster/v1/apps/currency-exchange")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["name"], "currency-exchange");
    assert_eq!(body["data"]["instances"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["instances"][0]["metadata"]["zone"], "eu-1");

    let req = test::TestRequest::get()
        .uri("/roster/v1/apps/currency-exchange/ce-1")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["port"], 8000);

    let req = test::TestRequest::delete()
        .uri("/roster/v1/apps/currency-exchange/ce-1")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"], true);

    // Deregister is idempotent
    let req = test::TestRequest::delete()
        .uri("/roster/v1/apps/currency-exchange/ce-1")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"], false);

    let req = test::TestRequest::get().uri("/roster/v1/apps").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["nodeId"], NODE_ID);
    assert!(body["data"]["services"].as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn test_default_instance_id() {
    let (state, _clock) = create_app_state();
    let app = create_test_app!(state);

    let req = test::TestRequest::post()
        .uri("/roster/v1/apps/currency-exchange")
        .set_json(json!({ "host": "10.0.0.5", "port": 8000 }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["instanceId"], "10.0.0.5:currency-exchange:8000");
}

#[actix_web::test]
async fn test_register_malformed_input() {
    let (state, _clock) = create_app_state();
    let app = create_test_app!(state);

    let req = test::TestRequest::post()
        .uri("/roster/v1/apps/currency-exchange")
        .set_json(json!({ "instanceId": "ce-1", "host": "10.0.0.5" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], PARAMETER_MISSING.code);

    let req = test::TestRequest::post()
        .uri("/roster/v1/apps/currency-exchange")
        .set_json(json!({ "instanceId": "ce-1", "host": "10.0.0.5", "port": 70000 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["message"].as_str().unwrap().contains("port"));

    let req = test::TestRequest::post()
        .uri("/roster/v1/apps/currency-exchange")
        .set_json(json!({ "instanceId": "ce-1", "host": "", "port": 8000 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/roster/v1/apps/bad%20name")
        .set_json(register_body("ce-1", 8000))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/roster/v1/apps/currency-exchange")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], PARAMETER_VALIDATE_ERROR.code);

    let req = test::TestRequest::post()
        .uri("/roster/v1/apps/currency-exchange")
        .set_json(json!({
            "instanceId": "ce-1",
            "host": "10.0.0.5",
            "port": 8000,
            "leaseDurationSecs": 10_000_000_000_000_000u64
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["message"].as_str().unwrap().contains("leaseDurationSecs"));

    // Nothing was stored
    assert_eq!(state.registry.overview().instances, 0);
}

#[actix_web::test]
async fn test_renew() {
    let (state, clock) = create_app_state();
    let app = create_test_app!(state);

    let req = test::TestRequest::put()
        .uri("/roster/v1/apps/currency-exchange/missing")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], INSTANCE_NOT_FOUND.code);

    let req = test::TestRequest::post()
        .uri("/roster/v1/apps/currency-exchange")
        .set_json(register_body("ce-1", 8000))
        .to_request();
    test::call_service(&app, req).await;

    clock.advance(Duration::from_secs(30));
    let req = test::TestRequest::put()
        .uri("/roster/v1/apps/currency-exchange/ce-1")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let record = state
        .registry
        .get_instance("currency-exchange", "ce-1")
        .unwrap();
    assert!(record.last_renewal_timestamp > record.registration_timestamp);
}

#[actix_web::test]
async fn test_expired_instance_disappears_after_sweep() {
    let (state, clock) = create_app_state();
    let app = create_test_app!(state);

    for (id, port) in [("ce-1", 8000), ("ce-2", 8001)] {
        let req = test::TestRequest::post()
            .uri("/roster/v1/apps/currency-exchange")
            .set_json(register_body(id, port))
            .to_request();
        test::call_service(&app, req).await;
    }

    clock.advance(Duration::from_secs(60));
    let req = test::TestRequest::put()
        .uri("/roster/v1/apps/currency-exchange/ce-1")
        .to_request();
    test::call_service(&app, req).await;

    clock.advance(Duration::from_secs(31));
    let report = state.registry.sweep();
    assert_eq!(report.evicted.len(), 1);

    let req = test::TestRequest::get()
        .uri("/roster/v1/apps/currency-exchange")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let instances = body["data"]["instances"].as_array().unwrap();
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0]["instanceId"], "ce-1");
}

#[actix_web::test]
async fn test_status_override() {
    let (state, _clock) = create_app_state();
    let app = create_test_app!(state);

    let req = test::TestRequest::post()
        .uri("/roster/v1/apps/currency-exchange")
        .set_json(register_body("ce-1", 8000))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::put()
        .uri("/roster/v1/apps/currency-exchange/ce-1/status?value=out_of_service")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["status"], "OUT_OF_SERVICE");

    // Out of rotation: hidden from lookup, still visible in detail
    let req = test::TestRequest::get()
        .uri("/roster/v1/apps/currency-exchange")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body["data"]["instances"].as_array().unwrap().is_empty());

    let req = test::TestRequest::put()
        .uri("/roster/v1/apps/currency-exchange/ce-1/status?value=DOWN")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::put()
        .uri("/roster/v1/apps/currency-exchange/ce-1/status?value=UP")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::put()
        .uri("/roster/v1/apps/currency-exchange/ce-1/status?value=SLEEPING")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], INSTANCE_STATUS_ERROR.code);

    let req = test::TestRequest::put()
        .uri("/roster/v1/apps/currency-exchange/ce-1/status")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::put()
        .uri("/roster/v1/apps/currency-exchange/missing/status?value=DOWN")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_unknown_service_and_instance() {
    let (state, _clock) = create_app_state();
    let app = create_test_app!(state);

    let req = test::TestRequest::get()
        .uri("/roster/v1/apps/never-registered")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["data"]["instances"].as_array().unwrap().is_empty());

    let req = test::TestRequest::get()
        .uri("/roster/v1/apps/never-registered/x")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get().uri("/roster/v9/nothing").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], RESOURCE_NOT_FOUND.code);
}

#[actix_web::test]
async fn test_replicate_endpoint() {
    let (state, clock) = create_app_state();
    let app = create_test_app!(state);

    let record = InstanceRegistration::new("currency-exchange", "ce-9", "10.0.0.9", 8000)
        .into_record(clock.now_millis(), Duration::from_secs(90));
    let message = ReplicationMessage {
        source: "node-b".to_string(),
        event: ReplicationEvent::Register { record },
    };
    let req = test::TestRequest::post()
        .uri("/roster/v1/peers/replicate")
        .set_json(&message)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/roster/v1/apps/currency-exchange/ce-9")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["origin"]["type"], "replicated");
    assert_eq!(body["data"]["origin"]["node"], "node-b");

    // Renewal for an instance this node never saw asks the peer to re-send it
    let message = ReplicationMessage {
        source: "node-b".to_string(),
        event: ReplicationEvent::Renew {
            service_name: "currency-exchange".to_string(),
            instance_id: "unknown".to_string(),
        },
    };
    let req = test::TestRequest::post()
        .uri("/roster/v1/peers/replicate")
        .set_json(&message)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let message = ReplicationMessage {
        source: NODE_ID.to_string(),
        event: ReplicationEvent::Deregister {
            service_name: "currency-exchange".to_string(),
            instance_id: "ce-9".to_string(),
        },
    };
    let req = test::TestRequest::post()
        .uri("/roster/v1/peers/replicate")
        .set_json(&message)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert!(state.registry.get_instance("currency-exchange", "ce-9").is_ok());

    let req = test::TestRequest::post()
        .uri("/roster/v1/peers/replicate")
        .set_json(json!({ "source": "node-b", "event": { "type": "explode" } }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_ops_status() {
    let (state, _clock) = create_app_state();
    let app = create_test_app!(state);

    let req = test::TestRequest::post()
        .uri("/roster/v1/apps/currency-exchange")
        .set_json(register_body("ce-1", 8000))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::get().uri("/roster/v1/ops/status").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["nodeId"], NODE_ID);
    assert_eq!(body["data"]["services"], 1);
    assert_eq!(body["data"]["instances"], 1);
    assert_eq!(body["data"]["localInstances"], 1);
    assert_eq!(body["data"]["replicatedInstances"], 0);
    assert_eq!(body["data"]["preservation"]["mode"], "NORMAL");

    // No recorder installed in tests
    let req = test::TestRequest::get().uri("/roster/v1/ops/metrics").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[actix_web::test]
async fn test_health_probes() {
    let (state, _clock) = create_app_state();
    let app = create_test_app!(state);

    let req = test::TestRequest::get()
        .uri("/roster/v1/health/liveness")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"], "ok");

    let req = test::TestRequest::get()
        .uri("/roster/v1/health/readiness")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    state.server_status.set_up();
    let req = test::TestRequest::get()
        .uri("/roster/v1/health/readiness")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
