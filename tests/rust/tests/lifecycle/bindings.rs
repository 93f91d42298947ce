use pretty_assertions::assert_eq;
use rsbroker_core::BrokerConfig;
use serde_json::json;
use tests::fixtures::{bind_body, provision_body, service_key_body};
use tests::{send_json, TestBroker};

const BINDING: &str = "/v2/service_instances/abc/service_bindings/b1";

async fn provisioned(config: BrokerConfig) -> TestBroker {
    let broker = TestBroker::start(config).await;
    let (status, _) = send_json(broker.put("/v2/service_instances/abc").json(&provision_body())).await;
    assert_eq!(status, 201);
    broker
}

#[tokio::test]
async fn test_bind_create_repeat_conflict() {
    let broker = provisioned(BrokerConfig::default()).await;

    let (status, created) = send_json(broker.put(BINDING).json(&bind_body("app-1"))).await;
    assert_eq!(status, 201);
    let credentials = created["credentials"].as_object().unwrap();
    assert!(credentials.contains_key("userid"));
    assert!(credentials.contains_key("password"));

    // Identical repeat returns the same credentials
    let (status, repeat) = send_json(broker.put(BINDING).json(&bind_body("app-1"))).await;
    assert_eq!(status, 200);
    assert_eq!(repeat, created);

    let (status, body) = send_json(broker.put(BINDING).json(&bind_body("app-2"))).await;
    assert_eq!(status, 409);
    assert!(body["description"].is_string());
}

#[tokio::test]
async fn test_service_keys() {
    let broker = provisioned(BrokerConfig::default()).await;

    let (status, body) = send_json(
        broker
            .put("/v2/service_instances/abc/service_bindings/key-1")
            .json(&service_key_body()),
    )
    .await;
    assert_eq!(status, 201);
    assert!(body["credentials"].is_object());
}

#[tokio::test]
async fn test_service_keys_unsupported() {
    let broker = provisioned(BrokerConfig {
        service_keys_supported: false,
        ..Default::default()
    })
    .await;

    let (status, body) = send_json(broker.put(BINDING).json(&service_key_body())).await;
    assert_eq!(status, 422);
    assert_eq!(body["error"], "RequiresApp");

    let (status, _) = send_json(broker.put(BINDING).json(&bind_body("app-1"))).await;
    assert_eq!(status, 201);
}

#[tokio::test]
async fn test_bind_to_absent_instance() {
    let broker = TestBroker::start(BrokerConfig::default()).await;

    let (status, body) = send_json(broker.put(BINDING).json(&bind_body("app-1"))).await;
    assert_eq!(status, 400);
    assert!(body["description"].as_str().unwrap().contains("abc"));
}

#[tokio::test]
async fn test_bind_payload_validation() {
    let broker = provisioned(BrokerConfig::default()).await;

    let (status, body) = send_json(broker.put(BINDING).json(&json!({"plan_id": "p1"}))).await;
    assert_eq!(status, 400);
    assert_eq!(body, json!({"description": "service_id not found in JSON payload"}));
}

#[tokio::test]
async fn test_unbind() {
    let broker = provisioned(BrokerConfig::default()).await;
    send_json(broker.put(BINDING).json(&bind_body("app-1"))).await;

    let (status, body) = send_json(broker.delete(BINDING)).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({}));

    let (status, body) = send_json(broker.delete(BINDING)).await;
    assert_eq!(status, 410);
    assert_eq!(body, json!({}));

    // Never bound
    let (status, body) = send_json(
        broker.delete("/v2/service_instances/abc/service_bindings/unknown?plan_id=p&service_id=s"),
    )
    .await;
    assert_eq!(status, 410);
    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn test_deprovision_removes_bindings() {
    let broker = provisioned(BrokerConfig::default()).await;
    send_json(broker.put(BINDING).json(&bind_body("app-1"))).await;

    let (status, _) = send_json(broker.delete("/v2/service_instances/abc")).await;
    assert_eq!(status, 200);

    let (status, _) = send_json(broker.delete(BINDING)).await;
    assert_eq!(status, 410);

    // A fresh instance under the same id starts without bindings
    send_json(broker.put("/v2/service_instances/abc").json(&provision_body())).await;
    let (status, _) = send_json(broker.put(BINDING).json(&bind_body("app-2"))).await;
    assert_eq!(status, 201);
}
