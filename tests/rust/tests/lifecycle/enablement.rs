use pretty_assertions::assert_eq;
use rsbroker_core::BrokerConfig;
use serde_json::json;
use tests::fixtures::provision_body;
use tests::{send_json, TestBroker};

const ENABLEMENT: &str = "/bluemix_v1/service_instances/abc";

fn enable_body(enabled: bool) -> serde_json::Value {
    json!({
        "enabled": enabled,
        "initiator_id": "IBMid-123",
        "reason_code": "billing"
    })
}

#[tokio::test]
async fn test_enablement_round_trip() {
    let broker = TestBroker::start(BrokerConfig::default()).await;
    send_json(broker.put("/v2/service_instances/abc").json(&provision_body())).await;

    let (status, body) = send_json(broker.get(ENABLEMENT)).await;
    assert_eq!(status, 200);
    assert_eq!(body["enabled"], true);
    assert_eq!(body["active"], true);
    assert!(body["last_active"].as_i64().unwrap() > 0);

    let (status, body) = send_json(broker.put(ENABLEMENT).json(&enable_body(false))).await;
    assert_eq!(status, 204);
    assert_eq!(body, serde_json::Value::Null);

    let (status, body) = send_json(broker.get(ENABLEMENT)).await;
    assert_eq!(status, 200);
    assert_eq!(body["enabled"], false);
    assert_eq!(body["active"], false);

    send_json(broker.put(ENABLEMENT).json(&enable_body(true))).await;
    let (_, body) = send_json(broker.get(ENABLEMENT)).await;
    assert_eq!(body["enabled"], true);
}

#[tokio::test]
async fn test_enablement_of_absent_instance() {
    let broker = TestBroker::start(BrokerConfig::default()).await;

    let (status, _) = send_json(broker.get(ENABLEMENT)).await;
    assert_eq!(status, 400);

    let (status, _) = send_json(broker.put(ENABLEMENT).json(&enable_body(false))).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_enablement_validation() {
    let broker = TestBroker::start(BrokerConfig::default()).await;
    send_json(broker.put("/v2/service_instances/abc").json(&provision_body())).await;

    let (status, body) = send_json(
        broker
            .put(ENABLEMENT)
            .json(&json!({"initiator_id": "x", "reason_code": "y"})),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body, json!({"description": "enabled not found in JSON payload"}));

    // The Accept header is not checked on this call
    let (status, _) = send_json(
        broker
            .put(ENABLEMENT)
            .header("accept", "text/plain")
            .json(&enable_body(true)),
    )
    .await;
    assert_eq!(status, 204);
}
