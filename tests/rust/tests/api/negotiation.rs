use pretty_assertions::assert_eq;
use rsbroker_core::BrokerConfig;
use serde_json::json;
use tests::fixtures::provision_body;
use tests::{send_json, TestBroker};

#[tokio::test]
async fn test_body_must_be_json() {
    let broker = TestBroker::start(BrokerConfig::default()).await;

    let (status, body) = send_json(
        broker
            .put("/v2/service_instances/abc")
            .header("content-type", "text/plain")
            .body(provision_body().to_string()),
    )
    .await;

    assert_eq!(status, 415);
    assert_eq!(body, json!({"description": "Content-Type must be application/json"}));
}

#[tokio::test]
async fn test_response_must_be_acceptable() {
    let broker = TestBroker::start(BrokerConfig::default()).await;

    let (status, body) = send_json(broker.get("/v2/catalog").header("accept", "text/html")).await;
    assert_eq!(status, 406);
    assert_eq!(body, json!({"description": "Accept type must be application/json"}));

    for accept in ["application/json", "*/*", "application/*", "text/html, application/json"] {
        let (status, _) = send_json(broker.get("/v2/catalog").header("accept", accept)).await;
        assert_eq!(status, 200, "Accept: {}", accept);
    }
}

#[tokio::test]
async fn test_content_type_checked_before_accept() {
    let broker = TestBroker::start(BrokerConfig::default()).await;

    let (status, _) = send_json(
        broker
            .put("/v2/service_instances/abc")
            .header("content-type", "text/plain")
            .header("accept", "text/html")
            .body("{}"),
    )
    .await;
    assert_eq!(status, 415);
}
