use std::sync::Arc;

use pretty_assertions::assert_eq;
use rsbroker_core::{BrokerConfig, DEFAULT_PLAN_ID};
use serde_json::json;
use tests::fixtures::{provision_body, update_body};
use tests::{send_json, FailingBackend, GatedBackend, TestBroker};

use super::{wait_for_backend, wait_for_operation};

fn async_config() -> BrokerConfig {
    BrokerConfig {
        async_supported: true,
        ..Default::default()
    }
}

const ASYNC_PATH: &str = "/v2/service_instances/abc?accepts_incomplete=true";

#[tokio::test]
async fn test_async_provision_lifecycle() {
    let backend = GatedBackend::new();
    let broker = TestBroker::start_with_backend(async_config(), Arc::new(backend.clone())).await;

    let (status, body) = send_json(broker.put(ASYNC_PATH).json(&provision_body())).await;
    assert_eq!(status, 202);
    assert_eq!(body["dashboard_url"], format!("{}/dashboard/abc", broker.base_url));
    assert_eq!(
        body["description"],
        "This service instance is being created asynchronously for you."
    );
    let token = body["operation"].as_str().unwrap().to_string();
    assert!(token.starts_with("provision-"));

    wait_for_backend(&backend, 1).await;

    // Repeat while in flight reports the same operation
    let (status, body) = send_json(broker.put(ASYNC_PATH).json(&provision_body())).await;
    assert_eq!(status, 202);
    assert_eq!(body["operation"], token.as_str());

    let (status, body) = send_json(broker.get(&format!(
        "/v2/service_instances/abc/last_operation?operation={}",
        token
    )))
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["state"], "in progress");

    // Nothing else may start on the instance meanwhile
    let (status, body) = send_json(
        broker
            .patch(ASYNC_PATH)
            .json(&update_body(DEFAULT_PLAN_ID, DEFAULT_PLAN_ID)),
    )
    .await;
    assert_eq!(status, 422);
    assert_eq!(body["error"], "ConcurrencyError");

    let (status, body) = send_json(broker.delete(ASYNC_PATH)).await;
    assert_eq!(status, 422);
    assert_eq!(body["error"], "ConcurrencyError");

    backend.release();
    let outcome = wait_for_operation(&broker, "abc", &token).await;
    assert_eq!(
        outcome,
        json!({"state": "succeeded", "description": "This asynchronous operation is complete"})
    );

    let (status, body) = send_json(broker.put(ASYNC_PATH).json(&provision_body())).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"dashboard_url": format!("{}/dashboard/abc", broker.base_url)}));
}

#[tokio::test]
async fn test_async_update_and_deprovision() {
    let backend = GatedBackend::new();
    let broker = TestBroker::start_with_backend(async_config(), Arc::new(backend.clone())).await;

    // Provisioned synchronously, still through the gate
    backend.release();
    let (status, _) = send_json(broker.put("/v2/service_instances/abc").json(&provision_body())).await;
    assert_eq!(status, 201);

    let (status, body) = send_json(
        broker
            .patch(ASYNC_PATH)
            .json(&update_body("p2", DEFAULT_PLAN_ID)),
    )
    .await;
    assert_eq!(status, 202);
    assert_eq!(
        body["description"],
        "This service instance is being updated asynchronously for you."
    );
    let token = body["operation"].as_str().unwrap().to_string();

    backend.release();
    assert_eq!(wait_for_operation(&broker, "abc", &token).await["state"], "succeeded");

    let (status, body) = send_json(broker.delete(ASYNC_PATH)).await;
    assert_eq!(status, 202);
    let token = body["operation"].as_str().unwrap().to_string();
    assert!(token.starts_with("deprovision-"));

    backend.release();
    assert_eq!(wait_for_operation(&broker, "abc", &token).await["state"], "succeeded");

    let (status, body) = send_json(broker.delete(ASYNC_PATH)).await;
    assert_eq!(status, 410);
    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn test_sync_request_to_async_broker() {
    let broker = TestBroker::start(async_config()).await;

    // Without accepts_incomplete the broker answers synchronously
    let (status, _) = send_json(broker.put("/v2/service_instances/abc").json(&provision_body())).await;
    assert_eq!(status, 201);

    let (status, _) = send_json(broker.get("/v2/service_instances/abc/last_operation")).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_async_required() {
    let broker = TestBroker::start(BrokerConfig {
        async_supported: true,
        async_required: true,
        ..Default::default()
    })
    .await;

    let expected = json!({
        "error": "AsyncRequired",
        "description": "This service plan requires client support for asynchronous service operations."
    });

    for path in [
        "/v2/service_instances/abc",
        "/v2/service_instances/abc?accepts_incomplete=false",
    ] {
        let (status, body) = send_json(broker.put(path).json(&provision_body())).await;
        assert_eq!(status, 422);
        assert_eq!(body, expected);
    }

    let (status, body) = send_json(broker.delete("/v2/service_instances/abc")).await;
    assert_eq!(status, 422);
    assert_eq!(body, expected);

    let (status, _) = send_json(broker.put(ASYNC_PATH).json(&provision_body())).await;
    assert_eq!(status, 202);
}

#[tokio::test]
async fn test_failed_async_provision() {
    let broker =
        TestBroker::start_with_backend(async_config(), Arc::new(FailingBackend)).await;

    let (status, body) = send_json(broker.put(ASYNC_PATH).json(&provision_body())).await;
    assert_eq!(status, 202);
    let token = body["operation"].as_str().unwrap().to_string();

    let outcome = wait_for_operation(&broker, "abc", &token).await;
    assert_eq!(outcome["state"], "failed");
    assert!(outcome["description"]
        .as_str()
        .unwrap()
        .contains("backing service unavailable"));

    // The failed id may be provisioned again, here with a different plan
    let mut other = provision_body();
    other["plan_id"] = json!("another-plan");
    let (status, _) = send_json(broker.put(ASYNC_PATH).json(&other)).await;
    assert_eq!(status, 202);
}

#[tokio::test]
async fn test_last_operation_token_must_match() {
    let backend = GatedBackend::new();
    let broker = TestBroker::start_with_backend(async_config(), Arc::new(backend.clone())).await;

    let (_, body) = send_json(broker.put(ASYNC_PATH).json(&provision_body())).await;
    let token = body["operation"].as_str().unwrap().to_string();

    let (status, body) = send_json(
        broker.get("/v2/service_instances/abc/last_operation?operation=provision-unknown"),
    )
    .await;
    assert_eq!(status, 400);
    assert!(body["description"].is_string());

    // Without a token the instance's last operation is reported
    let (status, body) = send_json(broker.get("/v2/service_instances/abc/last_operation")).await;
    assert_eq!(status, 200);
    assert_eq!(body["state"], "in progress");

    backend.release();
    wait_for_operation(&broker, "abc", &token).await;
}

#[tokio::test]
async fn test_reprovision_after_async_deprovision_has_no_operation() {
    let broker = TestBroker::start(async_config()).await;
    let last_operation = "/v2/service_instances/abc/last_operation";

    let (status, _) = send_json(broker.put("/v2/service_instances/abc").json(&provision_body())).await;
    assert_eq!(status, 201);

    let (status, body) = send_json(broker.delete(ASYNC_PATH)).await;
    assert_eq!(status, 202);
    let token = body["operation"].as_str().unwrap().to_string();
    assert_eq!(wait_for_operation(&broker, "abc", &token).await["state"], "succeeded");

    // The deletion is reported once
    let (status, _) = send_json(broker.get(last_operation)).await;
    assert_eq!(status, 400);

    let (status, _) = send_json(broker.put("/v2/service_instances/abc").json(&provision_body())).await;
    assert_eq!(status, 201);
    let (status, _) = send_json(broker.get(last_operation)).await;
    assert_eq!(status, 400);
}
