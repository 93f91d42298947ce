//! Dashboard sign-on through the broker's HTTP surface

use pretty_assertions::assert_eq;
use reqwest::Method;
use serde_json::json;
use tests::fixtures::identity_token;
use tests::iam::{decision_response, token_response, AUTHORIZE_PATH, CONFIGURATION_PATH};
use tests::{MockIam, TestBroker};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

async fn broker_for(iam: &MockIam) -> TestBroker {
    TestBroker::start(iam.broker_config()).await
}

/// GET a browser route, returning status and body text
async fn browse(broker: &TestBroker, path: &str) -> (u16, String) {
    let response = broker
        .anonymous(Method::GET, path)
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    (status, response.text().await.unwrap())
}

#[tokio::test]
async fn test_dashboard_redirects_to_provider() {
    let iam = MockIam::start().await;
    iam.discovery().await;
    let broker = broker_for(&iam).await;

    let response = broker
        .anonymous(Method::GET, "/dashboard/abc")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 302);

    let location = response
        .headers()
        .get("location")
        .unwrap()
        .to_str()
        .unwrap();
    let url = Url::parse(location).unwrap();
    assert_eq!(
        format!("{}{}", url.origin().ascii_serialization(), url.path()),
        format!("{}{}", iam.uri(), AUTHORIZE_PATH)
    );

    let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert_eq!(
        query,
        vec![
            ("client_id".to_string(), "broker-client".to_string()),
            (
                "redirect_uri".to_string(),
                format!("{}/sso_dashboard", broker.base_url)
            ),
            ("response_type".to_string(), "code".to_string()),
            ("state".to_string(), "abc".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_dashboard_without_discovery() {
    let iam = MockIam::start().await;
    Mock::given(method("GET"))
        .and(path(CONFIGURATION_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&iam.server)
        .await;
    let broker = broker_for(&iam).await;

    let (status, body) = browse(&broker, "/dashboard/abc").await;
    assert_eq!(status, 500);
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(&body).unwrap(),
        json!({"description": "Unable to start sign-on"})
    );
}

#[tokio::test]
async fn test_authorized_user() {
    let iam = MockIam::start().await;
    iam.happy_path(&identity_token("IBMid-42", "ibm openid"), true)
        .await;
    let broker = broker_for(&iam).await;

    let (status, body) = browse(&broker, "/sso_dashboard?code=the-code&state=abc").await;
    assert_eq!(status, 200);
    assert_eq!(body, "You can manage this service instance");
}

#[tokio::test]
async fn test_denied_by_policy() {
    let iam = MockIam::start().await;
    iam.happy_path(&identity_token("IBMid-42", "ibm openid"), false)
        .await;
    let broker = broker_for(&iam).await;

    let (status, body) = browse(&broker, "/sso_dashboard?code=the-code&state=abc").await;
    assert_eq!(status, 401);
    assert_eq!(body, "You are not authorized to manage this service instance");
}

#[tokio::test]
async fn test_rejected_code_does_not_leak_upstream_text() {
    let iam = MockIam::start().await;
    iam.discovery().await;
    iam.code_exchange(ResponseTemplate::new(400).set_body_json(json!({
        "errorMessage": "Provided authorization code is invalid"
    })))
    .await;
    let broker = broker_for(&iam).await;

    let (status, body) = browse(&broker, "/sso_dashboard?code=stale&state=abc").await;
    assert_eq!(status, 401);
    assert!(!body.contains("Provided authorization code"));
}

#[tokio::test]
async fn test_rejected_api_key() {
    let iam = MockIam::start().await;
    iam.discovery().await;
    iam.code_exchange(token_response(&identity_token("IBMid-42", "ibm openid")))
        .await;
    iam.api_key_exchange(ResponseTemplate::new(400)).await;
    iam.decision(decision_response(true)).await;
    let broker = broker_for(&iam).await;

    let (status, _) = browse(&broker, "/sso_dashboard?code=the-code&state=abc").await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn test_upstream_failure_is_refusal() {
    let iam = MockIam::start().await;
    iam.discovery().await;
    iam.code_exchange(ResponseTemplate::new(503)).await;
    let broker = broker_for(&iam).await;

    let (status, body) = browse(&broker, "/sso_dashboard?code=the-code&state=abc").await;
    assert_eq!(status, 401);
    assert_eq!(body, "You are not authorized to manage this service instance");
}

#[tokio::test]
async fn test_malformed_identity_token() {
    let iam = MockIam::start().await;
    iam.happy_path("not-a-jwt", true).await;
    let broker = broker_for(&iam).await;

    let (status, body) = browse(&broker, "/sso_dashboard?code=the-code&state=abc").await;
    assert_eq!(status, 500);
    assert_eq!(body, "Unable to complete sign-on");
}

#[tokio::test]
async fn test_callback_without_code_or_state() {
    let iam = MockIam::start().await;
    iam.happy_path(&identity_token("IBMid-42", "ibm openid"), true)
        .await;
    let broker = broker_for(&iam).await;

    for route in [
        "/sso_dashboard",
        "/sso_dashboard?state=abc",
        "/sso_dashboard?code=the-code",
        "/sso_dashboard?code=&state=abc",
    ] {
        let (status, _) = browse(&broker, route).await;
        assert_eq!(status, 401, "{}", route);
    }
}

#[tokio::test]
async fn test_dashboard_routes_need_no_broker_credentials() {
    let iam = MockIam::start().await;
    iam.discovery().await;
    let broker = broker_for(&iam).await;

    // Anonymous browsers reach the routes; API routes still refuse them
    let (status, _) = browse(&broker, "/dashboard/abc").await;
    assert_eq!(status, 302);
    let (status, _) = browse(&broker, "/v2/catalog").await;
    assert_eq!(status, 401);
}
