// ABOUTME: Integration tests for the Looker API client
// ABOUTME: Checks login and run-once requests on the wire against a local responder

mod common;

use common::MockServer;
use looker_dashboard_sender::config::{normalize_url, SecretString};
use looker_dashboard_sender::delivery::{DeliveryRequest, FilterSet, Recipient};
use looker_dashboard_sender::error::{exit_code_for, ConnectorError};
use looker_dashboard_sender::outcome::DeliveryStatus;
use looker_dashboard_sender::remote::{Credentials, RemoteClient};

fn credentials() -> Credentials {
    Credentials {
        client_id: "abc".to_string(),
        client_secret: SecretString::new("s3cret"),
    }
}

#[tokio::test]
async fn test_login_sends_credentials_in_query_string() {
    let server = MockServer::start(vec![(200, r#"{"access_token":"tok123","token_type":"Bearer"}"#)]).await;
    let base = normalize_url(&server.host_url()).unwrap();

    RemoteClient::connect(base, &credentials()).await.unwrap();

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let login = &requests[0];
    assert_eq!(login.method, "POST");
    assert_eq!(login.target, "/api/3.1/login?client_id=abc&client_secret=s3cret");
    assert_eq!(
        login.header("content-type"),
        Some("application/x-www-form-urlencoded")
    );
    assert!(login.body.is_empty());
}

#[tokio::test]
async fn test_rejected_login_is_an_authentication_error() {
    let server = MockServer::start(vec![(401, r#"{"message":"Not found"}"#)]).await;
    let base = normalize_url(&server.host_url()).unwrap();

    let err = RemoteClient::connect(base, &credentials())
        .await
        .err()
        .expect("login should fail");

    assert!(matches!(
        err.downcast_ref::<ConnectorError>(),
        Some(ConnectorError::Authentication(_))
    ));
    assert_eq!(exit_code_for(&err), 1);
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_login_without_token_is_an_authentication_error() {
    let server = MockServer::start(vec![(200, r#"{"unexpected":true}"#)]).await;
    let base = normalize_url(&server.host_url()).unwrap();

    let err = RemoteClient::connect(base, &credentials())
        .await
        .err()
        .expect("login should fail");
    assert!(matches!(
        err.downcast_ref::<ConnectorError>(),
        Some(ConnectorError::Authentication(_))
    ));
    assert!(!format!("{:#}", err).contains("s3cret"));
}

#[tokio::test]
async fn test_deliver_dashboard_posts_run_once_plan() {
    let server = MockServer::start(vec![
        (200, r#"{"access_token":"tok123"}"#),
        (200, r#"{"id":1}"#),
    ])
    .await;
    let base = normalize_url(&server.host_url()).unwrap();
    let client = RemoteClient::connect(base, &credentials()).await.unwrap();

    let mut filters = FilterSet::new();
    filters.insert("Country", "USA");
    filters.insert("Date Selector", "2019/11/27");
    let request = DeliveryRequest::new(
        42,
        vec![Recipient::new("a@x.com"), Recipient::new("b@x.com")],
        Some(filters),
    )
    .unwrap();

    let outcome = client.deliver_dashboard(&request).await.unwrap();
    assert_eq!(outcome.status, DeliveryStatus::Sent);
    assert_eq!(outcome.recipient, "a@x.com");
    assert_eq!(outcome.message, "");
    assert_eq!(outcome.timestamp, client.session().created_at);

    let requests = server.requests();
    let plan = &requests[1];
    assert_eq!(plan.method, "POST");
    assert_eq!(plan.target, "/api/3.1/scheduled_plans/run_once");
    assert_eq!(plan.header("authorization"), Some("Bearer tok123"));
    assert_eq!(plan.header("content-type"), Some("application/json"));

    let body = plan.json();
    assert_eq!(body["name"], "run_once - 42");
    assert_eq!(body["title"], "run_once - 42");
    assert_eq!(body["dashboard_id"], 42);
    assert_eq!(body["enable"], true);
    assert_eq!(body["run_once"], true);
    assert_eq!(
        body["filters_string"],
        "?Country=USA&Date+Selector=2019%2F11%2F27"
    );
    let destinations = body["scheduled_plan_destination"].as_array().unwrap();
    assert_eq!(destinations.len(), 2);
    assert_eq!(destinations[1]["address"], "b@x.com");
    assert_eq!(destinations[1]["type"], "email");
}

#[tokio::test]
async fn test_created_status_counts_as_sent() {
    let server = MockServer::start(vec![
        (200, r#"{"access_token":"tok123"}"#),
        (201, r#"{"id":2}"#),
    ])
    .await;
    let base = normalize_url(&server.host_url()).unwrap();
    let client = RemoteClient::connect(base, &credentials()).await.unwrap();
    let request = DeliveryRequest::new(1, vec![Recipient::new("a@x.com")], None).unwrap();

    let outcome = client.deliver_dashboard(&request).await.unwrap();
    assert_eq!(outcome.status, DeliveryStatus::Sent);
    assert!(server.requests()[1].json().get("filters_string").is_none());
}

#[tokio::test]
async fn test_failed_delivery_carries_remote_body() {
    let server = MockServer::start(vec![
        (200, r#"{"access_token":"tok123"}"#),
        (422, r#"{"message":"Validation Failed"}"#),
    ])
    .await;
    let base = normalize_url(&server.host_url()).unwrap();
    let client = RemoteClient::connect(base, &credentials()).await.unwrap();
    let request = DeliveryRequest::new(7, vec![Recipient::new("a@x.com")], None).unwrap();

    match client.deliver_dashboard(&request).await {
        Err(ConnectorError::Delivery {
            dashboard_id,
            status,
            body,
        }) => {
            assert_eq!(dashboard_id, 7);
            assert_eq!(status, Some(422));
            assert_eq!(body, r#"{"message":"Validation Failed"}"#);
        }
        other => panic!("expected delivery error, got {:?}", other),
    }
}
