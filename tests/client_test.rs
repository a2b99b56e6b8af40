mod support;

use axum::http::StatusCode;
use serde_json::json;
use sevmeter::api::{Credentials, Endpoint, SevClient};
use std::sync::Arc;
use std::time::Duration;
use support::{Behaviour, spawn};

fn client_for(base_url: &str, timeout: Duration, max_age: Option<Duration>) -> SevClient {
    SevClient::new(
        Credentials {
            user_name: "user".into(),
            api_key: "key".into(),
        },
        base_url,
        timeout,
        max_age,
    )
    .unwrap()
}

#[tokio::test]
async fn login_once_then_bearer_calls() {
    let sev = spawn(Behaviour::default().respond(
        "hourly_kwh_usage",
        StatusCode::OK,
        json!([{"meter_id": "1", "readings": []}]),
    ))
    .await;
    let client = client_for(&sev.base_url, Duration::from_secs(2), None);

    let first = client
        .call(Endpoint::HourlyKwhUsage, &json!({"meters": ["1"]}))
        .await
        .unwrap();
    assert_eq!(first[0]["meter_id"], "1");
    let second = client.call(Endpoint::HourlyKwhUsage, &json!({})).await;
    assert!(second.is_some());

    assert_eq!(sev.logins(), 1);
    assert_eq!(
        sev.auth_headers(),
        vec!["Bearer jwt-token-1".to_string(), "Bearer jwt-token-1".to_string()]
    );
    assert_eq!(sev.payloads()[0].1, json!({"meters": ["1"]}));
}

#[tokio::test]
async fn authenticate_returns_literal_token() {
    let sev = spawn(Behaviour {
        token: "eyJhbGciOi.payload.sig".to_string(),
        ..Behaviour::default()
    })
    .await;
    let client = client_for(&sev.base_url, Duration::from_secs(2), None);
    assert_eq!(
        client.authenticate().await.as_deref(),
        Some("eyJhbGciOi.payload.sig")
    );
    assert!(client.has_token().await);
}

#[tokio::test]
async fn rejected_login_leaves_token_absent_and_is_retried() {
    let sev = spawn(Behaviour {
        login_status: StatusCode::UNAUTHORIZED,
        ..Behaviour::default()
    })
    .await;
    let client = client_for(&sev.base_url, Duration::from_secs(2), None);

    assert!(client.authenticate().await.is_none());
    assert!(!client.has_token().await);

    // No request is attempted without a token, but login is tried again
    assert!(client.call(Endpoint::EstimatedCost, &json!({})).await.is_none());
    assert_eq!(sev.logins(), 2);
    assert_eq!(sev.calls(), 0);
}

#[tokio::test]
async fn timed_out_call_yields_none() {
    let sev = spawn(
        Behaviour {
            endpoint_delay: Duration::from_secs(3),
            ..Behaviour::default()
        }
        .respond("estimated_CO2", StatusCode::OK, json!([])),
    )
    .await;
    let client = client_for(&sev.base_url, Duration::from_millis(300), None);

    let started = std::time::Instant::now();
    assert!(client.call(Endpoint::EstimatedCo2, &json!({})).await.is_none());
    assert!(started.elapsed() < Duration::from_secs(2));
    // The failure does not touch the cached token
    assert!(client.has_token().await);
}

#[tokio::test]
async fn status_and_empty_bodies_yield_none() {
    let sev = spawn(
        Behaviour::default()
            .respond("estimated_cost", StatusCode::INTERNAL_SERVER_ERROR, json!({"error": "boom"}))
            .respond_raw("estimated_CO2", StatusCode::OK, "")
            .respond_raw("hourly_kwh_usage", StatusCode::OK, "null")
            .respond_raw("get_available_meters", StatusCode::OK, "{not json"),
    )
    .await;
    let client = client_for(&sev.base_url, Duration::from_secs(2), None);

    assert!(client.call(Endpoint::EstimatedCost, &json!({})).await.is_none());
    assert!(client.call(Endpoint::EstimatedCo2, &json!({})).await.is_none());
    assert!(client.call(Endpoint::HourlyKwhUsage, &json!({})).await.is_none());
    assert!(client.get_available_meters().await.is_none());
    assert_eq!(sev.logins(), 1);
}

#[tokio::test]
async fn concurrent_callers_share_one_login() {
    let sev = spawn(
        Behaviour {
            login_delay: Duration::from_millis(200),
            ..Behaviour::default()
        }
        .respond("estimated_cost", StatusCode::OK, json!([])),
    )
    .await;
    let client = Arc::new(client_for(&sev.base_url, Duration::from_secs(2), None));

    let payload = json!({});
    let (a, b, c) = tokio::join!(
        client.call(Endpoint::EstimatedCost, &payload),
        client.call(Endpoint::EstimatedCost, &payload),
        client.call(Endpoint::EstimatedCost, &payload),
    );
    assert!(a.is_some() && b.is_some() && c.is_some());
    assert_eq!(sev.logins(), 1);
    assert_eq!(sev.calls(), 3);
}

#[tokio::test]
async fn concurrent_callers_do_not_repeat_a_failed_login() {
    let sev = spawn(Behaviour {
        login_status: StatusCode::FORBIDDEN,
        login_delay: Duration::from_millis(200),
        ..Behaviour::default()
    })
    .await;
    let client = client_for(&sev.base_url, Duration::from_secs(2), None);

    let payload = json!({});
    let (a, b) = tokio::join!(
        client.call(Endpoint::EstimatedCost, &payload),
        client.call(Endpoint::HourlyKwhUsage, &payload),
    );
    assert!(a.is_none() && b.is_none());
    assert_eq!(sev.logins(), 1);
}

#[tokio::test]
async fn late_waiter_on_failing_login_does_not_log_in_again() {
    let sev = spawn(Behaviour {
        login_status: StatusCode::FORBIDDEN,
        login_delay: Duration::from_millis(200),
        ..Behaviour::default()
    })
    .await;
    let client = client_for(&sev.base_url, Duration::from_secs(2), None);

    let payload = json!({});
    let (a, b) = tokio::join!(client.call(Endpoint::EstimatedCost, &payload), async {
        // Arrives while the first login is already on the wire
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.call(Endpoint::EstimatedCo2, &payload).await
    });
    assert!(a.is_none() && b.is_none());
    assert_eq!(sev.logins(), 1);

    // A caller arriving after the failure tries again
    assert!(client.call(Endpoint::EstimatedCost, &payload).await.is_none());
    assert_eq!(sev.logins(), 2);
    assert_eq!(sev.calls(), 0);
}

#[tokio::test]
async fn expired_or_invalidated_token_triggers_login() {
    let sev = spawn(Behaviour::default().respond("estimated_cost", StatusCode::OK, json!([])))
        .await;

    let client = client_for(&sev.base_url, Duration::from_secs(2), Some(Duration::ZERO));
    assert!(client.call(Endpoint::EstimatedCost, &json!({})).await.is_some());
    assert!(client.call(Endpoint::EstimatedCost, &json!({})).await.is_some());
    assert_eq!(sev.logins(), 2);

    let client = client_for(&sev.base_url, Duration::from_secs(2), None);
    assert!(client.call(Endpoint::EstimatedCost, &json!({})).await.is_some());
    client.invalidate_token().await;
    assert!(!client.has_token().await);
    assert!(client.call(Endpoint::EstimatedCost, &json!({})).await.is_some());
    assert_eq!(sev.logins(), 4);
}

#[tokio::test]
async fn discovers_meter_topology() {
    let sev = spawn(Behaviour::default().respond(
        "get_available_meters",
        StatusCode::OK,
        json!([{
            "customer_name": "Test Kunda",
            "installations": [{
                "inst_id": 55,
                "meters": [{"meter_id": 9001, "meter_name": "Hús", "meter_type": "E-01"}]
            }]
        }]),
    ))
    .await;
    let client = client_for(&sev.base_url, Duration::from_secs(2), None);

    let customers = client.get_available_meters().await.unwrap();
    assert_eq!(customers[0].installations[0].inst_id, "55");
    assert_eq!(customers[0].installations[0].meters[0].meter_id, "9001");
    assert_eq!(sev.payloads()[0], ("get_available_meters".to_string(), json!({})));
}
