//! HTTP surface tests through `tower::ServiceExt::oneshot`.
//!
//! Run with: `cargo test -p relief --test http_api`

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::harness;
use relief::server::{AppState, build_router};
use relief_web::{REQUEST_ID_HEADER, USER_ID_HEADER, USER_ROLE_HEADER};
use serde_json::{Value, json};
use tower::ServiceExt;

// ============================================================================
// Helpers
// ============================================================================

async fn app() -> Router {
    let h = harness(&[], &[]).await;
    build_router(AppState::new(h.services, None))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    who: Option<(&str, &str)>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some((user, role)) = who {
        request = request.header(USER_ID_HEADER, user).header(USER_ROLE_HEADER, role);
    }
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, value)
}

const GOV: Option<(&str, &str)> = Some(("gov-1", "government"));
const RESCUE: Option<(&str, &str)> = Some(("rc-1", "rescue-center"));
const CITIZEN: Option<(&str, &str)> = Some(("cit-1", "citizen"));

fn new_center(name: &str, capacity: i64) -> Value {
    json!({
        "name": name,
        "location": { "address": "1 River Rd", "point": { "lat": 9.93, "lon": 76.26 } },
        "total_capacity": capacity,
        "supplies": { "water": 80.0, "food": 10.0 }
    })
}

async fn create_center(app: &Router, who: Option<(&str, &str)>, name: &str, capacity: i64) -> String {
    let (status, body) = send(app, Method::POST, "/api/centers", who, Some(new_center(name, capacity))).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_string()
}

async fn admit(app: &Router, center_id: &str, first: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/api/guests",
        GOV,
        Some(json!({ "center_id": center_id, "first_name": first, "last_name": "Doe" })),
    )
    .await
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_health_and_readiness() {
    let app = app().await;
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app, Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);
}

#[tokio::test]
async fn test_metrics_disabled_is_not_found() {
    let app = app().await;
    let (status, _) = send(&app, Method::GET, "/metrics", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = app().await;
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.headers().contains_key(REQUEST_ID_HEADER));
}

#[tokio::test]
async fn test_admission_flow_over_http() {
    let app = app().await;
    let center = create_center(&app, RESCUE, "Riverside", 1).await;

    let (status, center_body) = send(&app, Method::GET, &format!("/api/centers/{center}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(center_body["manager_id"], "rc-1");
    assert_eq!(center_body["status"], "active");

    let (status, guest) = admit(&app, &center, "Ada").await;
    assert_eq!(status, StatusCode::CREATED, "{guest}");
    assert_eq!(guest["status"], "active");
    let guest_id = guest["id"].as_str().unwrap().to_string();

    let (status, availability) =
        send(&app, Method::GET, &format!("/api/centers/{center}/availability"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(availability["current_occupancy"], 1);
    assert_eq!(availability["available_capacity"], 0);

    let (status, body) = admit(&app, &center, "Grace").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CENTER_FULL");

    let uri = format!("/api/guests/{guest_id}/discharge");
    let (status, body) = send(&app, Method::POST, &uri, GOV, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "discharged");
    let (_, body) = send(&app, Method::POST, &uri, GOV, None).await;
    assert_eq!(body["outcome"], "already_discharged");

    let (_, availability) =
        send(&app, Method::GET, &format!("/api/centers/{center}/availability"), None, None).await;
    assert_eq!(availability["current_occupancy"], 0);
}

#[tokio::test]
async fn test_transfer_and_update_routing() {
    let app = app().await;
    let a = create_center(&app, GOV, "A", 5).await;
    let b = create_center(&app, GOV, "B", 5).await;
    let (_, guest) = admit(&app, &a, "Ada").await;
    let id = guest["id"].as_str().unwrap().to_string();

    let (status, moved) = send(
        &app,
        Method::POST,
        &format!("/api/guests/{id}/transfer"),
        GOV,
        Some(json!({ "target_center_id": b })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{moved}");
    assert_eq!(moved["center_id"], b.as_str());
    assert_eq!(moved["transfer_history"].as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/guests/{id}/transfer"),
        GOV,
        Some(json!({ "target_center_id": b })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "SAME_CENTER");

    // A center change through PUT is a transfer back.
    let (status, updated) = send(
        &app,
        Method::PUT,
        &format!("/api/guests/{id}"),
        GOV,
        Some(json!({ "center_id": a, "notes": "moved back" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert_eq!(updated["center_id"], a.as_str());
    assert_eq!(updated["notes"], "moved back");

    let (_, stats) = send(&app, Method::GET, "/api/stats", None, None).await;
    assert_eq!(stats["total_occupancy"], 1);
}

#[tokio::test]
async fn test_guest_listing_and_search() {
    let app = app().await;
    let a = create_center(&app, GOV, "A", 5).await;
    admit(&app, &a, "Ada").await;
    admit(&app, &a, "Grace").await;

    let (status, all) = send(&app, Method::GET, "/api/guests", CITIZEN, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (_, found) = send(&app, Method::GET, "/api/guests?q=gra", CITIZEN, None).await;
    assert_eq!(found.as_array().unwrap().len(), 1);
    assert_eq!(found[0]["first_name"], "Grace");

    let (_, at_center) = send(&app, Method::GET, &format!("/api/centers/{a}/guests"), CITIZEN, None).await;
    assert_eq!(at_center.as_array().unwrap().len(), 2);

    let (status, body) = send(&app, Method::GET, "/api/guests?status=missing", CITIZEN, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_authentication_and_authorization() {
    let app = app().await;
    let a = create_center(&app, GOV, "A", 5).await;

    let (status, body) = send(&app, Method::POST, "/api/centers", None, Some(new_center("X", 1))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");

    let (status, body) = send(&app, Method::POST, "/api/centers", CITIZEN, Some(new_center("X", 1))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    // A rescue center that does not manage A cannot admit there.
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/guests",
        RESCUE,
        Some(json!({ "center_id": a, "first_name": "Ada", "last_name": "Doe" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::GET, "/api/guests", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_validation_errors() {
    let app = app().await;

    let (status, body) = send(&app, Method::POST, "/api/centers", GOV, Some(new_center("  ", -1))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    let fields: Vec<&str> = body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"name"));
    assert!(fields.contains(&"total_capacity"));

    let (status, body) = send(&app, Method::POST, "/api/guests", GOV, Some(json!({ "first_name": "Ada" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["fields"][0]["field"], "body");

    let (status, body) =
        send(&app, Method::GET, "/api/stats/trends?lookback_hours=1&bucket_minutes=0", None, None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    for uri in [
        "/api/stats/trends?lookback_hours=9223372036854775807&bucket_minutes=2",
        "/api/stats/trends?lookback_hours=1000000000000000&bucket_minutes=100000000000000",
    ] {
        let (status, body) = send(&app, Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{uri}");
        assert_eq!(body["fields"][0]["field"], "lookback_hours");
    }
}

#[tokio::test]
async fn test_not_found_and_center_not_empty() {
    let app = app().await;

    let (status, body) = send(&app, Method::GET, "/api/centers/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = send(&app, Method::GET, "/api/guests/GST-nope", GOV, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let a = create_center(&app, GOV, "A", 5).await;
    admit(&app, &a, "Ada").await;
    let (status, body) = send(&app, Method::DELETE, &format!("/api/centers/{a}"), GOV, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CENTER_NOT_EMPTY");
}

#[tokio::test]
async fn test_supplies_and_shortage_report() {
    let app = app().await;
    let a = create_center(&app, GOV, "A", 5).await;

    let (status, center) = send(
        &app,
        Method::PATCH,
        &format!("/api/centers/{a}/supplies"),
        GOV,
        Some(json!({ "supplies": { "medicine": 5.0 } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{center}");
    assert_eq!(center["supplies"]["water"], 80.0);
    assert_eq!(center["supplies"]["medicine"], 5.0);

    let (status, report) = send(&app, Method::GET, "/api/stats/shortages", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let low: Vec<&str> = report["centers"][0]["low_supplies"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["supply"].as_str().unwrap())
        .collect();
    assert_eq!(low, ["food", "medicine"]);

    let (status, stats) = send(&app, Method::GET, &format!("/api/stats/centers/{a}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_capacity"], 5);
}
