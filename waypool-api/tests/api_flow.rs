use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use waypool_api::{app, AppState};
use waypool_store::MemoryStore;

fn test_app() -> axum::Router {
    let store = Arc::new(MemoryStore::new());
    app(AppState::new(store, 360))
}

fn request(method: &str, uri: &str, actor: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        builder = builder.header("x-actor-id", actor);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn trip_payload(seats: i32) -> Value {
    json!({
        "origin": "Kazan, Bauman st. 1",
        "destination": "Samara, Kuybyshev sq.",
        "departure_at": (Utc::now() + Duration::hours(6)).to_rfc3339(),
        "seats_offered": seats,
        "price_per_seat": 1200,
    })
}

#[tokio::test]
async fn test_booking_flow_over_http() {
    let app = test_app();

    // Driver publishes a trip.
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/v1/trips",
            Some("driver-1"),
            Some(trip_payload(2)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let trip = body_json(response).await;
    let trip_id = trip["id"].as_str().unwrap().to_string();

    // Passenger takes both seats: trip fills up and completes.
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/v1/bookings",
            Some("pax-1"),
            Some(json!({ "trip_id": trip_id, "seats": 2 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let booking = body_json(response).await;
    assert_eq!(booking["price_per_seat"], 1200);

    let response = app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/v1/trips/{trip_id}"),
            None,
            None,
        ))
        .await
        .unwrap();
    let trip = body_json(response).await;
    assert_eq!(trip["available_seats"], 0);
    assert_eq!(trip["status"], "COMPLETED");

    // A second passenger bounces off the full trip with a state error.
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/v1/bookings",
            Some("pax-2"),
            Some(json!({ "trip_id": trip_id, "seats": 1 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Cancelling frees the seats and reopens the trip.
    let booking_id = booking["id"].as_str().unwrap();
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/v1/bookings/{booking_id}/cancel"),
            Some("pax-1"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/v1/trips/{trip_id}"),
            None,
            None,
        ))
        .await
        .unwrap();
    let trip = body_json(response).await;
    assert_eq!(trip["available_seats"], 2);
    assert_eq!(trip["status"], "ACTIVE");
}

#[tokio::test]
async fn test_insufficient_seats_is_a_conflict() {
    let app = test_app();

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/v1/trips",
            Some("driver-1"),
            Some(trip_payload(1)),
        ))
        .await
        .unwrap();
    let trip = body_json(response).await;
    let trip_id = trip["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/v1/bookings",
            Some("pax-1"),
            Some(json!({ "trip_id": trip_id, "seats": 2 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["category"], "CONFLICT");
}

#[tokio::test]
async fn test_missing_actor_header_is_unauthorized() {
    let app = test_app();
    let response = app
        .oneshot(request("POST", "/v1/trips", None, Some(trip_payload(2))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_manual_sweep_endpoint() {
    let app = test_app();
    let response = app
        .oneshot(request("POST", "/v1/admin/sweep", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let outcome = body_json(response).await;
    assert_eq!(outcome["departed"], 0);
    assert_eq!(outcome["completed"], 0);
}
