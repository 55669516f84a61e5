use axum::{
    http::Method,
    routing::{get, patch, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod bookings;
pub mod error;
pub mod state;
pub mod trips;
pub mod worker;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderName::from_static("x-actor-id"),
        ]);

    Router::new()
        .route("/health", get(health))
        .route("/v1/trips", post(trips::create_trip))
        .route("/v1/trips/search", get(trips::search_trips))
        .route("/v1/trips/mine", get(trips::my_trips))
        .route(
            "/v1/trips/{id}",
            get(trips::get_trip).patch(trips::update_trip),
        )
        .route("/v1/trips/{id}/cancel", post(trips::cancel_trip))
        .route("/v1/trips/{id}/bookings", get(trips::trip_bookings))
        .route("/v1/bookings", post(bookings::create_booking))
        .route("/v1/bookings/mine", get(bookings::my_bookings))
        .route("/v1/bookings/{id}", patch(bookings::update_booking))
        .route("/v1/bookings/{id}/cancel", post(bookings::cancel_booking))
        .route("/v1/admin/sweep", post(admin::run_sweep))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
