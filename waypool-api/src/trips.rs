use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use waypool_core::TripFilter;
use waypool_shared::{Booking, Trip, TripDraft};
use waypool_trips::TripChanges;

use crate::error::AppError;
use crate::state::AppState;

/// Opaque actor id, resolved from the `X-Actor-Id` header. Who verified it
/// is not this service's problem.
pub async fn actor_id(state: &AppState, headers: &HeaderMap) -> Result<String, AppError> {
    let presented = headers
        .get("x-actor-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    Ok(state.identity.resolve(presented).await?)
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub from: Option<String>,
    pub to: Option<String>,
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub passengers: i32,
    pub max_price: Option<i64>,
}

/// POST /v1/trips
pub async fn create_trip(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(draft): Json<TripDraft>,
) -> Result<(StatusCode, Json<Trip>), AppError> {
    let driver = actor_id(&state, &headers).await?;
    let trip = state.trips.create_trip(&driver, draft).await?;
    Ok((StatusCode::CREATED, Json(trip)))
}

/// GET /v1/trips/search
pub async fn search_trips(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Trip>>, AppError> {
    let filter = TripFilter {
        origin: params.from,
        destination: params.to,
        date: params.date,
        min_seats: params.passengers,
        max_price: params.max_price,
    };
    let trips = state.trips.search_trips(&filter).await?;
    Ok(Json(trips))
}

/// GET /v1/trips/mine
pub async fn my_trips(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Trip>>, AppError> {
    let driver = actor_id(&state, &headers).await?;
    let trips = state.trips.list_trips_for_driver(&driver).await?;
    Ok(Json(trips))
}

/// GET /v1/trips/{id}
pub async fn get_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
) -> Result<Json<Trip>, AppError> {
    let trip = state.trips.get_trip(trip_id).await?;
    Ok(Json(trip))
}

/// PATCH /v1/trips/{id}
pub async fn update_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
    headers: HeaderMap,
    Json(changes): Json<TripChanges>,
) -> Result<Json<Trip>, AppError> {
    let driver = actor_id(&state, &headers).await?;
    let trip = state.trips.update_trip(trip_id, &driver, changes).await?;
    Ok(Json(trip))
}

/// POST /v1/trips/{id}/cancel
pub async fn cancel_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Trip>, AppError> {
    let driver = actor_id(&state, &headers).await?;
    let trip = state.trips.cancel_trip(trip_id, &driver).await?;
    Ok(Json(trip))
}

/// GET /v1/trips/{id}/bookings
pub async fn trip_bookings(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Vec<Booking>>, AppError> {
    let driver = actor_id(&state, &headers).await?;
    let bookings = state.trips.list_trip_bookings(trip_id, &driver).await?;
    Ok(Json(bookings))
}
