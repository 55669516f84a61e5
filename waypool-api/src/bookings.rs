use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use waypool_shared::{Booking, BookingDraft};

use crate::error::AppError;
use crate::state::AppState;
use crate::trips::actor_id;

#[derive(Debug, Deserialize)]
pub struct BookingUpdate {
    pub seats: Option<i32>,
    pub notes: Option<String>,
}

/// POST /v1/bookings
pub async fn create_booking(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(draft): Json<BookingDraft>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let passenger = actor_id(&state, &headers).await?;
    let booking = state.engine.create_booking(&passenger, draft).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// GET /v1/bookings/mine
pub async fn my_bookings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Booking>>, AppError> {
    let passenger = actor_id(&state, &headers).await?;
    let bookings = state.engine.list_passenger_bookings(&passenger).await?;
    Ok(Json(bookings))
}

/// PATCH /v1/bookings/{id}
pub async fn update_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    headers: HeaderMap,
    Json(update): Json<BookingUpdate>,
) -> Result<Json<Booking>, AppError> {
    let passenger = actor_id(&state, &headers).await?;

    let mut booking = None;
    if let Some(seats) = update.seats {
        booking = Some(
            state
                .engine
                .update_booking_seats(booking_id, &passenger, seats)
                .await?,
        );
    }
    if let Some(notes) = update.notes {
        booking = Some(
            state
                .engine
                .update_booking_notes(booking_id, &passenger, Some(notes))
                .await?,
        );
    }

    match booking {
        Some(booking) => Ok(Json(booking)),
        // Empty patch: echo current state back.
        None => {
            let bookings = state.engine.list_passenger_bookings(&passenger).await?;
            bookings
                .into_iter()
                .find(|b| b.id == booking_id)
                .map(Json)
                .ok_or(AppError::Booking(
                    waypool_bookings::EngineError::BookingNotFound(booking_id),
                ))
        }
    }
}

/// POST /v1/bookings/{id}/cancel
pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Booking>, AppError> {
    let actor = actor_id(&state, &headers).await?;
    let booking = state.engine.cancel_booking(booking_id, &actor).await?;
    Ok(Json(booking))
}
