use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use tracing::{info, warn};
use uuid::Uuid;

use waypool_core::{Categorized, EntityStore, ErrorCategory, StoreError, StoreOp};
use waypool_shared::models::MAX_SEATS;
use waypool_shared::{Booking, BookingDraft, CompletionCause, DraftError, Trip, TripStatus};
use waypool_trips::ledger::{self, LedgerError};
use waypool_trips::lifecycle::{self, LifecycleError};

const MAX_COMMIT_ATTEMPTS: u32 = 3;

async fn conflict_backoff(attempt: u32) {
    let jitter: u64 = rand::thread_rng().gen_range(0..=30);
    tokio::time::sleep(std::time::Duration::from_millis(10 * attempt as u64 + jitter)).await;
}

/// The only entry point for creating, resizing or cancelling a booking.
///
/// Every operation reads the trip, computes the new seat state through the
/// ledger, and commits trip + booking together in one atomic store call
/// guarded by the trip's version. A conflicting writer costs a bounded
/// retry, never a broken invariant: after every committed call,
/// `available_seats + sum(active booking seats) == seats_offered`.
pub struct ReservationEngine {
    store: Arc<dyn EntityStore>,
}

impl ReservationEngine {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Reserve seats on an active trip. Filling the last seat flips the trip
    /// to COMPLETED (the fully-booked shortcut, reversed when seats free up).
    pub async fn create_booking(
        &self,
        passenger_id: &str,
        draft: BookingDraft,
    ) -> Result<Booking, EngineError> {
        draft.validate()?;
        let trip_id = draft.trip_id;

        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let mut trip = self
                .store
                .get_trip(trip_id)
                .await?
                .ok_or(EngineError::TripNotFound(trip_id))?;
            if trip.status != TripStatus::Active {
                return Err(EngineError::TripNotBookable {
                    status: trip.status.as_str(),
                });
            }

            let active = self.store.list_active_bookings(trip_id).await?;
            if active.iter().any(|b| b.passenger_id == passenger_id) {
                return Err(EngineError::DuplicateBooking);
            }

            trip.available_seats = ledger::reserve(&trip, draft.seats)?;
            if trip.is_fully_booked() {
                lifecycle::complete_by_full_booking(&mut trip)?;
            }
            trip.touch();

            let booking = draft
                .clone()
                .into_booking(&trip, passenger_id.to_string())?;

            match self
                .store
                .commit_atomic(vec![
                    StoreOp::UpdateTrip(trip.clone()),
                    StoreOp::InsertBooking(booking.clone()),
                ])
                .await
            {
                Ok(()) => {
                    info!(
                        booking_id = %booking.id,
                        trip_id = %trip_id,
                        passenger_id,
                        seats = booking.seats,
                        "booking created"
                    );
                    return Ok(booking);
                }
                Err(StoreError::VersionConflict(_)) => {
                    warn!(trip_id = %trip_id, attempt, "booking commit conflicted, retrying");
                    conflict_backoff(attempt).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(EngineError::RetriesExhausted)
    }

    /// Change the seat count of an active booking before departure. Growth
    /// reserves the delta, shrinkage releases it; the fully-booked shortcut
    /// applies in both directions.
    pub async fn update_booking_seats(
        &self,
        booking_id: Uuid,
        passenger_id: &str,
        new_seats: i32,
    ) -> Result<Booking, EngineError> {
        if new_seats < 1 || new_seats > MAX_SEATS {
            return Err(DraftError::SeatCountOutOfRange(new_seats).into());
        }

        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let (mut booking, mut trip) = self.load_booking_pair(booking_id).await?;
            if booking.passenger_id != passenger_id {
                return Err(EngineError::Forbidden);
            }
            if !booking.is_active() {
                return Err(EngineError::BookingNotActive);
            }
            if trip.departure_at <= Utc::now() {
                return Err(EngineError::TripAlreadyStarted);
            }
            if !Self::accepts_seat_edits(&trip) {
                return Err(EngineError::TripNotBookable {
                    status: trip.status.as_str(),
                });
            }

            let delta = new_seats - booking.seats;
            if delta == 0 {
                return Ok(booking);
            }
            if delta > 0 {
                trip.available_seats = ledger::reserve(&trip, delta)?;
            } else {
                trip.available_seats = ledger::release(&trip, -delta);
            }
            booking.seats = new_seats;
            Self::reconcile_full_booking(&mut trip)?;
            trip.touch();

            match self
                .store
                .commit_atomic(vec![
                    StoreOp::UpdateTrip(trip.clone()),
                    StoreOp::UpdateBooking(booking.clone()),
                ])
                .await
            {
                Ok(()) => {
                    info!(booking_id = %booking_id, seats = new_seats, "booking resized");
                    return Ok(booking);
                }
                Err(StoreError::VersionConflict(_)) => {
                    warn!(booking_id = %booking_id, attempt, "resize conflicted, retrying");
                    conflict_backoff(attempt).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(EngineError::RetriesExhausted)
    }

    /// Update the free-text note. Same ownership and liveness rules as a
    /// seat edit, no seat math.
    pub async fn update_booking_notes(
        &self,
        booking_id: Uuid,
        passenger_id: &str,
        notes: Option<String>,
    ) -> Result<Booking, EngineError> {
        let (mut booking, trip) = self.load_booking_pair(booking_id).await?;
        if booking.passenger_id != passenger_id {
            return Err(EngineError::Forbidden);
        }
        if !booking.is_active() {
            return Err(EngineError::BookingNotActive);
        }
        if trip.departure_at <= Utc::now() {
            return Err(EngineError::TripAlreadyStarted);
        }
        if trip.status != TripStatus::Active {
            return Err(EngineError::TripNotBookable {
                status: trip.status.as_str(),
            });
        }

        booking.notes = notes;
        self.store
            .commit_atomic(vec![StoreOp::UpdateBooking(booking.clone())])
            .await?;
        Ok(booking)
    }

    /// Cancel a booking. Allowed to the booking's passenger and to the
    /// trip's driver; the freed seats go back to the pool and a trip that
    /// was COMPLETED only by being full reopens.
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        actor_id: &str,
    ) -> Result<Booking, EngineError> {
        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let (mut booking, mut trip) = self.load_booking_pair(booking_id).await?;
            let is_passenger = booking.passenger_id == actor_id;
            let is_driver = trip.driver_id == actor_id;
            if !is_passenger && !is_driver {
                return Err(EngineError::Forbidden);
            }
            if !booking.is_active() {
                return Err(EngineError::AlreadyCancelled);
            }

            booking.cancel();
            trip.available_seats = ledger::release(&trip, booking.seats);
            Self::reconcile_full_booking(&mut trip)?;
            trip.touch();

            match self
                .store
                .commit_atomic(vec![
                    StoreOp::UpdateTrip(trip.clone()),
                    StoreOp::UpdateBooking(booking.clone()),
                ])
                .await
            {
                Ok(()) => {
                    info!(booking_id = %booking_id, actor_id, "booking cancelled");
                    return Ok(booking);
                }
                Err(StoreError::VersionConflict(_)) => {
                    warn!(booking_id = %booking_id, attempt, "cancel conflicted, retrying");
                    conflict_backoff(attempt).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(EngineError::RetriesExhausted)
    }

    pub async fn list_passenger_bookings(
        &self,
        passenger_id: &str,
    ) -> Result<Vec<Booking>, EngineError> {
        Ok(self.store.list_bookings_for_passenger(passenger_id).await?)
    }

    async fn load_booking_pair(&self, booking_id: Uuid) -> Result<(Booking, Trip), EngineError> {
        let booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or(EngineError::BookingNotFound(booking_id))?;
        let trip = self
            .store
            .get_trip(booking.trip_id)
            .await?
            .ok_or(EngineError::TripNotFound(booking.trip_id))?;
        Ok((booking, trip))
    }

    /// Seat edits stay legal on an ACTIVE trip, and on one that is COMPLETED
    /// only because it filled up (shrinking the booking is what reopens it).
    fn accepts_seat_edits(trip: &Trip) -> bool {
        trip.status == TripStatus::Active
            || (trip.status == TripStatus::Completed
                && trip.completion == Some(CompletionCause::FullyBooked))
    }

    /// Keep status in step with the seat count after a mutation: zero seats
    /// on an active trip completes it, freed seats on a fully-booked one
    /// reopen it. Trips completed by time or cancelled are left alone.
    fn reconcile_full_booking(trip: &mut Trip) -> Result<(), LifecycleError> {
        if trip.is_fully_booked() && trip.status == TripStatus::Active {
            lifecycle::complete_by_full_booking(trip)?;
        } else if !trip.is_fully_booked()
            && trip.status == TripStatus::Completed
            && trip.completion == Some(CompletionCause::FullyBooked)
        {
            lifecycle::reopen(trip)?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Trip not found: {0}")]
    TripNotFound(Uuid),

    #[error("Booking not found: {0}")]
    BookingNotFound(Uuid),

    #[error("Trip is not bookable in status {status}")]
    TripNotBookable { status: &'static str },

    #[error("Passenger already holds an active booking on this trip")]
    DuplicateBooking,

    #[error("Booking is not active")]
    BookingNotActive,

    #[error("Booking is already cancelled")]
    AlreadyCancelled,

    #[error("Trip has already departed")]
    TripAlreadyStarted,

    #[error("Actor may not touch this booking")]
    Forbidden,

    #[error(transparent)]
    Draft(#[from] DraftError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Commit kept conflicting, try again")]
    RetriesExhausted,
}

impl Categorized for EngineError {
    fn category(&self) -> ErrorCategory {
        match self {
            EngineError::TripNotFound(_) | EngineError::BookingNotFound(_) => {
                ErrorCategory::NotFound
            }
            EngineError::DuplicateBooking => ErrorCategory::Conflict,
            EngineError::TripNotBookable { .. }
            | EngineError::BookingNotActive
            | EngineError::AlreadyCancelled
            | EngineError::TripAlreadyStarted => ErrorCategory::InvalidState,
            EngineError::Forbidden => ErrorCategory::Forbidden,
            EngineError::Draft(_) => ErrorCategory::Validation,
            EngineError::Ledger(e) => e.category(),
            EngineError::Lifecycle(e) => e.category(),
            EngineError::Store(StoreError::NotFound(_)) => ErrorCategory::NotFound,
            EngineError::Store(_) | EngineError::RetriesExhausted => ErrorCategory::Transient,
        }
    }
}
