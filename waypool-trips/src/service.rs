use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use waypool_core::{Categorized, EntityStore, ErrorCategory, StoreError, StoreOp, TripFilter};
use waypool_shared::models::MAX_SEATS;
use waypool_shared::{Booking, DraftError, Trip, TripDraft};

use crate::ledger::{self, LedgerError};
use crate::lifecycle::{self, LifecycleError};

/// How many times a read-compute-commit cycle retries a version conflict
/// before giving up with a caller-retryable failure.
pub(crate) const MAX_COMMIT_ATTEMPTS: u32 = 3;

pub(crate) async fn conflict_backoff(attempt: u32) {
    let jitter: u64 = rand::thread_rng().gen_range(0..=30);
    tokio::time::sleep(std::time::Duration::from_millis(10 * attempt as u64 + jitter)).await;
}

/// Driver-side trip operations: publish, edit, cancel (with booking
/// cascade), plus the read paths the HTTP layer exposes.
pub struct TripService {
    store: Arc<dyn EntityStore>,
}

/// Partial update from the driver. Absent fields stay untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TripChanges {
    pub seats_offered: Option<i32>,
    pub price_per_seat: Option<i64>,
    pub departure_at: Option<DateTime<Utc>>,
    pub arrival_estimate: Option<DateTime<Utc>>,
    pub route_duration_min: Option<i64>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub comment: Option<String>,
}

impl TripService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    pub async fn create_trip(
        &self,
        driver_id: &str,
        draft: TripDraft,
    ) -> Result<Trip, TripServiceError> {
        let trip = draft.into_trip(driver_id.to_string())?;
        self.store.insert_trip(&trip).await?;
        info!(trip_id = %trip.id, driver_id, seats = trip.seats_offered, "trip published");
        Ok(trip)
    }

    pub async fn get_trip(&self, trip_id: Uuid) -> Result<Trip, TripServiceError> {
        self.store
            .get_trip(trip_id)
            .await?
            .ok_or(TripServiceError::TripNotFound(trip_id))
    }

    /// Edit an active, not-yet-departed trip. Seat resizes go through the
    /// ledger so capacity never drops below what passengers already hold.
    pub async fn update_trip(
        &self,
        trip_id: Uuid,
        driver_id: &str,
        changes: TripChanges,
    ) -> Result<Trip, TripServiceError> {
        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let mut trip = self.get_trip(trip_id).await?;
            if trip.driver_id != driver_id {
                return Err(TripServiceError::Forbidden);
            }
            lifecycle::ensure_editable(&trip, Utc::now())?;

            apply_changes(&mut trip, &changes)?;
            trip.touch();

            match self
                .store
                .commit_atomic(vec![StoreOp::UpdateTrip(trip.clone())])
                .await
            {
                Ok(()) => {
                    trip.version += 1;
                    info!(trip_id = %trip.id, "trip updated");
                    return Ok(trip);
                }
                Err(StoreError::VersionConflict(_)) => {
                    warn!(trip_id = %trip_id, attempt, "trip update hit version conflict, retrying");
                    conflict_backoff(attempt).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(TripServiceError::RetriesExhausted)
    }

    /// Cancel a trip and cascade onto every active booking. The freed seat
    /// numbers are informational once the trip is terminal, but they are
    /// still released so the arithmetic invariant keeps holding.
    pub async fn cancel_trip(
        &self,
        trip_id: Uuid,
        driver_id: &str,
    ) -> Result<Trip, TripServiceError> {
        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let mut trip = self.get_trip(trip_id).await?;
            if trip.driver_id != driver_id {
                return Err(TripServiceError::Forbidden);
            }
            lifecycle::cancel(&mut trip)?;

            let bookings = self.store.list_active_bookings(trip_id).await?;
            let cancelled = bookings.len();
            let mut ops = Vec::with_capacity(bookings.len() + 1);
            for mut booking in bookings {
                booking.cancel();
                trip.available_seats = ledger::release(&trip, booking.seats);
                ops.push(StoreOp::UpdateBooking(booking));
            }
            ops.push(StoreOp::UpdateTrip(trip.clone()));

            match self.store.commit_atomic(ops).await {
                Ok(()) => {
                    trip.version += 1;
                    info!(trip_id = %trip.id, cancelled_bookings = cancelled, "trip cancelled");
                    return Ok(trip);
                }
                Err(StoreError::VersionConflict(_)) => {
                    warn!(trip_id = %trip_id, attempt, "trip cancel hit version conflict, retrying");
                    conflict_backoff(attempt).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(TripServiceError::RetriesExhausted)
    }

    /// Active bookings on a trip, visible to the trip's driver.
    pub async fn list_trip_bookings(
        &self,
        trip_id: Uuid,
        actor_id: &str,
    ) -> Result<Vec<Booking>, TripServiceError> {
        let trip = self.get_trip(trip_id).await?;
        if trip.driver_id != actor_id {
            return Err(TripServiceError::Forbidden);
        }
        Ok(self.store.list_active_bookings(trip_id).await?)
    }

    pub async fn search_trips(&self, filter: &TripFilter) -> Result<Vec<Trip>, TripServiceError> {
        Ok(self.store.search_trips(filter).await?)
    }

    pub async fn list_trips_for_driver(
        &self,
        driver_id: &str,
    ) -> Result<Vec<Trip>, TripServiceError> {
        Ok(self.store.list_trips_for_driver(driver_id).await?)
    }
}

fn apply_changes(trip: &mut Trip, changes: &TripChanges) -> Result<(), TripServiceError> {
    if let Some(new_total) = changes.seats_offered {
        if new_total < 1 || new_total > MAX_SEATS {
            return Err(DraftError::SeatCountOutOfRange(new_total).into());
        }
        trip.available_seats = ledger::resize(trip, new_total)?;
        trip.seats_offered = new_total;
    }
    if let Some(price) = changes.price_per_seat {
        if price <= 0 {
            return Err(DraftError::NonPositivePrice(price).into());
        }
        // Existing booking snapshots keep the price they were made at.
        trip.price_per_seat = price;
    }
    if let Some(departure) = changes.departure_at {
        if departure <= Utc::now() {
            return Err(DraftError::DepartureInPast.into());
        }
        trip.departure_at = departure;
    }
    if let Some(arrival) = changes.arrival_estimate {
        trip.arrival_estimate = Some(arrival);
    }
    if let Some(duration) = changes.route_duration_min {
        trip.route_duration_min = Some(duration);
    }
    if let Some(origin) = &changes.origin {
        trip.origin = origin.clone();
    }
    if let Some(destination) = &changes.destination {
        trip.destination = destination.clone();
    }
    if let Some(comment) = &changes.comment {
        trip.comment = Some(comment.clone());
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum TripServiceError {
    #[error("Trip not found: {0}")]
    TripNotFound(Uuid),

    #[error("Actor does not own this trip")]
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

impl Categorized for TripServiceError {
    fn category(&self) -> ErrorCategory {
        match self {
            TripServiceError::TripNotFound(_) => ErrorCategory::NotFound,
            TripServiceError::Forbidden => ErrorCategory::Forbidden,
            TripServiceError::Draft(_) => ErrorCategory::Validation,
            TripServiceError::Ledger(e) => e.category(),
            TripServiceError::Lifecycle(e) => e.category(),
            TripServiceError::Store(StoreError::NotFound(_)) => ErrorCategory::NotFound,
            TripServiceError::Store(_) | TripServiceError::RetriesExhausted => {
                ErrorCategory::Transient
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use waypool_shared::{BookingDraft, BookingStatus, TripStatus};
    use waypool_store::MemoryStore;

    fn service() -> (Arc<MemoryStore>, TripService) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), TripService::new(store))
    }

    fn draft(seats: i32) -> TripDraft {
        TripDraft {
            origin: "Kazan, Bauman st.".to_string(),
            destination: "Samara, Leninskaya st.".to_string(),
            departure_at: Utc::now() + Duration::hours(4),
            arrival_estimate: None,
            route_duration_min: None,
            seats_offered: seats,
            price_per_seat: 1500,
            comment: None,
        }
    }

    async fn seed_booking(
        store: &Arc<MemoryStore>,
        trip: &Trip,
        passenger: &str,
        seats: i32,
    ) -> Booking {
        let booking = BookingDraft {
            trip_id: trip.id,
            seats,
            notes: None,
        }
        .into_booking(trip, passenger.to_string())
        .unwrap();
        let mut updated = store.get_trip(trip.id).await.unwrap().unwrap();
        updated.available_seats -= seats;
        store
            .commit_atomic(vec![
                StoreOp::UpdateTrip(updated),
                StoreOp::InsertBooking(booking.clone()),
            ])
            .await
            .unwrap();
        booking
    }

    #[tokio::test]
    async fn test_create_and_update_trip() {
        let (_, service) = service();
        let trip = service.create_trip("driver-1", draft(3)).await.unwrap();
        assert_eq!(trip.status, TripStatus::Active);

        let changes = TripChanges {
            price_per_seat: Some(1800),
            comment: Some("No smoking".to_string()),
            ..Default::default()
        };
        let updated = service
            .update_trip(trip.id, "driver-1", changes)
            .await
            .unwrap();
        assert_eq!(updated.price_per_seat, 1800);
        assert_eq!(updated.comment.as_deref(), Some("No smoking"));
        assert_eq!(updated.version, 1);
    }

    #[tokio::test]
    async fn test_update_rejected_for_non_owner() {
        let (_, service) = service();
        let trip = service.create_trip("driver-1", draft(3)).await.unwrap();
        let err = service
            .update_trip(trip.id, "driver-2", TripChanges::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TripServiceError::Forbidden));
    }

    #[tokio::test]
    async fn test_resize_below_reserved_floor_leaves_state_untouched() {
        let (store, service) = service();
        let trip = service.create_trip("driver-1", draft(4)).await.unwrap();
        seed_booking(&store, &trip, "pax-1", 3).await;

        let changes = TripChanges {
            seats_offered: Some(2),
            ..Default::default()
        };
        let err = service
            .update_trip(trip.id, "driver-1", changes)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TripServiceError::Ledger(LedgerError::BelowReservedFloor { .. })
        ));

        let stored = store.get_trip(trip.id).await.unwrap().unwrap();
        assert_eq!(stored.seats_offered, 4);
        assert_eq!(stored.available_seats, 1);
    }

    #[tokio::test]
    async fn test_cancel_cascades_to_bookings() {
        let (store, service) = service();
        let trip = service.create_trip("driver-1", draft(4)).await.unwrap();
        seed_booking(&store, &trip, "pax-1", 2).await;
        let trip_now = store.get_trip(trip.id).await.unwrap().unwrap();
        seed_booking(&store, &trip_now, "pax-2", 1).await;

        let cancelled = service.cancel_trip(trip.id, "driver-1").await.unwrap();
        assert_eq!(cancelled.status, TripStatus::Cancelled);
        assert_eq!(cancelled.available_seats, 4);

        for booking in store.all_bookings().await {
            assert_eq!(booking.status, BookingStatus::Cancelled);
            assert!(booking.cancelled_at.is_some());
        }
        assert!(store
            .list_active_bookings(trip.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_edit_after_departure_rejected() {
        let (store, service) = service();
        let trip = service.create_trip("driver-1", draft(3)).await.unwrap();

        let mut departed = store.get_trip(trip.id).await.unwrap().unwrap();
        departed.departure_at = Utc::now() - Duration::minutes(5);
        store
            .commit_atomic(vec![StoreOp::UpdateTrip(departed)])
            .await
            .unwrap();

        let err = service
            .update_trip(trip.id, "driver-1", TripChanges::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TripServiceError::Lifecycle(LifecycleError::AlreadyDeparted)
        ));
    }

    #[tokio::test]
    async fn test_trip_bookings_visible_to_driver_only() {
        let (store, service) = service();
        let trip = service.create_trip("driver-1", draft(4)).await.unwrap();
        seed_booking(&store, &trip, "pax-1", 2).await;

        let listed = service.list_trip_bookings(trip.id, "driver-1").await.unwrap();
        assert_eq!(listed.len(), 1);

        assert!(matches!(
            service.list_trip_bookings(trip.id, "pax-1").await,
            Err(TripServiceError::Forbidden)
        ));
    }
}
