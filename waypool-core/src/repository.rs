use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use waypool_shared::{Booking, Trip, TripStatus};

/// One write the store must apply as part of an atomic commit.
///
/// `UpdateTrip` carries the trip exactly as the caller read it (same
/// `version`); the store persists it with `version + 1` only if the stored
/// version still matches, otherwise the whole commit fails with
/// `StoreError::VersionConflict` and nothing is written.
#[derive(Debug, Clone)]
pub enum StoreOp {
    UpdateTrip(Trip),
    InsertBooking(Booking),
    UpdateBooking(Booking),
}

/// Search filter for the trip listing. City extraction is somebody else's
/// job; origin/destination match as plain substrings of the stored text.
#[derive(Debug, Clone, Default)]
pub struct TripFilter {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub date: Option<NaiveDate>,
    pub min_seats: i32,
    pub max_price: Option<i64>,
}

/// Durable storage for trips and bookings.
///
/// Single-record reads plus one transactional multi-record commit. The trait
/// is the seam between the reservation core and whatever actually holds the
/// rows (Postgres in production, a mutex-guarded map in tests).
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get_trip(&self, id: Uuid) -> Result<Option<Trip>, StoreError>;

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError>;

    async fn list_active_bookings(&self, trip_id: Uuid) -> Result<Vec<Booking>, StoreError>;

    async fn list_bookings_for_passenger(
        &self,
        passenger_id: &str,
    ) -> Result<Vec<Booking>, StoreError>;

    async fn list_trips_for_driver(&self, driver_id: &str) -> Result<Vec<Trip>, StoreError>;

    /// Trips in `status` whose departure is at or before `before`. The sweep
    /// narrows by computed arrival itself, departure is the only timestamp
    /// the store needs to index.
    async fn list_trips_departing_before(
        &self,
        status: TripStatus,
        before: DateTime<Utc>,
    ) -> Result<Vec<Trip>, StoreError>;

    async fn search_trips(&self, filter: &TripFilter) -> Result<Vec<Trip>, StoreError>;

    async fn insert_trip(&self, trip: &Trip) -> Result<(), StoreError>;

    /// Apply every op in one transaction, or none of them.
    async fn commit_atomic(&self, ops: Vec<StoreOp>) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Version conflict on trip {0}")]
    VersionConflict(Uuid),

    #[error("Record not found: {0}")]
    NotFound(Uuid),

    #[error("Malformed record: {0}")]
    Decode(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Conflicts and outages are worth another attempt; a missing or
    /// undecodable record is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::VersionConflict(_) | StoreError::Unavailable(_)
        )
    }
}
