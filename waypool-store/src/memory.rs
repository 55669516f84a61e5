use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use waypool_core::{EntityStore, StoreError, StoreOp, TripFilter};
use waypool_shared::{Booking, Trip, TripStatus};

/// In-memory entity store. Backs the test suites and local development; the
/// mutex serializes commits, and the version check gives it the same
/// conflict semantics as the Postgres store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    trips: HashMap<Uuid, Trip>,
    bookings: HashMap<Uuid, Booking>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all_trips(&self) -> Vec<Trip> {
        self.inner.lock().await.trips.values().cloned().collect()
    }

    pub async fn all_bookings(&self) -> Vec<Booking> {
        self.inner.lock().await.bookings.values().cloned().collect()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn get_trip(&self, id: Uuid) -> Result<Option<Trip>, StoreError> {
        Ok(self.inner.lock().await.trips.get(&id).cloned())
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        Ok(self.inner.lock().await.bookings.get(&id).cloned())
    }

    async fn list_active_bookings(&self, trip_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .bookings
            .values()
            .filter(|b| b.trip_id == trip_id && b.is_active())
            .cloned()
            .collect())
    }

    async fn list_bookings_for_passenger(
        &self,
        passenger_id: &str,
    ) -> Result<Vec<Booking>, StoreError> {
        let inner = self.inner.lock().await;
        let mut bookings: Vec<Booking> = inner
            .bookings
            .values()
            .filter(|b| b.passenger_id == passenger_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn list_trips_for_driver(&self, driver_id: &str) -> Result<Vec<Trip>, StoreError> {
        let inner = self.inner.lock().await;
        let mut trips: Vec<Trip> = inner
            .trips
            .values()
            .filter(|t| t.driver_id == driver_id)
            .cloned()
            .collect();
        trips.sort_by(|a, b| b.departure_at.cmp(&a.departure_at));
        Ok(trips)
    }

    async fn list_trips_departing_before(
        &self,
        status: TripStatus,
        before: DateTime<Utc>,
    ) -> Result<Vec<Trip>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .trips
            .values()
            .filter(|t| t.status == status && t.departure_at <= before)
            .cloned()
            .collect())
    }

    async fn search_trips(&self, filter: &TripFilter) -> Result<Vec<Trip>, StoreError> {
        let inner = self.inner.lock().await;
        let min_seats = filter.min_seats.max(1);
        let mut trips: Vec<Trip> = inner
            .trips
            .values()
            .filter(|t| t.status == TripStatus::Active && t.available_seats >= min_seats)
            .filter(|t| match &filter.origin {
                Some(origin) => t.origin.to_lowercase().contains(&origin.to_lowercase()),
                None => true,
            })
            .filter(|t| match &filter.destination {
                Some(dest) => t.destination.to_lowercase().contains(&dest.to_lowercase()),
                None => true,
            })
            .filter(|t| match filter.date {
                Some(date) => t.departure_at.date_naive() == date,
                None => true,
            })
            .filter(|t| match filter.max_price {
                Some(max) => t.price_per_seat <= max,
                None => true,
            })
            .cloned()
            .collect();
        trips.sort_by(|a, b| {
            a.departure_at
                .cmp(&b.departure_at)
                .then(a.price_per_seat.cmp(&b.price_per_seat))
        });
        Ok(trips)
    }

    async fn insert_trip(&self, trip: &Trip) -> Result<(), StoreError> {
        self.inner
            .lock()
            .await
            .trips
            .insert(trip.id, trip.clone());
        Ok(())
    }

    async fn commit_atomic(&self, ops: Vec<StoreOp>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;

        // Validate everything before writing anything, so a failed commit
        // leaves no partial state behind.
        for op in &ops {
            match op {
                StoreOp::UpdateTrip(trip) => {
                    let current = inner
                        .trips
                        .get(&trip.id)
                        .ok_or(StoreError::NotFound(trip.id))?;
                    if current.version != trip.version {
                        return Err(StoreError::VersionConflict(trip.id));
                    }
                }
                StoreOp::UpdateBooking(booking) => {
                    if !inner.bookings.contains_key(&booking.id) {
                        return Err(StoreError::NotFound(booking.id));
                    }
                }
                StoreOp::InsertBooking(_) => {}
            }
        }

        for op in ops {
            match op {
                StoreOp::UpdateTrip(mut trip) => {
                    trip.version += 1;
                    inner.trips.insert(trip.id, trip);
                }
                StoreOp::InsertBooking(booking) | StoreOp::UpdateBooking(booking) => {
                    inner.bookings.insert(booking.id, booking);
                }
            }
        }
        Ok(())
    }
}
