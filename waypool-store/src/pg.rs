use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use waypool_core::{EntityStore, StoreError, StoreOp, TripFilter};
use waypool_shared::{Booking, BookingStatus, CompletionCause, Trip, TripStatus};

/// Postgres-backed entity store. Status enums travel as their
/// SCREAMING_SNAKE_CASE text; the per-trip `version` column carries the
/// optimistic concurrency check inside `commit_atomic`.
pub struct PgEntityStore {
    pool: PgPool,
}

impl PgEntityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TripRow {
    id: Uuid,
    driver_id: String,
    origin: String,
    destination: String,
    departure_at: DateTime<Utc>,
    arrival_estimate: Option<DateTime<Utc>>,
    route_duration_min: Option<i64>,
    seats_offered: i32,
    available_seats: i32,
    price_per_seat: i64,
    comment: Option<String>,
    status: String,
    completion: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    trip_id: Uuid,
    passenger_id: String,
    seats: i32,
    price_per_seat: i64,
    notes: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    cancelled_at: Option<DateTime<Utc>>,
}

const TRIP_COLUMNS: &str = "id, driver_id, origin, destination, departure_at, arrival_estimate, \
     route_duration_min, seats_offered, available_seats, price_per_seat, comment, status, \
     completion, version, created_at, updated_at";

const BOOKING_COLUMNS: &str =
    "id, trip_id, passenger_id, seats, price_per_seat, notes, status, created_at, cancelled_at";

impl TryFrom<TripRow> for Trip {
    type Error = StoreError;

    fn try_from(row: TripRow) -> Result<Self, StoreError> {
        Ok(Trip {
            id: row.id,
            driver_id: row.driver_id,
            origin: row.origin,
            destination: row.destination,
            departure_at: row.departure_at,
            arrival_estimate: row.arrival_estimate,
            route_duration_min: row.route_duration_min,
            seats_offered: row.seats_offered,
            available_seats: row.available_seats,
            price_per_seat: row.price_per_seat,
            comment: row.comment,
            status: trip_status_from(&row.status)?,
            completion: row.completion.as_deref().map(completion_from).transpose()?,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, StoreError> {
        Ok(Booking {
            id: row.id,
            trip_id: row.trip_id,
            passenger_id: row.passenger_id,
            seats: row.seats,
            price_per_seat: row.price_per_seat,
            notes: row.notes,
            status: booking_status_from(&row.status)?,
            created_at: row.created_at,
            cancelled_at: row.cancelled_at,
        })
    }
}

fn trip_status_from(s: &str) -> Result<TripStatus, StoreError> {
    match s {
        "ACTIVE" => Ok(TripStatus::Active),
        "IN_PROGRESS" => Ok(TripStatus::InProgress),
        "COMPLETED" => Ok(TripStatus::Completed),
        "CANCELLED" => Ok(TripStatus::Cancelled),
        other => Err(StoreError::Decode(format!("unknown trip status {other}"))),
    }
}

fn booking_status_from(s: &str) -> Result<BookingStatus, StoreError> {
    match s {
        "ACTIVE" => Ok(BookingStatus::Active),
        "CANCELLED" => Ok(BookingStatus::Cancelled),
        other => Err(StoreError::Decode(format!("unknown booking status {other}"))),
    }
}

fn completion_from(s: &str) -> Result<CompletionCause, StoreError> {
    match s {
        "FULLY_BOOKED" => Ok(CompletionCause::FullyBooked),
        "ELAPSED" => Ok(CompletionCause::Elapsed),
        other => Err(StoreError::Decode(format!("unknown completion cause {other}"))),
    }
}

fn completion_str(c: Option<CompletionCause>) -> Option<&'static str> {
    c.map(|c| match c {
        CompletionCause::FullyBooked => "FULLY_BOOKED",
        CompletionCause::Elapsed => "ELAPSED",
    })
}

fn db_err(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Decode(e.to_string())
        }
        other => StoreError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn get_trip(&self, id: Uuid) -> Result<Option<Trip>, StoreError> {
        let row: Option<TripRow> =
            sqlx::query_as(&format!("SELECT {TRIP_COLUMNS} FROM trips WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(Trip::try_from).transpose()
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let row: Option<BookingRow> = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(Booking::try_from).transpose()
    }

    async fn list_active_bookings(&self, trip_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE trip_id = $1 AND status = 'ACTIVE'"
        ))
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn list_bookings_for_passenger(
        &self,
        passenger_id: &str,
    ) -> Result<Vec<Booking>, StoreError> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE passenger_id = $1 ORDER BY created_at DESC"
        ))
        .bind(passenger_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn list_trips_for_driver(&self, driver_id: &str) -> Result<Vec<Trip>, StoreError> {
        let rows: Vec<TripRow> = sqlx::query_as(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE driver_id = $1 ORDER BY departure_at DESC"
        ))
        .bind(driver_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(Trip::try_from).collect()
    }

    async fn list_trips_departing_before(
        &self,
        status: TripStatus,
        before: DateTime<Utc>,
    ) -> Result<Vec<Trip>, StoreError> {
        let rows: Vec<TripRow> = sqlx::query_as(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE status = $1 AND departure_at <= $2"
        ))
        .bind(status.as_str())
        .bind(before)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(Trip::try_from).collect()
    }

    async fn search_trips(&self, filter: &TripFilter) -> Result<Vec<Trip>, StoreError> {
        let rows: Vec<TripRow> = sqlx::query_as(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips \
             WHERE status = 'ACTIVE' \
               AND available_seats >= $1 \
               AND ($2::text IS NULL OR origin ILIKE '%' || $2 || '%') \
               AND ($3::text IS NULL OR destination ILIKE '%' || $3 || '%') \
               AND ($4::date IS NULL OR (departure_at AT TIME ZONE 'UTC')::date = $4) \
               AND ($5::bigint IS NULL OR price_per_seat <= $5) \
             ORDER BY departure_at, price_per_seat"
        ))
        .bind(filter.min_seats.max(1))
        .bind(filter.origin.as_deref())
        .bind(filter.destination.as_deref())
        .bind(filter.date)
        .bind(filter.max_price)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(Trip::try_from).collect()
    }

    async fn insert_trip(&self, trip: &Trip) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO trips (id, driver_id, origin, destination, departure_at, \
             arrival_estimate, route_duration_min, seats_offered, available_seats, \
             price_per_seat, comment, status, completion, version, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(trip.id)
        .bind(&trip.driver_id)
        .bind(&trip.origin)
        .bind(&trip.destination)
        .bind(trip.departure_at)
        .bind(trip.arrival_estimate)
        .bind(trip.route_duration_min)
        .bind(trip.seats_offered)
        .bind(trip.available_seats)
        .bind(trip.price_per_seat)
        .bind(&trip.comment)
        .bind(trip.status.as_str())
        .bind(completion_str(trip.completion))
        .bind(trip.version)
        .bind(trip.created_at)
        .bind(trip.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn commit_atomic(&self, ops: Vec<StoreOp>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        for op in &ops {
            match op {
                StoreOp::UpdateTrip(trip) => {
                    let result = sqlx::query(
                        "UPDATE trips SET origin = $1, destination = $2, departure_at = $3, \
                         arrival_estimate = $4, route_duration_min = $5, seats_offered = $6, \
                         available_seats = $7, price_per_seat = $8, comment = $9, status = $10, \
                         completion = $11, updated_at = $12, version = version + 1 \
                         WHERE id = $13 AND version = $14",
                    )
                    .bind(&trip.origin)
                    .bind(&trip.destination)
                    .bind(trip.departure_at)
                    .bind(trip.arrival_estimate)
                    .bind(trip.route_duration_min)
                    .bind(trip.seats_offered)
                    .bind(trip.available_seats)
                    .bind(trip.price_per_seat)
                    .bind(&trip.comment)
                    .bind(trip.status.as_str())
                    .bind(completion_str(trip.completion))
                    .bind(trip.updated_at)
                    .bind(trip.id)
                    .bind(trip.version)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;

                    if result.rows_affected() == 0 {
                        // Dropping the transaction rolls every prior op back.
                        let exists: Option<(i64,)> =
                            sqlx::query_as("SELECT 1::bigint FROM trips WHERE id = $1")
                                .bind(trip.id)
                                .fetch_optional(&mut *tx)
                                .await
                                .map_err(db_err)?;
                        return Err(if exists.is_some() {
                            StoreError::VersionConflict(trip.id)
                        } else {
                            StoreError::NotFound(trip.id)
                        });
                    }
                }
                StoreOp::InsertBooking(booking) => {
                    sqlx::query(
                        "INSERT INTO bookings (id, trip_id, passenger_id, seats, price_per_seat, \
                         notes, status, created_at, cancelled_at) \
                         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
                    )
                    .bind(booking.id)
                    .bind(booking.trip_id)
                    .bind(&booking.passenger_id)
                    .bind(booking.seats)
                    .bind(booking.price_per_seat)
                    .bind(&booking.notes)
                    .bind(booking.status.as_str())
                    .bind(booking.created_at)
                    .bind(booking.cancelled_at)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                }
                StoreOp::UpdateBooking(booking) => {
                    let result = sqlx::query(
                        "UPDATE bookings SET seats = $1, notes = $2, status = $3, \
                         cancelled_at = $4 WHERE id = $5",
                    )
                    .bind(booking.seats)
                    .bind(&booking.notes)
                    .bind(booking.status.as_str())
                    .bind(booking.cancelled_at)
                    .bind(booking.id)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;

                    if result.rows_affected() == 0 {
                        return Err(StoreError::NotFound(booking.id));
                    }
                }
            }
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }
}
