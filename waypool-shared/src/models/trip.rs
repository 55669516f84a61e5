use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DraftError, MAX_SEATS};

/// Trip status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripStatus {
    Active,
    InProgress,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Active => "ACTIVE",
            TripStatus::InProgress => "IN_PROGRESS",
            TripStatus::Completed => "COMPLETED",
            TripStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Why a trip carries COMPLETED. A fully booked trip shares the status with a
/// trip whose travel time elapsed; only the former may reopen when seats free
/// up again.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletionCause {
    FullyBooked,
    Elapsed,
}

/// A driver-published journey with a fixed seat capacity and price.
///
/// `available_seats` is the single piece of shared mutable state in the
/// system; only the reservation engine and trip service move it, and every
/// committed write bumps `version` so concurrent writers are detected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub driver_id: String,
    pub origin: String,
    pub destination: String,
    pub departure_at: DateTime<Utc>,
    pub arrival_estimate: Option<DateTime<Utc>>,
    pub route_duration_min: Option<i64>,
    pub seats_offered: i32,
    pub available_seats: i32,
    pub price_per_seat: i64,
    pub comment: Option<String>,
    pub status: TripStatus,
    pub completion: Option<CompletionCause>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    /// Reserved seats are derived, never stored: `seats_offered` minus what
    /// is still available must equal the sum over active bookings.
    pub fn reserved_seats(&self) -> i32 {
        self.seats_offered - self.available_seats
    }

    pub fn is_fully_booked(&self) -> bool {
        self.available_seats == 0
    }

    /// When this trip should be considered over: the explicit estimate if the
    /// driver gave one, else departure plus route duration, else departure
    /// plus `default_window_min`.
    pub fn arrival_or_default(&self, default_window_min: i64) -> DateTime<Utc> {
        if let Some(arrival) = self.arrival_estimate {
            return arrival;
        }
        let window = self.route_duration_min.unwrap_or(default_window_min);
        self.departure_at + Duration::minutes(window)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Validated input for publishing a trip. Field checks happen here, at the
/// boundary, so the services only ever see well-formed values.
#[derive(Debug, Clone, Deserialize)]
pub struct TripDraft {
    pub origin: String,
    pub destination: String,
    pub departure_at: DateTime<Utc>,
    pub arrival_estimate: Option<DateTime<Utc>>,
    pub route_duration_min: Option<i64>,
    pub seats_offered: i32,
    pub price_per_seat: i64,
    pub comment: Option<String>,
}

impl TripDraft {
    pub fn validate(&self) -> Result<(), DraftError> {
        if self.origin.trim().is_empty() {
            return Err(DraftError::MissingField("origin"));
        }
        if self.destination.trim().is_empty() {
            return Err(DraftError::MissingField("destination"));
        }
        if self.seats_offered < 1 || self.seats_offered > MAX_SEATS {
            return Err(DraftError::SeatCountOutOfRange(self.seats_offered));
        }
        if self.price_per_seat <= 0 {
            return Err(DraftError::NonPositivePrice(self.price_per_seat));
        }
        if self.departure_at <= Utc::now() {
            return Err(DraftError::DepartureInPast);
        }
        Ok(())
    }

    /// Build the trip a validated draft describes. A new trip is ACTIVE with
    /// every offered seat still available.
    pub fn into_trip(self, driver_id: String) -> Result<Trip, DraftError> {
        self.validate()?;
        let now = Utc::now();
        Ok(Trip {
            id: Uuid::new_v4(),
            driver_id,
            origin: self.origin,
            destination: self.destination,
            departure_at: self.departure_at,
            arrival_estimate: self.arrival_estimate,
            route_duration_min: self.route_duration_min,
            seats_offered: self.seats_offered,
            available_seats: self.seats_offered,
            price_per_seat: self.price_per_seat,
            comment: self.comment,
            status: TripStatus::Active,
            completion: None,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }
}
