use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DraftError, MAX_SEATS};
use crate::models::trip::Trip;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Active,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Active => "ACTIVE",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }
}

/// A passenger's reservation of one or more seats on a trip.
///
/// `price_per_seat` is the price at booking time; later trip price edits do
/// not touch it. Bookings are never deleted, a cancelled one keeps its row
/// with `cancelled_at` set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub passenger_id: String,
    pub seats: i32,
    pub price_per_seat: i64,
    pub notes: Option<String>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn is_active(&self) -> bool {
        self.status == BookingStatus::Active
    }

    pub fn cancel(&mut self) {
        self.status = BookingStatus::Cancelled;
        self.cancelled_at = Some(Utc::now());
    }
}

/// Validated input for reserving seats on a trip.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingDraft {
    pub trip_id: Uuid,
    pub seats: i32,
    pub notes: Option<String>,
}

impl BookingDraft {
    pub fn validate(&self) -> Result<(), DraftError> {
        if self.seats < 1 || self.seats > MAX_SEATS {
            return Err(DraftError::SeatCountOutOfRange(self.seats));
        }
        Ok(())
    }

    /// Build the booking this draft describes, snapshotting the trip's
    /// current price.
    pub fn into_booking(self, trip: &Trip, passenger_id: String) -> Result<Booking, DraftError> {
        self.validate()?;
        Ok(Booking {
            id: Uuid::new_v4(),
            trip_id: self.trip_id,
            passenger_id,
            seats: self.seats,
            price_per_seat: trip.price_per_seat,
            notes: self.notes,
            status: BookingStatus::Active,
            created_at: Utc::now(),
            cancelled_at: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::trip::TripDraft;
    use chrono::Duration;

    fn trip() -> Trip {
        TripDraft {
            origin: "Kazan".to_string(),
            destination: "Samara".to_string(),
            departure_at: Utc::now() + Duration::hours(4),
            arrival_estimate: None,
            route_duration_min: None,
            seats_offered: 3,
            price_per_seat: 1500,
            comment: None,
        }
        .into_trip("driver-1".to_string())
        .unwrap()
    }

    #[test]
    fn test_booking_snapshots_trip_price() {
        let mut trip = trip();
        let draft = BookingDraft {
            trip_id: trip.id,
            seats: 2,
            notes: None,
        };
        let booking = draft.into_booking(&trip, "pax-1".to_string()).unwrap();
        assert_eq!(booking.price_per_seat, 1500);

        // A later price edit must not float the snapshot.
        trip.price_per_seat = 2000;
        assert_eq!(booking.price_per_seat, 1500);
    }

    #[test]
    fn test_booking_draft_rejects_zero_seats() {
        let trip = trip();
        let draft = BookingDraft {
            trip_id: trip.id,
            seats: 0,
            notes: None,
        };
        assert!(draft.into_booking(&trip, "pax-1".to_string()).is_err());
    }

    #[test]
    fn test_cancel_stamps_timestamp() {
        let trip = trip();
        let mut booking = BookingDraft {
            trip_id: trip.id,
            seats: 1,
            notes: None,
        }
        .into_booking(&trip, "pax-1".to_string())
        .unwrap();

        assert!(booking.is_active());
        booking.cancel();
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert!(booking.cancelled_at.is_some());
    }
}
