use chrono::{DateTime, Utc};
use waypool_shared::{CompletionCause, Trip, TripStatus};

/// Legal trip status transitions. Every mutation of `Trip::status` in the
/// system goes through one of these guards; an illegal attempt is a typed
/// error, never a silent no-op.

/// Active -> InProgress. Wall-clock trigger, performed by the reconciler.
pub fn depart(trip: &mut Trip) -> Result<(), LifecycleError> {
    if trip.status != TripStatus::Active {
        return Err(invalid(trip, TripStatus::InProgress));
    }
    trip.status = TripStatus::InProgress;
    trip.touch();
    Ok(())
}

/// InProgress -> Completed. Wall-clock trigger, performed by the reconciler.
pub fn complete_by_time(trip: &mut Trip) -> Result<(), LifecycleError> {
    if trip.status != TripStatus::InProgress {
        return Err(invalid(trip, TripStatus::Completed));
    }
    trip.status = TripStatus::Completed;
    trip.completion = Some(CompletionCause::Elapsed);
    trip.touch();
    Ok(())
}

/// Active -> Completed when the last seat goes. A business-rule shortcut,
/// not an arrival: the cause is recorded so the trip can reopen.
pub fn complete_by_full_booking(trip: &mut Trip) -> Result<(), LifecycleError> {
    if trip.status != TripStatus::Active {
        return Err(invalid(trip, TripStatus::Completed));
    }
    trip.status = TripStatus::Completed;
    trip.completion = Some(CompletionCause::FullyBooked);
    trip.touch();
    Ok(())
}

/// Completed -> Active, only for a trip that completed by filling up. A trip
/// whose travel time elapsed stays completed no matter what seats free up.
pub fn reopen(trip: &mut Trip) -> Result<(), LifecycleError> {
    if trip.status != TripStatus::Completed
        || trip.completion != Some(CompletionCause::FullyBooked)
    {
        return Err(invalid(trip, TripStatus::Active));
    }
    trip.status = TripStatus::Active;
    trip.completion = None;
    trip.touch();
    Ok(())
}

/// Active | InProgress -> Cancelled. Driver-initiated; the booking cascade
/// is the caller's job.
pub fn cancel(trip: &mut Trip) -> Result<(), LifecycleError> {
    if !matches!(trip.status, TripStatus::Active | TripStatus::InProgress) {
        return Err(invalid(trip, TripStatus::Cancelled));
    }
    trip.status = TripStatus::Cancelled;
    trip.touch();
    Ok(())
}

pub fn is_terminal(status: TripStatus) -> bool {
    matches!(status, TripStatus::Completed | TripStatus::Cancelled)
}

/// Driver edits are allowed only on an active trip that has not departed.
pub fn ensure_editable(trip: &Trip, now: DateTime<Utc>) -> Result<(), LifecycleError> {
    if trip.status != TripStatus::Active {
        return Err(LifecycleError::NotEditable {
            status: trip.status.as_str(),
        });
    }
    if trip.departure_at <= now {
        return Err(LifecycleError::AlreadyDeparted);
    }
    Ok(())
}

fn invalid(trip: &Trip, to: TripStatus) -> LifecycleError {
    LifecycleError::InvalidTransition {
        from: trip.status.as_str(),
        to: to.as_str(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("Trip is not editable in status {status}")]
    NotEditable { status: &'static str },

    #[error("Trip has already departed")]
    AlreadyDeparted,
}

impl waypool_core::Categorized for LifecycleError {
    fn category(&self) -> waypool_core::ErrorCategory {
        waypool_core::ErrorCategory::InvalidState
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use waypool_shared::TripDraft;

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
    fn test_time_driven_lifecycle() {
        let mut trip = trip();

        depart(&mut trip).unwrap();
        assert_eq!(trip.status, TripStatus::InProgress);

        complete_by_time(&mut trip).unwrap();
        assert_eq!(trip.status, TripStatus::Completed);
        assert_eq!(trip.completion, Some(CompletionCause::Elapsed));

        // Terminal: no further transitions.
        assert!(depart(&mut trip).is_err());
        assert!(cancel(&mut trip).is_err());
        assert!(reopen(&mut trip).is_err());
    }

    #[test]
    fn test_full_booking_completes_and_reopens() {
        let mut trip = trip();

        complete_by_full_booking(&mut trip).unwrap();
        assert_eq!(trip.status, TripStatus::Completed);
        assert_eq!(trip.completion, Some(CompletionCause::FullyBooked));

        reopen(&mut trip).unwrap();
        assert_eq!(trip.status, TripStatus::Active);
        assert_eq!(trip.completion, None);
    }

    #[test]
    fn test_elapsed_trip_never_reopens() {
        let mut trip = trip();
        depart(&mut trip).unwrap();
        complete_by_time(&mut trip).unwrap();

        let err = reopen(&mut trip).unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
    }

    #[test]
    fn test_cancel_from_active_and_in_progress() {
        let mut active = trip();
        cancel(&mut active).unwrap();
        assert_eq!(active.status, TripStatus::Cancelled);

        let mut in_progress = trip();
        depart(&mut in_progress).unwrap();
        cancel(&mut in_progress).unwrap();
        assert_eq!(in_progress.status, TripStatus::Cancelled);

        // Cancelled is terminal.
        assert!(cancel(&mut active).is_err());
    }

    #[test]
    fn test_editable_window() {
        let mut trip = trip();
        assert!(ensure_editable(&trip, Utc::now()).is_ok());

        // Past departure.
        assert!(matches!(
            ensure_editable(&trip, trip.departure_at + Duration::seconds(1)),
            Err(LifecycleError::AlreadyDeparted)
        ));

        cancel(&mut trip).unwrap();
        assert!(matches!(
            ensure_editable(&trip, Utc::now()),
            Err(LifecycleError::NotEditable { .. })
        ));
    }
}
