use waypool_shared::Trip;

/// Seat arithmetic for a trip. Pure functions, no store access; the only
/// code allowed to reason about seat capacity.

/// Check a reservation against current availability and return the new
/// available count. `InsufficientSeats` is a normal outcome, not a defect.
pub fn reserve(trip: &Trip, requested: i32) -> Result<i32, LedgerError> {
    if requested < 1 {
        return Err(LedgerError::InvalidSeatCount(requested));
    }
    if requested > trip.available_seats {
        return Err(LedgerError::InsufficientSeats {
            requested,
            available: trip.available_seats,
        });
    }
    Ok(trip.available_seats - requested)
}

/// Return seats to the pool, clamped at `seats_offered` so a replayed
/// cancellation cannot push availability past capacity.
pub fn release(trip: &Trip, seats: i32) -> i32 {
    (trip.available_seats + seats.max(0)).min(trip.seats_offered)
}

/// New available count after the driver resizes total capacity. Cannot
/// shrink below what passengers already hold.
pub fn resize(trip: &Trip, new_total: i32) -> Result<i32, LedgerError> {
    let reserved = trip.reserved_seats();
    if new_total < reserved {
        return Err(LedgerError::BelowReservedFloor {
            requested: new_total,
            reserved,
        });
    }
    Ok(new_total - reserved)
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Seat count must be at least 1, got {0}")]
    InvalidSeatCount(i32),

    #[error("Insufficient seats: requested {requested}, available {available}")]
    InsufficientSeats { requested: i32, available: i32 },

    #[error("Cannot shrink to {requested} seats, {reserved} already reserved")]
    BelowReservedFloor { requested: i32, reserved: i32 },
}

impl waypool_core::Categorized for LedgerError {
    fn category(&self) -> waypool_core::ErrorCategory {
        match self {
            LedgerError::InvalidSeatCount(_) => waypool_core::ErrorCategory::Validation,
            LedgerError::InsufficientSeats { .. } | LedgerError::BelowReservedFloor { .. } => {
                waypool_core::ErrorCategory::Conflict
            }
        }
    }
}
