pub mod booking;
pub mod trip;

/// Seats per trip and per booking are bounded the same way the mobile client
/// bounds them, so a malformed payload is rejected before any store access.
pub const MAX_SEATS: i32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    #[error("Seat count must be between 1 and {MAX_SEATS}, got {0}")]
    SeatCountOutOfRange(i32),

    #[error("Price per seat must be positive, got {0}")]
    NonPositivePrice(i64),

    #[error("Departure must be in the future")]
    DepartureInPast,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}
