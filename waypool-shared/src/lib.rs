pub mod models;

pub use models::booking::{Booking, BookingDraft, BookingStatus};
pub use models::trip::{CompletionCause, Trip, TripDraft, TripStatus};
pub use models::DraftError;
