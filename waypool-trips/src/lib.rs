pub mod ledger;
pub mod lifecycle;
pub mod reconciler;
pub mod service;

pub use reconciler::{StatusReconciler, SweepOutcome};
pub use service::{TripChanges, TripService, TripServiceError};
