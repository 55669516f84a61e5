pub mod engine;

pub use engine::{EngineError, ReservationEngine};
