pub mod error;
pub mod identity;
pub mod repository;

pub use error::{Categorized, ErrorCategory};
pub use identity::{IdentityError, IdentityResolver, OpaqueIdentity};
pub use repository::{EntityStore, StoreError, StoreOp, TripFilter};
