use std::sync::Arc;

use waypool_bookings::ReservationEngine;
use waypool_core::{EntityStore, IdentityResolver, OpaqueIdentity};
use waypool_trips::{StatusReconciler, TripService};

#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<dyn IdentityResolver>,
    pub trips: Arc<TripService>,
    pub engine: Arc<ReservationEngine>,
    pub reconciler: Arc<StatusReconciler>,
}

impl AppState {
    pub fn new(store: Arc<dyn EntityStore>, default_window_min: i64) -> Self {
        Self {
            identity: Arc::new(OpaqueIdentity),
            trips: Arc::new(TripService::new(store.clone())),
            engine: Arc::new(ReservationEngine::new(store.clone())),
            reconciler: Arc::new(StatusReconciler::new(store, default_window_min)),
        }
    }
}
