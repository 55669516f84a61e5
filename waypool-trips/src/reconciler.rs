use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use waypool_core::{EntityStore, StoreError, StoreOp};
use waypool_shared::{Trip, TripStatus};

use crate::lifecycle;

/// What one sweep did. `failed` counts trips skipped after a commit failure;
/// the next sweep picks them up again.
#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct SweepOutcome {
    pub departed: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Advances trip status with wall-clock time: ACTIVE trips whose departure
/// passed become IN_PROGRESS, IN_PROGRESS trips past their arrival estimate
/// become COMPLETED. Runs on a fixed interval, and is the only component
/// that mutates state without an external trigger.
///
/// Every transition is guarded on current status, so a sweep killed half way
/// through and restarted converges to the same end state.
pub struct StatusReconciler {
    store: Arc<dyn EntityStore>,
    default_window_min: i64,
}

impl StatusReconciler {
    pub fn new(store: Arc<dyn EntityStore>, default_window_min: i64) -> Self {
        Self {
            store,
            default_window_min,
        }
    }

    pub async fn run_sweep(&self) -> SweepOutcome {
        self.run_sweep_at(Utc::now()).await
    }

    /// Deterministic sweep against an explicit clock reading.
    pub async fn run_sweep_at(&self, now: DateTime<Utc>) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();

        self.advance(
            TripStatus::Active,
            now,
            |trip| lifecycle::depart(trip),
            &mut outcome.departed,
            &mut outcome.failed,
        )
        .await;

        self.advance(
            TripStatus::InProgress,
            now,
            |trip| lifecycle::complete_by_time(trip),
            &mut outcome.completed,
            &mut outcome.failed,
        )
        .await;

        if outcome.departed > 0 || outcome.completed > 0 || outcome.failed > 0 {
            info!(
                departed = outcome.departed,
                completed = outcome.completed,
                failed = outcome.failed,
                "status sweep finished"
            );
        }
        outcome
    }

    /// One sweep phase: scan trips in `status` that are due at `now`, apply
    /// the transition, commit the batch as one transaction. If the batch
    /// conflicts with a concurrent writer, fall back to per-trip commits so
    /// one contended trip cannot starve the rest.
    async fn advance<F>(
        &self,
        status: TripStatus,
        now: DateTime<Utc>,
        transition: F,
        advanced: &mut usize,
        failed: &mut usize,
    ) where
        F: Fn(&mut Trip) -> Result<(), lifecycle::LifecycleError>,
    {
        let candidates = match self.store.list_trips_departing_before(status, now).await {
            Ok(trips) => trips,
            Err(e) => {
                error!(status = status.as_str(), "sweep scan failed: {e}");
                return;
            }
        };

        let mut batch = Vec::new();
        for mut trip in candidates {
            if !self.is_due(&trip, now) {
                continue;
            }
            match transition(&mut trip) {
                Ok(()) => batch.push(trip),
                // Something else moved the trip between scan and here;
                // idempotence means there is nothing left to do.
                Err(e) => warn!(trip_id = %trip.id, "sweep skipped trip: {e}"),
            }
        }
        if batch.is_empty() {
            return;
        }

        let ops: Vec<StoreOp> = batch.iter().cloned().map(StoreOp::UpdateTrip).collect();
        match self.store.commit_atomic(ops).await {
            Ok(()) => *advanced += batch.len(),
            Err(StoreError::VersionConflict(_)) => {
                warn!(
                    status = status.as_str(),
                    batch = batch.len(),
                    "sweep batch conflicted, retrying per trip"
                );
                for trip in &batch {
                    match self.retry_single(trip.id, now, &transition).await {
                        Ok(true) => *advanced += 1,
                        Ok(false) => {}
                        Err(e) => {
                            error!(trip_id = %trip.id, "sweep transition failed: {e}");
                            *failed += 1;
                        }
                    }
                }
            }
            Err(e) => {
                error!(status = status.as_str(), "sweep batch commit failed: {e}");
                *failed += batch.len();
            }
        }
    }

    /// Re-read one trip and re-apply the transition against fresh state.
    /// Returns Ok(false) when the trip no longer needs advancing.
    async fn retry_single<F>(
        &self,
        trip_id: uuid::Uuid,
        now: DateTime<Utc>,
        transition: &F,
    ) -> Result<bool, StoreError>
    where
        F: Fn(&mut Trip) -> Result<(), lifecycle::LifecycleError>,
    {
        let Some(mut trip) = self.store.get_trip(trip_id).await? else {
            return Ok(false);
        };
        if !self.is_due(&trip, now) || transition(&mut trip).is_err() {
            return Ok(false);
        }
        self.store
            .commit_atomic(vec![StoreOp::UpdateTrip(trip)])
            .await?;
        Ok(true)
    }

    fn is_due(&self, trip: &Trip, now: DateTime<Utc>) -> bool {
        match trip.status {
            TripStatus::Active => trip.departure_at <= now,
            TripStatus::InProgress => trip.arrival_or_default(self.default_window_min) <= now,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use waypool_shared::TripDraft;
    use waypool_store::MemoryStore;

    const WINDOW_MIN: i64 = 360;

    fn setup() -> (Arc<MemoryStore>, StatusReconciler) {
        let store = Arc::new(MemoryStore::new());
        let reconciler = StatusReconciler::new(store.clone(), WINDOW_MIN);
        (store, reconciler)
    }

    async fn seed_trip(store: &Arc<MemoryStore>, departure: DateTime<Utc>) -> Trip {
        // Drafts insist on future departures, so build ahead and shift.
        let mut trip = TripDraft {
            origin: "Kazan".to_string(),
            destination: "Samara".to_string(),
            departure_at: Utc::now() + Duration::hours(1),
            arrival_estimate: None,
            route_duration_min: None,
            seats_offered: 3,
            price_per_seat: 1500,
            comment: None,
        }
        .into_trip("driver-1".to_string())
        .unwrap();
        trip.departure_at = departure;
        store.insert_trip(&trip).await.unwrap();
        trip
    }

    #[tokio::test]
    async fn test_sweep_walks_trip_through_lifecycle() {
        let (store, reconciler) = setup();
        let departure = Utc::now() - Duration::minutes(1);
        let trip = seed_trip(&store, departure).await;

        // Just past departure: ACTIVE -> IN_PROGRESS.
        let outcome = reconciler.run_sweep_at(departure + Duration::seconds(1)).await;
        assert_eq!(outcome.departed, 1);
        assert_eq!(outcome.completed, 0);
        let stored = store.get_trip(trip.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TripStatus::InProgress);

        // Just past the default arrival window: IN_PROGRESS -> COMPLETED.
        let arrival = departure + Duration::minutes(WINDOW_MIN);
        let outcome = reconciler.run_sweep_at(arrival + Duration::seconds(1)).await;
        assert_eq!(outcome.completed, 1);
        let stored = store.get_trip(trip.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TripStatus::Completed);
        assert_eq!(
            stored.completion,
            Some(waypool_shared::CompletionCause::Elapsed)
        );

        // Third sweep is a no-op.
        let outcome = reconciler.run_sweep_at(arrival + Duration::hours(1)).await;
        assert_eq!(outcome.departed, 0);
        assert_eq!(outcome.completed, 0);
        assert_eq!(outcome.failed, 0);
    }

    #[tokio::test]
    async fn test_sweep_ignores_future_trips() {
        let (store, reconciler) = setup();
        let trip = seed_trip(&store, Utc::now() + Duration::hours(2)).await;

        let outcome = reconciler.run_sweep().await;
        assert_eq!(outcome.departed, 0);
        let stored = store.get_trip(trip.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TripStatus::Active);
    }

    #[tokio::test]
    async fn test_sweep_honors_route_duration_over_default() {
        let (store, reconciler) = setup();
        let departure = Utc::now() - Duration::minutes(120);
        let mut trip = seed_trip(&store, departure).await;
        trip.route_duration_min = Some(90);
        store
            .commit_atomic(vec![StoreOp::UpdateTrip(trip.clone())])
            .await
            .unwrap();

        // One sweep departs it, the next completes it: 90 minutes have
        // passed even though the 6 hour default window has not.
        reconciler.run_sweep_at(departure + Duration::minutes(1)).await;
        let outcome = reconciler
            .run_sweep_at(departure + Duration::minutes(91))
            .await;
        assert_eq!(outcome.completed, 1);
        let stored = store.get_trip(trip.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TripStatus::Completed);
    }

    #[tokio::test]
    async fn test_sweep_leaves_cancelled_trips_alone() {
        let (store, reconciler) = setup();
        let mut trip = seed_trip(&store, Utc::now() - Duration::hours(1)).await;
        crate::lifecycle::cancel(&mut trip).unwrap();
        store
            .commit_atomic(vec![StoreOp::UpdateTrip(trip.clone())])
            .await
            .unwrap();

        let outcome = reconciler.run_sweep().await;
        assert_eq!(outcome.departed, 0);
        let stored = store.get_trip(trip.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TripStatus::Cancelled);
    }
}
