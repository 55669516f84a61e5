use axum::{extract::State, Json};

use waypool_trips::SweepOutcome;

use crate::state::AppState;

/// POST /v1/admin/sweep
///
/// Manual trigger for the status sweep the background worker runs on its
/// interval. Handy in operations and in tests; safe to call at any time
/// because every transition is idempotent.
pub async fn run_sweep(State(state): State<AppState>) -> Json<SweepOutcome> {
    Json(state.reconciler.run_sweep().await)
}
