use axum::{extract::State, Json};
use tracing::info;

use crate::{extractors::CronAuth, scheduler::outcome::CycleOutcome, AppState};

/// Runs one publication cycle. Always answers 200 once authorized; the body
/// says what happened.
pub async fn handler(_auth: CronAuth, State(state): State<AppState>) -> Json<CycleOutcome> {
    let outcome = state.scheduler.run_cycle().await;

    info!(
        success = outcome.success,
        posted = outcome.posted_count,
        reason = ?outcome.reason,
        category = ?outcome.category,
        "publication cycle finished"
    );
    Json(outcome)
}
