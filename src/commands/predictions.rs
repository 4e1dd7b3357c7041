//! Prediction lifecycle commands: cycle initialization and insights.

use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::db::AppState;
use crate::insights::{self, CycleInsights};
use crate::models::UserCycleProfile;
use crate::prediction::generate_predictions;
use crate::store;

/// Cycles generated when a user first sets up tracking.
const INIT_CYCLES_AHEAD: u32 = 3;

#[derive(Debug, Serialize)]
pub struct InitializeOutcome {
    pub predictions: usize,
    pub profile: UserCycleProfile,
}

/// Set up (or reset) prediction tracking from a known period start.
///
/// Creates the profile on first use, replaces every prediction row with a
/// fresh three-cycle calendar anchored on `last_period_start`, and hands the
/// batch to the notification scheduler. Confirmed rows are left alone.
pub async fn initialize_cycle(
    state: &AppState,
    user_id: i64,
    last_period_start: NaiveDate,
) -> Result<InitializeOutcome, String> {
    let mut profile = store::ensure_profile(&state.db, user_id).await?;
    profile.last_period_start = Some(last_period_start);
    store::save_profile(&state.db, &profile).await?;

    let predictions = generate_predictions(last_period_start, &profile, INIT_CYCLES_AHEAD);
    let inserted =
        store::replace_predictions(&state.db, user_id, None, &predictions, Utc::now()).await?;

    if let Err(e) = state.notifier.schedule(user_id, &predictions) {
        tracing::warn!(user_id, error = %e, "notification scheduling failed");
    }

    Ok(InitializeOutcome {
        predictions: inserted as usize,
        profile,
    })
}

pub async fn get_cycle_insights(state: &AppState, user_id: i64) -> Result<CycleInsights, String> {
    insights::cycle_insights(&state.db, user_id, Utc::now().date_naive()).await
}
