//! Cycle Learning Engine
//!
//! Groups a user's confirmed history into cycles, derives per-user statistics
//! from them, and regenerates the prediction calendar from the updated model.
//!
//! Key principles:
//! - Learning runs from confirmed days only, never from predictions
//! - Statistics are rebuilt wholesale on every pass (no incremental drift)
//! - Recent history wins: retained lists are capped at twelve cycles
//! - A failed pass is logged and swallowed; logging must never break

use std::sync::Arc;

use chrono::{Duration, Months, NaiveDate, Utc};
use sqlx::SqlitePool;

use crate::models::{
    CycleDay, DayType, LearningData, Regularity, UserCycleProfile, CYCLE_LENGTH_BOUNDS,
    PERIOD_LENGTH_BOUNDS,
};
use crate::notify::Notifier;
use crate::prediction::generate_predictions;
use crate::store;

/// Confirmed days required before learning runs at all.
const MIN_CONFIRMED_DAYS: usize = 15;

/// Complete cycles required before the model is trusted.
const MIN_COMPLETE_CYCLES: usize = 2;

/// A grouped segment must exceed this many days to count as a complete cycle.
const COMPLETE_CYCLE_MIN_DAYS: usize = 21;

/// Grouped segments at or below this length are discarded as fragments.
const SEGMENT_MIN_DAYS: usize = 15;

/// A period day more than this many days after the segment's first period day
/// starts a new cycle.
const NEW_CYCLE_GAP_DAYS: i64 = 20;

/// Retained sample lists are capped at this many recent cycles.
const LEARNING_WINDOW_CYCLES: usize = 12;

/// Months of history consulted on each learning pass.
const LOOKBACK_MONTHS: u32 = 12;

/// Cycles of predictions produced by a regeneration.
const REGEN_CYCLES_AHEAD: u32 = 4;

/// Regularity thresholds on cycle-length variance (days squared).
const REGULAR_VARIANCE: f64 = 3.0;
const SOMEWHAT_REGULAR_VARIANCE: f64 = 7.0;

// ---------------------------------------------------------------------------
/// Outcome of a learning pass
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
pub enum LearningOutcome {
    /// The model was rebuilt and the prediction calendar regenerated.
    Updated {
        complete_cycles: usize,
        predictions_regenerated: usize,
    },
    /// Not enough confirmed history; nothing was changed.
    InsufficientData,
}

// ---------------------------------------------------------------------------
/// Cycle grouping
// ---------------------------------------------------------------------------

/// Split confirmed days (ascending by date) into cycle segments.
///
/// A segment runs until a period day arrives more than `NEW_CYCLE_GAP_DAYS`
/// after the segment's first period day. A segment that has accumulated only
/// non-period days when a period day arrives is closed as noise. Segments of
/// `SEGMENT_MIN_DAYS` or fewer days are discarded.
pub(crate) fn group_into_cycles(days: &[CycleDay]) -> Vec<Vec<CycleDay>> {
    let mut cycles: Vec<Vec<CycleDay>> = Vec::new();
    let mut current: Vec<CycleDay> = Vec::new();

    for day in days {
        if day.day_type == DayType::Period && !current.is_empty() {
            let first_period = current.iter().find(|d| d.day_type == DayType::Period);
            let starts_new_cycle = match first_period {
                Some(p) => (day.date - p.date).num_days() > NEW_CYCLE_GAP_DAYS,
                None => true, // orphaned non-period days, close them out
            };
            if starts_new_cycle {
                cycles.push(std::mem::take(&mut current));
            }
        }
        current.push(day.clone());
    }
    if !current.is_empty() {
        cycles.push(current);
    }

    cycles.retain(|c| c.len() > SEGMENT_MIN_DAYS);
    cycles
}

/// Population variance.
pub(crate) fn variance(values: &[i64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<i64>() as f64 / values.len() as f64;
    values
        .iter()
        .map(|v| {
            let d = *v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / values.len() as f64
}

// ---------------------------------------------------------------------------
/// Statistics derivation
// ---------------------------------------------------------------------------

/// Rebuild learning statistics from grouped cycles. Returns None when fewer
/// than `MIN_COMPLETE_CYCLES` complete cycles exist.
fn derive_learning(cycles: &[Vec<CycleDay>]) -> Option<LearningData> {
    let complete: Vec<&Vec<CycleDay>> = cycles
        .iter()
        .filter(|c| c.len() > COMPLETE_CYCLE_MIN_DAYS)
        .collect();
    if complete.len() < MIN_COMPLETE_CYCLES {
        return None;
    }

    let mut learning = LearningData::default();

    for cycle in &complete {
        learning.cycle_lengths.push(cycle.len() as i64);

        let period_days = cycle.iter().filter(|d| d.day_type == DayType::Period).count() as i64;
        if period_days > 0 {
            learning.period_lengths.push(period_days);
        }

        if let Some(day) = detect_ovulation_day(cycle) {
            learning.ovulation_days.push(day);
        }

        // Flow by day-of-period, in the order period days occur in the cycle.
        let mut day_of_period = 0u32;
        for day in cycle.iter() {
            if day.day_type != DayType::Period {
                continue;
            }
            day_of_period += 1;
            if let Some(flow) = day.flow {
                *learning
                    .flow_patterns
                    .entry(day_of_period)
                    .or_default()
                    .entry(flow)
                    .or_insert(0) += 1;
            }
        }
    }

    learning.total_cycles = complete.len() as u32;

    // Keep only the most recent window; older cycles age out of the model.
    let trim = |v: &mut Vec<i64>| {
        if v.len() > LEARNING_WINDOW_CYCLES {
            v.drain(..v.len() - LEARNING_WINDOW_CYCLES);
        }
    };
    trim(&mut learning.cycle_lengths);
    trim(&mut learning.period_lengths);
    trim(&mut learning.ovulation_days);

    learning.cycle_regularity = Some(classify_regularity(&learning.cycle_lengths));
    learning.averages.cycle_length = learning.avg_cycle_length();
    learning.averages.period_length = learning.avg_period_length();
    learning.averages.ovulation_day = learning.avg_ovulation_day();
    learning.last_learning_update = Some(Utc::now());

    Some(learning)
}

/// Ovulation position within a cycle, as a 1-based day index.
///
/// Prefers an explicitly logged ovulation day; otherwise falls back to the
/// midpoint of the logged fertile window. Returns None when neither exists.
fn detect_ovulation_day(cycle: &[CycleDay]) -> Option<i64> {
    if let Some(idx) = cycle.iter().position(|d| d.day_type == DayType::Ovulation) {
        return Some(idx as i64 + 1);
    }

    let fertile_positions: Vec<i64> = cycle
        .iter()
        .enumerate()
        .filter(|(_, d)| matches!(d.day_type, DayType::Fertile | DayType::Ovulation))
        .map(|(idx, _)| idx as i64 + 1)
        .collect();
    if fertile_positions.is_empty() {
        return None;
    }
    Some(fertile_positions[fertile_positions.len() / 2])
}

fn classify_regularity(cycle_lengths: &[i64]) -> Regularity {
    let var = variance(cycle_lengths);
    if var < REGULAR_VARIANCE {
        Regularity::Regular
    } else if var < SOMEWHAT_REGULAR_VARIANCE {
        Regularity::SomewhatRegular
    } else {
        Regularity::Irregular
    }
}

// ---------------------------------------------------------------------------
/// Learning pass
// ---------------------------------------------------------------------------

/// Run a full learning pass for the user as of `today`: rebuild statistics
/// from the last twelve months of confirmed days, fold the learned averages
/// into the profile, and regenerate the prediction calendar.
///
/// A pass that finds too little history is a successful no-op.
pub async fn update_learning(
    pool: &SqlitePool,
    user_id: i64,
    today: NaiveDate,
    notifier: &dyn Notifier,
) -> Result<LearningOutcome, String> {
    let lookback_start = today
        .checked_sub_months(Months::new(LOOKBACK_MONTHS))
        .ok_or_else(|| "Lookback start out of range".to_string())?;

    let confirmed = store::find_range(
        pool,
        user_id,
        Some(lookback_start),
        None,
        &store::DayFilter::confirmed(),
    )
    .await?;

    if confirmed.len() < MIN_CONFIRMED_DAYS {
        return Ok(LearningOutcome::InsufficientData);
    }

    let cycles = group_into_cycles(&confirmed);
    let learning = match derive_learning(&cycles) {
        Some(learning) => learning,
        None => return Ok(LearningOutcome::InsufficientData),
    };

    let mut profile = store::ensure_profile(pool, user_id).await?;
    let complete_cycles = learning.total_cycles as usize;

    // Learned averages drive the headline parameters, clamped to plausible
    // human bounds so a noisy history cannot push predictions off the rails.
    if let Some(avg) = learning.averages.cycle_length {
        profile.cycle_length = avg.clamp(CYCLE_LENGTH_BOUNDS.0, CYCLE_LENGTH_BOUNDS.1);
    }
    if let Some(avg) = learning.averages.period_length {
        profile.period_length = avg.clamp(PERIOD_LENGTH_BOUNDS.0, PERIOD_LENGTH_BOUNDS.1);
    }
    profile.learning = learning;
    profile.data_points = confirmed.len() as i64;

    store::save_profile(pool, &profile).await?;

    let regenerated = regenerate_predictions(pool, user_id, &profile, today, notifier).await?;

    Ok(LearningOutcome::Updated {
        complete_cycles,
        predictions_regenerated: regenerated,
    })
}

// ---------------------------------------------------------------------------
/// Prediction regeneration
// ---------------------------------------------------------------------------

/// Replace future predictions with a fresh calendar anchored on the most
/// recent confirmed period start. Past rows and confirmed rows are never
/// touched. Returns the number of prediction rows written.
pub async fn regenerate_predictions(
    pool: &SqlitePool,
    user_id: i64,
    profile: &UserCycleProfile,
    today: NaiveDate,
    notifier: &dyn Notifier,
) -> Result<usize, String> {
    let period_days = store::find_range(
        pool,
        user_id,
        None,
        None,
        &store::DayFilter {
            is_confirmed: Some(true),
            day_type: Some(DayType::Period),
            ..Default::default()
        },
    )
    .await?;

    let anchor = match latest_period_start(&period_days).or(profile.last_period_start) {
        Some(anchor) => anchor,
        None => return Ok(0), // nothing to anchor on yet
    };

    let predictions: Vec<_> = generate_predictions(anchor, profile, REGEN_CYCLES_AHEAD)
        .into_iter()
        .filter(|p| p.date >= today)
        .collect();

    let inserted =
        store::replace_predictions(pool, user_id, Some(today), &predictions, Utc::now()).await?;

    if let Err(e) = notifier.schedule(user_id, &predictions) {
        tracing::warn!(user_id, error = %e, "notification scheduling failed");
    }

    Ok(inserted as usize)
}

/// First day of the latest run of consecutive period days.
pub(crate) fn latest_period_start(period_days: &[CycleDay]) -> Option<NaiveDate> {
    let mut start = period_days.last()?.date;
    for day in period_days.iter().rev().skip(1) {
        if start - day.date == Duration::days(1) {
            start = day.date;
        } else {
            break;
        }
    }
    Some(start)
}

// ---------------------------------------------------------------------------
/// Background dispatch
// ---------------------------------------------------------------------------

/// Fire-and-forget learning pass. Day writes must not wait on, or fail
/// because of, learning; errors are logged and dropped.
pub fn spawn_learning_update(
    pool: SqlitePool,
    user_id: i64,
    today: NaiveDate,
    notifier: Arc<dyn Notifier>,
) {
    tokio::spawn(async move {
        match update_learning(&pool, user_id, today, notifier.as_ref()).await {
            Ok(LearningOutcome::Updated {
                complete_cycles,
                predictions_regenerated,
            }) => {
                tracing::info!(
                    user_id,
                    complete_cycles,
                    predictions_regenerated,
                    "learning pass complete"
                );
            }
            Ok(LearningOutcome::InsufficientData) => {
                tracing::debug!(user_id, "learning skipped, not enough confirmed history");
            }
            Err(e) => {
                tracing::error!(user_id, error = %e, "learning pass failed");
            }
        }
    });
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
