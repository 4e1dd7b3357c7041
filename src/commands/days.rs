//! Day tracking commands: logging, querying, and deleting cycle days.
//!
//! Writes confirm a day and, when the day is significant (a period or
//! ovulation day, or a confirmed prediction), kick off a background learning
//! pass. The write itself never waits on learning.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::db::AppState;
use crate::learning;
use crate::models::{CycleDay, DayLog, DayType, Phase, Symptom};
use crate::store;

/// ---------------------------------------------------------------------------
/// Writes
/// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct UpsertOutcome {
  pub day: CycleDay,
  pub was_confirming_prediction: bool,
  pub learning_triggered: bool,
}

pub async fn upsert_cycle_day(
  state: &AppState,
  user_id: i64,
  log: DayLog,
) -> Result<UpsertOutcome, String> {
  upsert_cycle_day_at(state, user_id, log, Utc::now().date_naive()).await
}

async fn upsert_cycle_day_at(
  state: &AppState,
  user_id: i64,
  log: DayLog,
  today: NaiveDate,
) -> Result<UpsertOutcome, String> {
  let existing = store::find_day(&state.db, user_id, log.date).await?;
  let was_confirming_prediction = existing.as_ref().is_some_and(|d| d.is_prediction);

  // When a prediction is being confirmed its type is retained for accuracy
  // scoring; a re-edit of an already confirmed day keeps what it had.
  let predicted_type = existing.as_ref().and_then(|d| {
    if d.is_prediction {
      Some(d.day_type)
    } else {
      d.predicted_type
    }
  });
  let generated_at = existing.as_ref().and_then(|d| d.generated_at);

  let day = store::confirm_day(
    &state.db,
    user_id,
    &log,
    predicted_type,
    generated_at,
    Utc::now(),
  )
  .await?;

  let learning_triggered = was_confirming_prediction
    || matches!(log.day_type, DayType::Period | DayType::Ovulation);
  if learning_triggered {
    learning::spawn_learning_update(state.db.clone(), user_id, today, state.notifier.clone());
  }

  Ok(UpsertOutcome {
    day,
    was_confirming_prediction,
    learning_triggered,
  })
}

#[derive(Debug, Serialize)]
pub struct BulkUpdateOutcome {
  pub updated: usize,
  pub learning_triggered: bool,
}

/// Confirm a batch of days in one call. At most one learning pass is
/// spawned, after all writes, keyed on the batch containing a period day.
pub async fn bulk_update_cycle_days(
  state: &AppState,
  user_id: i64,
  logs: Vec<DayLog>,
) -> Result<BulkUpdateOutcome, String> {
  bulk_update_cycle_days_at(state, user_id, logs, Utc::now().date_naive()).await
}

async fn bulk_update_cycle_days_at(
  state: &AppState,
  user_id: i64,
  logs: Vec<DayLog>,
  today: NaiveDate,
) -> Result<BulkUpdateOutcome, String> {
  let learning_triggered = logs.iter().any(|l| l.day_type == DayType::Period);
  let mut updated = 0;

  for log in logs {
    let existing = store::find_day(&state.db, user_id, log.date).await?;
    let predicted_type = existing.as_ref().and_then(|d| {
      if d.is_prediction {
        Some(d.day_type)
      } else {
        d.predicted_type
      }
    });
    let generated_at = existing.as_ref().and_then(|d| d.generated_at);

    store::confirm_day(
      &state.db,
      user_id,
      &log,
      predicted_type,
      generated_at,
      Utc::now(),
    )
    .await?;
    updated += 1;
  }

  if learning_triggered {
    learning::spawn_learning_update(state.db.clone(), user_id, today, state.notifier.clone());
  }

  Ok(BulkUpdateOutcome {
    updated,
    learning_triggered,
  })
}

#[derive(Debug, Serialize)]
pub struct DeletedDay {
  pub date: NaiveDate,
  pub day_type: DayType,
  pub was_confirmed: bool,
}

pub async fn delete_cycle_day(
  state: &AppState,
  user_id: i64,
  date: NaiveDate,
) -> Result<DeletedDay, String> {
  delete_cycle_day_at(state, user_id, date, Utc::now().date_naive()).await
}

async fn delete_cycle_day_at(
  state: &AppState,
  user_id: i64,
  date: NaiveDate,
  today: NaiveDate,
) -> Result<DeletedDay, String> {
  let removed = store::delete_day(&state.db, user_id, date)
    .await?
    .ok_or_else(|| "Day not found".to_string())?;

  // Removing significant confirmed data invalidates the learned model.
  if removed.is_confirmed && matches!(removed.day_type, DayType::Period | DayType::Ovulation) {
    learning::spawn_learning_update(state.db.clone(), user_id, today, state.notifier.clone());
  }

  Ok(DeletedDay {
    date: removed.date,
    day_type: removed.day_type,
    was_confirmed: removed.is_confirmed,
  })
}

/// ---------------------------------------------------------------------------
/// Reads
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
  High,
  Medium,
  Low,
}

impl ConfidenceLevel {
  fn from_confidence(confidence: f64) -> Self {
    if confidence > 0.8 {
      Self::High
    } else if confidence > 0.6 {
      Self::Medium
    } else {
      Self::Low
    }
  }
}

#[derive(Debug, Serialize)]
pub struct TodayCycleDay {
  pub date: NaiveDate,
  pub day: Option<CycleDay>,
  /// Only set when today's row is still a prediction.
  pub confidence_level: Option<ConfidenceLevel>,
}

pub async fn get_today_cycle_day(state: &AppState, user_id: i64) -> Result<TodayCycleDay, String> {
  get_today_cycle_day_at(state, user_id, Utc::now().date_naive()).await
}

async fn get_today_cycle_day_at(
  state: &AppState,
  user_id: i64,
  today: NaiveDate,
) -> Result<TodayCycleDay, String> {
  let day = store::find_day(&state.db, user_id, today).await?;
  let confidence_level = day
    .as_ref()
    .filter(|d| d.is_prediction)
    .and_then(|d| d.confidence)
    .map(ConfidenceLevel::from_confidence);

  Ok(TodayCycleDay {
    date: today,
    day,
    confidence_level,
  })
}

#[derive(Debug, PartialEq, Serialize)]
pub struct CycleSummary {
  pub total: usize,
  pub confirmed: usize,
  pub predictions: usize,
  /// Consecutive confirmed days ending today.
  pub current_streak: i64,
  /// 0-100 blend of tracking completeness and symptom/note richness.
  pub data_quality: i64,
}

#[derive(Debug, Serialize)]
pub struct CycleDaysResponse {
  pub days: Vec<CycleDay>,
  pub summary: CycleSummary,
}

pub async fn get_cycle_days(
  state: &AppState,
  user_id: i64,
  from: Option<NaiveDate>,
  to: Option<NaiveDate>,
) -> Result<CycleDaysResponse, String> {
  get_cycle_days_at(state, user_id, from, to, Utc::now().date_naive()).await
}

async fn get_cycle_days_at(
  state: &AppState,
  user_id: i64,
  from: Option<NaiveDate>,
  to: Option<NaiveDate>,
  today: NaiveDate,
) -> Result<CycleDaysResponse, String> {
  let days = store::find_range(&state.db, user_id, from, to, &store::DayFilter::default()).await?;
  let summary = summarize(&days, today);
  Ok(CycleDaysResponse { days, summary })
}

fn summarize(days: &[CycleDay], today: NaiveDate) -> CycleSummary {
  let confirmed: Vec<&CycleDay> = days.iter().filter(|d| d.is_confirmed).collect();
  let predictions = days.iter().filter(|d| d.is_prediction).count();

  let mut current_streak = 0i64;
  for day in confirmed.iter().rev() {
    if (today - day.date).num_days() == current_streak {
      current_streak += 1;
    } else {
      break;
    }
  }

  let data_quality = if days.is_empty() || confirmed.is_empty() {
    0
  } else {
    let with_symptoms = confirmed.iter().filter(|d| !d.symptoms.is_empty()).count();
    let with_notes = confirmed
      .iter()
      .filter(|d| d.notes.as_deref().is_some_and(|n| !n.trim().is_empty()))
      .count();
    let completeness = confirmed.len() as f64 / days.len() as f64;
    let richness = (with_symptoms + with_notes) as f64 / (confirmed.len() * 2) as f64;
    ((completeness * 0.7 + richness * 0.3) * 100.0).round() as i64
  };

  CycleSummary {
    total: days.len(),
    confirmed: confirmed.len(),
    predictions,
    current_streak,
    data_quality,
  }
}

/// ---------------------------------------------------------------------------
/// Current cycle
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymptomCount {
  pub symptom: Symptom,
  pub frequency: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextPredictedPeriod {
  pub date: NaiveDate,
  pub days_until: i64,
  pub confidence: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct CurrentCycle {
  pub cycle_start_date: NaiveDate,
  pub current_cycle_day: i64,
  pub total_days_tracked: usize,
  /// Confirmed period days so far this cycle.
  pub period_length: usize,
  pub ovulation_detected: bool,
  pub phase: Phase,
  pub next_predicted_period: Option<NextPredictedPeriod>,
  pub symptoms: Vec<SymptomCount>,
  /// Percentage of this cycle's tracked days that are confirmed.
  pub tracking_quality: i64,
}

#[derive(Debug, Serialize)]
pub struct CurrentCycleResponse {
  pub current_cycle: CurrentCycle,
  pub cycle_days: Vec<CycleDay>,
}

/// Snapshot of the cycle in progress, or None when no period day (confirmed
/// or predicted) falls inside the last thirty days.
pub async fn get_current_cycle(
  state: &AppState,
  user_id: i64,
) -> Result<Option<CurrentCycleResponse>, String> {
  get_current_cycle_at(state, user_id, Utc::now().date_naive()).await
}

async fn get_current_cycle_at(
  state: &AppState,
  user_id: i64,
  today: NaiveDate,
) -> Result<Option<CurrentCycleResponse>, String> {
  let window_start = today - Duration::days(30);
  let period_days = store::find_range(
    &state.db,
    user_id,
    Some(window_start),
    Some(today),
    &store::DayFilter {
      day_type: Some(DayType::Period),
      ..Default::default()
    },
  )
  .await?;

  let Some(cycle_start) = learning::latest_period_start(&period_days) else {
    return Ok(None);
  };
  let current_cycle_day = (today - cycle_start).num_days() + 1;

  let cycle_days = store::find_range(
    &state.db,
    user_id,
    Some(cycle_start),
    Some(today),
    &store::DayFilter::default(),
  )
  .await?;

  let confirmed = cycle_days.iter().filter(|d| d.is_confirmed).count();
  let tracking_quality = if cycle_days.is_empty() {
    0
  } else {
    ((confirmed as f64 / cycle_days.len() as f64) * 100.0).round() as i64
  };

  let next_predicted_period = store::find_range(
    &state.db,
    user_id,
    Some(today + Duration::days(1)),
    None,
    &store::DayFilter {
      is_prediction: Some(true),
      day_type: Some(DayType::Period),
      ..Default::default()
    },
  )
  .await?
  .first()
  .map(|d| NextPredictedPeriod {
    date: d.date,
    days_until: (d.date - today).num_days(),
    confidence: d.confidence,
  });

  let current_cycle = CurrentCycle {
    cycle_start_date: cycle_start,
    current_cycle_day,
    total_days_tracked: confirmed,
    period_length: cycle_days
      .iter()
      .filter(|d| d.is_confirmed && d.day_type == DayType::Period)
      .count(),
    ovulation_detected: cycle_days
      .iter()
      .any(|d| d.is_confirmed && d.day_type == DayType::Ovulation),
    phase: phase_for_cycle_day(current_cycle_day),
    next_predicted_period,
    symptoms: recent_symptoms(&cycle_days),
    tracking_quality,
  };

  Ok(Some(CurrentCycleResponse {
    current_cycle,
    cycle_days,
  }))
}

/// Coarse phase by day number alone, for users without learned parameters.
fn phase_for_cycle_day(cycle_day: i64) -> Phase {
  if cycle_day <= 5 {
    Phase::Menstrual
  } else if cycle_day <= 13 {
    Phase::Follicular
  } else if cycle_day <= 16 {
    Phase::Ovulation
  } else {
    Phase::Luteal
  }
}

/// Top symptoms over the last seven confirmed days of the cycle.
fn recent_symptoms(cycle_days: &[CycleDay]) -> Vec<SymptomCount> {
  let recent: Vec<&CycleDay> = cycle_days
    .iter()
    .filter(|d| d.is_confirmed)
    .collect();
  let recent = &recent[recent.len().saturating_sub(7)..];

  let mut counts: BTreeMap<Symptom, u32> = BTreeMap::new();
  for day in recent {
    for symptom in &day.symptoms {
      *counts.entry(*symptom).or_insert(0) += 1;
    }
  }

  let mut ranked: Vec<SymptomCount> = counts
    .into_iter()
    .map(|(symptom, frequency)| SymptomCount { symptom, frequency })
    .collect();
  ranked.sort_by(|a, b| b.frequency.cmp(&a.frequency));
  ranked.truncate(5);
  ranked
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
