//! Deterministic cycle prediction layer
//!
//! Pure functions that expand a user's cycle parameters into a multi-cycle
//! calendar of day-level predictions. No clock access and no randomness:
//! identical inputs always yield the identical sequence, which keeps
//! regeneration idempotent and the output testable.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::{DayType, FertileLevel, Flow, LearningData, Phase, UserCycleProfile};

/// Fertile window spans [ovulation - 5, ovulation + 1], clamped to the cycle.
const FERTILE_WINDOW_LEAD_DAYS: i64 = 5;
const FERTILE_WINDOW_TRAIL_DAYS: i64 = 1;

/// Days ovulation can vary around its estimate.
const OVULATION_VARIANCE_DAYS: i64 = 2;

/// Confidence saturates once this many cycles have been observed.
const LEARNING_SATURATION_CYCLES: f64 = 6.0;

/// ---------------------------------------------------------------------------
/// Output unit
/// ---------------------------------------------------------------------------

/// One predicted day, later persisted as a CycleDay with is_prediction set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
  pub date: NaiveDate,
  pub cycle_day: i64,
  pub day_type: DayType,
  pub phase: Phase,
  pub flow: Option<Flow>,
  pub level: Option<FertileLevel>,
  pub confidence: f64,
}

/// Cycle parameters after folding in learned averages.
#[derive(Debug, Clone, Copy)]
struct EffectiveParams {
  cycle_length: i64,
  period_length: i64,
  ovulation_day: i64,
}

fn resolve_params(profile: &UserCycleProfile) -> EffectiveParams {
  let cycle_length = profile
    .learning
    .avg_cycle_length()
    .unwrap_or(profile.cycle_length);
  let period_length = profile
    .learning
    .avg_period_length()
    .unwrap_or(profile.period_length);
  let ovulation_day = profile
    .learning
    .avg_ovulation_day()
    .unwrap_or(cycle_length - profile.luteal_phase_length);

  EffectiveParams {
    cycle_length,
    period_length,
    ovulation_day,
  }
}

/// ---------------------------------------------------------------------------
/// Generation
/// ---------------------------------------------------------------------------

/// Generate `cycles_ahead` cycles of day-level predictions starting at
/// `start_date` (the first day of a period).
pub fn generate_predictions(
  start_date: NaiveDate,
  profile: &UserCycleProfile,
  cycles_ahead: u32,
) -> Vec<Prediction> {
  let params = resolve_params(profile);
  let mut predictions = Vec::new();

  for cycle in 0..cycles_ahead {
    let cycle_start = start_date + Duration::days(cycle as i64 * params.cycle_length);
    predictions.extend(generate_single_cycle(
      cycle_start,
      &params,
      cycle == 0, // first cycle is the current one, predicted with more confidence
      &profile.learning,
    ));
  }

  predictions
}

fn generate_single_cycle(
  start_date: NaiveDate,
  params: &EffectiveParams,
  is_current_cycle: bool,
  learning: &LearningData,
) -> Vec<Prediction> {
  // Confidence rises with observed history, saturating after six cycles.
  let learning_factor = (learning.total_cycles as f64 / LEARNING_SATURATION_CYCLES).min(1.0);
  let base_confidence = if is_current_cycle { 0.9 } else { 0.7 };
  let adjusted_confidence = base_confidence + learning_factor * 0.1;

  let ovulation_day = params.ovulation_day;
  let ovulation_variance =
    ((learning_factor * OVULATION_VARIANCE_DAYS as f64).floor() as i64).max(1);

  let fertile_start = (ovulation_day - FERTILE_WINDOW_LEAD_DAYS).max(1);
  let fertile_end = (ovulation_day + FERTILE_WINDOW_TRAIL_DAYS).min(params.cycle_length);

  let mut predictions = Vec::with_capacity(params.cycle_length as usize);

  for day in 1..=params.cycle_length {
    let date = start_date + Duration::days(day - 1);

    let prediction = if day <= params.period_length {
      Prediction {
        date,
        cycle_day: day,
        day_type: DayType::Period,
        phase: Phase::Menstrual,
        flow: Some(predicted_flow(day, params.period_length, learning)),
        level: None,
        // Periods are the most reliable signal
        confidence: (adjusted_confidence + 0.05).min(0.95),
      }
    } else if day >= fertile_start && day <= fertile_end {
      if (day - ovulation_day).abs() <= ovulation_variance {
        Prediction {
          date,
          cycle_day: day,
          day_type: DayType::Ovulation,
          phase: Phase::Ovulation,
          flow: None,
          level: None,
          confidence: adjusted_confidence * 0.8, // ovulation timing can vary
        }
      } else {
        Prediction {
          date,
          cycle_day: day,
          day_type: DayType::Fertile,
          phase: Phase::Follicular,
          flow: None,
          level: Some(fertile_level(day, ovulation_day)),
          confidence: adjusted_confidence * 0.75,
        }
      }
    } else if day > ovulation_day {
      Prediction {
        date,
        cycle_day: day,
        day_type: DayType::Luteal,
        phase: Phase::Luteal,
        flow: None,
        level: None,
        confidence: adjusted_confidence * 0.7,
      }
    } else {
      Prediction {
        date,
        cycle_day: day,
        day_type: DayType::Follicular,
        phase: Phase::Follicular,
        flow: None,
        level: None,
        confidence: adjusted_confidence * 0.6,
      }
    };

    predictions.push(prediction);
  }

  predictions
}

/// Flow for a given day of the period: the most frequently observed flow for
/// that day if we have learned any, otherwise a fixed default curve.
fn predicted_flow(day_of_period: i64, total_period_days: i64, learning: &LearningData) -> Flow {
  if let Some(counts) = learning.flow_patterns.get(&(day_of_period as u32)) {
    // Most common flow wins; ties resolve to the lighter flow (map order).
    let mut best: Option<(Flow, u32)> = None;
    for (&flow, &count) in counts {
      match best {
        Some((_, best_count)) if count <= best_count => {}
        _ => best = Some((flow, count)),
      }
    }
    if let Some((flow, _)) = best {
      return flow;
    }
  }

  if day_of_period == 1 {
    Flow::Light
  } else if day_of_period == 2 || day_of_period == 3 {
    Flow::Heavy
  } else if day_of_period == total_period_days {
    Flow::Spotting
  } else {
    Flow::Medium
  }
}

/// Fertility level by distance from the ovulation estimate.
fn fertile_level(cycle_day: i64, ovulation_day: i64) -> FertileLevel {
  match (cycle_day - ovulation_day).abs() {
    0 => FertileLevel::Peak,
    1 => FertileLevel::High,
    2 => FertileLevel::Medium,
    _ => FertileLevel::Low,
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
