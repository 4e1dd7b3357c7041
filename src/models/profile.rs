use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::cycle_day::Flow;

/// Default cycle parameters used until learning has anything to say.
pub const DEFAULT_CYCLE_LENGTH: i64 = 28;
pub const DEFAULT_PERIOD_LENGTH: i64 = 5;
pub const DEFAULT_LUTEAL_PHASE_LENGTH: i64 = 14;

/// Domain bounds for learned parameters.
pub const CYCLE_LENGTH_BOUNDS: (i64, i64) = (21, 35);
pub const PERIOD_LENGTH_BOUNDS: (i64, i64) = (2, 8);

/// Coarse regularity label computed by the learning engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regularity {
  Regular,
  SomewhatRegular,
  Irregular,
}

impl std::fmt::Display for Regularity {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      Regularity::Regular => "regular",
      Regularity::SomewhatRegular => "somewhat_regular",
      Regularity::Irregular => "irregular",
    };
    write!(f, "{}", s)
  }
}

/// Rounded means derived from the retained learning lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Averages {
  pub cycle_length: Option<i64>,
  pub period_length: Option<i64>,
  pub ovulation_day: Option<i64>,
}

/// Accumulated statistics from confirmed cycles. Lists are most-recent-last
/// and capped at twelve entries so the model stays responsive to recent
/// patterns; stored wholesale as a JSON column on the profile row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningData {
  pub cycle_lengths: Vec<i64>,
  pub period_lengths: Vec<i64>,
  pub ovulation_days: Vec<i64>,
  /// day-of-period -> flow -> observation count
  pub flow_patterns: BTreeMap<u32, BTreeMap<Flow, u32>>,
  pub total_cycles: u32,
  pub cycle_regularity: Option<Regularity>,
  pub averages: Averages,
  pub last_learning_update: Option<DateTime<Utc>>,
}

impl LearningData {
  /// Rounded mean of the learned cycle lengths, if any samples exist.
  pub fn avg_cycle_length(&self) -> Option<i64> {
    rounded_mean(&self.cycle_lengths)
  }

  pub fn avg_period_length(&self) -> Option<i64> {
    rounded_mean(&self.period_lengths)
  }

  pub fn avg_ovulation_day(&self) -> Option<i64> {
    rounded_mean(&self.ovulation_days)
  }
}

/// Arithmetic mean rounded to the nearest whole day; None for an empty list.
pub fn rounded_mean(values: &[i64]) -> Option<i64> {
  if values.is_empty() {
    return None;
  }
  let sum: i64 = values.iter().sum();
  Some((sum as f64 / values.len() as f64).round() as i64)
}

/// Per-user cycle parameters plus accumulated learning state. Created lazily
/// on first cycle initialization; mutated only by the learning engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCycleProfile {
  pub user_id: i64,
  pub cycle_length: i64,
  pub period_length: i64,
  pub luteal_phase_length: i64,
  pub learning: LearningData,
  /// Opaque to the core; owned by the notification layer.
  pub notification_settings: Option<serde_json::Value>,
  pub last_period_start: Option<NaiveDate>,
  pub data_points: i64,
  pub created_at: Option<DateTime<Utc>>,
  pub updated_at: Option<DateTime<Utc>>,
}

impl UserCycleProfile {
  pub fn with_defaults(user_id: i64) -> Self {
    Self {
      user_id,
      cycle_length: DEFAULT_CYCLE_LENGTH,
      period_length: DEFAULT_PERIOD_LENGTH,
      luteal_phase_length: DEFAULT_LUTEAL_PHASE_LENGTH,
      learning: LearningData::default(),
      notification_settings: None,
      last_period_start: None,
      data_points: 0,
      created_at: None,
      updated_at: None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_rounded_mean() {
    assert_eq!(rounded_mean(&[]), None);
    assert_eq!(rounded_mean(&[28]), Some(28));
    assert_eq!(rounded_mean(&[30, 30, 30, 26]), Some(29));
    // 28.5 rounds away from zero
    assert_eq!(rounded_mean(&[28, 29]), Some(29));
  }

  #[test]
  fn test_default_profile() {
    let profile = UserCycleProfile::with_defaults(1);
    assert_eq!(profile.cycle_length, 28);
    assert_eq!(profile.period_length, 5);
    assert_eq!(profile.luteal_phase_length, 14);
    assert_eq!(profile.learning.total_cycles, 0);
    assert!(profile.learning.cycle_lengths.is_empty());
  }

  #[test]
  fn test_learning_data_json_roundtrip() {
    let mut learning = LearningData {
      cycle_lengths: vec![28, 29, 30],
      total_cycles: 3,
      cycle_regularity: Some(Regularity::Regular),
      ..Default::default()
    };
    learning
      .flow_patterns
      .entry(2)
      .or_default()
      .insert(Flow::Heavy, 3);

    let json = serde_json::to_string(&learning).unwrap();
    let parsed: LearningData = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.cycle_lengths, vec![28, 29, 30]);
    assert_eq!(parsed.flow_patterns[&2][&Flow::Heavy], 3);
    assert_eq!(parsed.cycle_regularity, Some(Regularity::Regular));
  }

  #[test]
  fn test_empty_learning_json_parses() {
    // Fresh profiles store '{}'; every field must default cleanly.
    let parsed: LearningData = serde_json::from_str("{}").unwrap();
    assert_eq!(parsed.total_cycles, 0);
    assert!(parsed.averages.cycle_length.is_none());
  }
}
