//! Read-only reporting over a user's cycle history.
//!
//! Everything here is derived on demand from stored rows and the profile;
//! nothing is written back, so a slow or failed report never affects the
//! tracking or learning paths.

use chrono::{Duration, Months, NaiveDate};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::learning;
use crate::models::{CycleDay, DayType, Regularity, Symptom, UserCycleProfile};
use crate::store;

/// Symptom history consulted for the common-symptoms ranking.
const SYMPTOM_LOOKBACK_MONTHS: u32 = 6;

/// Confirmed history consulted when regularity has to be recomputed.
const REGULARITY_LOOKBACK_MONTHS: u32 = 6;

/// At most this many symptoms are reported.
const TOP_SYMPTOMS: usize = 8;

/// Fine-grained regularity thresholds on cycle-length variance, used when no
/// learned label is cached yet.
const VERY_REGULAR_VARIANCE: f64 = 2.0;
const REGULAR_VARIANCE: f64 = 4.0;
const SOMEWHAT_IRREGULAR_VARIANCE: f64 = 8.0;

/// ---------------------------------------------------------------------------
/// Payload
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegularityLabel {
  VeryRegular,
  Regular,
  SomewhatRegular,
  SomewhatIrregular,
  Irregular,
  InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymptomFrequency {
  pub symptom: Symptom,
  pub count: u32,
  /// Share of confirmed days in the lookback window showing the symptom.
  pub percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DateRange {
  pub start: NaiveDate,
  pub end: NaiveDate,
}

/// Predicted milestones inside the next month.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpcomingPredictions {
  pub next_period: Option<NaiveDate>,
  pub next_ovulation: Option<NaiveDate>,
  pub fertile_window: Option<DateRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearningStats {
  pub cycles_analyzed: u32,
  pub cycle_length_variance: Option<f64>,
  pub is_learning: bool,
  /// How far along the confidence ramp the model is, as a percentage.
  pub confidence_level: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleInsights {
  pub regularity: RegularityLabel,
  /// Fraction in [0,1] of evaluable predictions whose type matched the
  /// confirmed day. 0.0 when nothing is evaluable yet.
  pub prediction_accuracy: f64,
  pub common_symptoms: Vec<SymptomFrequency>,
  pub upcoming: UpcomingPredictions,
  pub learning_stats: LearningStats,
}

/// ---------------------------------------------------------------------------
/// Report assembly
/// ---------------------------------------------------------------------------

pub async fn cycle_insights(
  pool: &SqlitePool,
  user_id: i64,
  today: NaiveDate,
) -> Result<CycleInsights, String> {
  let profile = store::load_profile(pool, user_id).await?;
  let confirmed = store::find_range(pool, user_id, None, None, &store::DayFilter::confirmed()).await?;

  let month_ahead = today
    .checked_add_months(Months::new(1))
    .ok_or_else(|| "Insight window out of range".to_string())?;
  let predictions = store::find_range(
    pool,
    user_id,
    Some(today),
    Some(month_ahead),
    &store::DayFilter::predictions(),
  )
  .await?;

  Ok(CycleInsights {
    regularity: regularity_label(profile.as_ref(), &confirmed, today),
    prediction_accuracy: prediction_accuracy(&confirmed),
    common_symptoms: common_symptoms(&confirmed, today),
    upcoming: upcoming_predictions(&predictions),
    learning_stats: learning_stats(profile.as_ref()),
  })
}

/// Prefer the label the learning engine has already cached; otherwise grade
/// the last six months of history on a finer variance scale. The recompute
/// grades every segment the grouper keeps, not just complete cycles, so a
/// cycle still in progress contributes.
fn regularity_label(
  profile: Option<&UserCycleProfile>,
  confirmed: &[CycleDay],
  today: NaiveDate,
) -> RegularityLabel {
  if let Some(cached) = profile.and_then(|p| p.learning.cycle_regularity) {
    return match cached {
      Regularity::Regular => RegularityLabel::Regular,
      Regularity::SomewhatRegular => RegularityLabel::SomewhatRegular,
      Regularity::Irregular => RegularityLabel::Irregular,
    };
  }

  let window_start = today
    .checked_sub_months(Months::new(REGULARITY_LOOKBACK_MONTHS))
    .unwrap_or(today);
  let recent: Vec<CycleDay> = confirmed
    .iter()
    .filter(|d| d.date >= window_start)
    .cloned()
    .collect();

  let lengths: Vec<i64> = learning::group_into_cycles(&recent)
    .iter()
    .map(|c| c.len() as i64)
    .collect();
  if lengths.len() < 2 {
    return RegularityLabel::InsufficientData;
  }

  let var = learning::variance(&lengths);
  if var < VERY_REGULAR_VARIANCE {
    RegularityLabel::VeryRegular
  } else if var < REGULAR_VARIANCE {
    RegularityLabel::Regular
  } else if var < SOMEWHAT_IRREGULAR_VARIANCE {
    RegularityLabel::SomewhatIrregular
  } else {
    RegularityLabel::Irregular
  }
}

/// A confirmed day is evaluable when it still carries the type the generator
/// predicted for it and that prediction predates the confirmation.
fn prediction_accuracy(confirmed: &[CycleDay]) -> f64 {
  let mut total = 0u32;
  let mut correct = 0u32;

  for day in confirmed {
    let (Some(predicted), Some(generated_at), Some(confirmed_at)) =
      (day.predicted_type, day.generated_at, day.confirmed_at)
    else {
      continue;
    };
    if generated_at >= confirmed_at {
      continue;
    }
    total += 1;
    if predicted == day.day_type {
      correct += 1;
    }
  }

  if total == 0 {
    return 0.0;
  }
  correct as f64 / total as f64
}

fn common_symptoms(confirmed: &[CycleDay], today: NaiveDate) -> Vec<SymptomFrequency> {
  let window_start = today
    .checked_sub_months(Months::new(SYMPTOM_LOOKBACK_MONTHS))
    .unwrap_or(today);

  let recent: Vec<&CycleDay> = confirmed
    .iter()
    .filter(|d| d.date >= window_start && d.date <= today)
    .collect();
  if recent.is_empty() {
    return Vec::new();
  }

  let mut counts: std::collections::BTreeMap<Symptom, u32> = Default::default();
  for day in &recent {
    for symptom in &day.symptoms {
      *counts.entry(*symptom).or_insert(0) += 1;
    }
  }

  let mut ranked: Vec<SymptomFrequency> = counts
    .into_iter()
    .map(|(symptom, count)| SymptomFrequency {
      symptom,
      count,
      percentage: (count as f64 / recent.len() as f64) * 100.0,
    })
    .collect();
  // BTreeMap iteration keeps ties in declaration order.
  ranked.sort_by(|a, b| b.count.cmp(&a.count));
  ranked.truncate(TOP_SYMPTOMS);
  ranked
}

fn upcoming_predictions(predictions: &[CycleDay]) -> UpcomingPredictions {
  let next_period = predictions
    .iter()
    .find(|d| d.day_type == DayType::Period)
    .map(|d| d.date);
  let next_ovulation = predictions
    .iter()
    .find(|d| d.day_type == DayType::Ovulation)
    .map(|d| d.date);

  // First contiguous run of fertile-or-ovulation days.
  let fertile_window = predictions
    .iter()
    .position(|d| matches!(d.day_type, DayType::Fertile | DayType::Ovulation))
    .map(|start_idx| {
      let start = predictions[start_idx].date;
      let mut end = start;
      for day in &predictions[start_idx + 1..] {
        if matches!(day.day_type, DayType::Fertile | DayType::Ovulation)
          && day.date - end == Duration::days(1)
        {
          end = day.date;
        } else {
          break;
        }
      }
      DateRange { start, end }
    });

  UpcomingPredictions {
    next_period,
    next_ovulation,
    fertile_window,
  }
}

fn learning_stats(profile: Option<&UserCycleProfile>) -> LearningStats {
  let Some(profile) = profile else {
    return LearningStats {
      cycles_analyzed: 0,
      cycle_length_variance: None,
      is_learning: false,
      confidence_level: 0.0,
    };
  };

  let learning = &profile.learning;
  let variance = if learning.cycle_lengths.is_empty() {
    None
  } else {
    Some(learning::variance(&learning.cycle_lengths))
  };

  LearningStats {
    cycles_analyzed: learning.total_cycles,
    cycle_length_variance: variance,
    is_learning: learning.total_cycles >= 2,
    confidence_level: (learning.total_cycles as f64 / 6.0).min(1.0) * 100.0,
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::{DayLog, Flow};
  use crate::test_utils;
  use chrono::Utc;

  #[tokio::test]
  async fn test_insights_with_no_history() {
    let pool = test_utils::setup_test_db().await;

    let insights = cycle_insights(&pool, 1, "2024-05-01".parse().unwrap())
      .await
      .unwrap();

    assert_eq!(insights.regularity, RegularityLabel::InsufficientData);
    assert_eq!(insights.prediction_accuracy, 0.0);
    assert!(insights.common_symptoms.is_empty());
    assert_eq!(insights.upcoming, UpcomingPredictions::default());
    assert!(!insights.learning_stats.is_learning);
    assert_eq!(insights.learning_stats.confidence_level, 0.0);

    test_utils::teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_insights_after_learning_pass() {
    let pool = test_utils::setup_test_db().await;
    let user_id = 1;

    test_utils::seed_confirmed_cycles(&pool, user_id, "2024-01-01", &[30, 30, 30]).await;
    let today: NaiveDate = "2024-03-05".parse().unwrap();
    learning::update_learning(&pool, user_id, today, &crate::notify::LogNotifier)
      .await
      .unwrap();

    let insights = cycle_insights(&pool, user_id, today).await.unwrap();

    // Identical lengths cache a regular label.
    assert_eq!(insights.regularity, RegularityLabel::Regular);
    assert!(insights.learning_stats.is_learning);
    assert_eq!(insights.learning_stats.cycles_analyzed, 3);
    assert_eq!(insights.learning_stats.cycle_length_variance, Some(0.0));
    assert_eq!(insights.learning_stats.confidence_level, 50.0);

    // Next predicted period lands one learned cycle after 2024-03-01.
    assert_eq!(
      insights.upcoming.next_period,
      Some("2024-03-31".parse().unwrap())
    );

    test_utils::teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_prediction_accuracy_counts_only_evaluable_days() {
    let pool = test_utils::setup_test_db().await;
    let user_id = 1;
    let generated_at = Utc::now() - Duration::hours(1);

    let log = |date: &str, day_type| DayLog {
      date: date.parse().unwrap(),
      day_type,
      flow: None,
      level: None,
      symptoms: vec![],
      notes: None,
      mood: None,
      energy: None,
      sleep: None,
      intimacy: false,
    };

    // Match, mismatch, and a day that never had a prediction.
    store::confirm_day(
      &pool,
      user_id,
      &log("2024-05-01", DayType::Period),
      Some(DayType::Period),
      Some(generated_at),
      Utc::now(),
    )
    .await
    .unwrap();
    store::confirm_day(
      &pool,
      user_id,
      &log("2024-05-02", DayType::Follicular),
      Some(DayType::Period),
      Some(generated_at),
      Utc::now(),
    )
    .await
    .unwrap();
    store::confirm_day(&pool, user_id, &log("2024-05-03", DayType::Follicular), None, None, Utc::now())
      .await
      .unwrap();

    let insights = cycle_insights(&pool, user_id, "2024-05-04".parse().unwrap())
      .await
      .unwrap();
    // One of two evaluable days matched its prediction.
    assert_eq!(insights.prediction_accuracy, 0.5);

    test_utils::teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_common_symptoms_ranked_with_percentages() {
    let pool = test_utils::setup_test_db().await;
    let user_id = 1;

    let mut entries = vec![
      ("2024-04-01", vec![Symptom::Cramps, Symptom::Fatigue]),
      ("2024-04-02", vec![Symptom::Cramps]),
      ("2024-04-03", vec![Symptom::Cramps, Symptom::Headache]),
      ("2024-04-04", vec![]),
    ];
    // A day outside the six-month window never counts.
    entries.push(("2022-01-01", vec![Symptom::Acne]));

    for (date, symptoms) in entries {
      let log = DayLog {
        date: date.parse().unwrap(),
        day_type: DayType::Period,
        flow: Some(Flow::Medium),
        level: None,
        symptoms,
        notes: None,
        mood: None,
        energy: None,
        sleep: None,
        intimacy: false,
      };
      store::confirm_day(&pool, user_id, &log, None, None, Utc::now())
        .await
        .unwrap();
    }

    let insights = cycle_insights(&pool, user_id, "2024-05-01".parse().unwrap())
      .await
      .unwrap();

    assert_eq!(insights.common_symptoms.len(), 3);
    assert_eq!(insights.common_symptoms[0].symptom, Symptom::Cramps);
    assert_eq!(insights.common_symptoms[0].count, 3);
    assert_eq!(insights.common_symptoms[0].percentage, 75.0);
    assert!(insights
      .common_symptoms
      .iter()
      .all(|s| s.symptom != Symptom::Acne));

    test_utils::teardown_test_db(pool).await;
  }

  fn confirmed_segment(start: &str, len: i64) -> Vec<CycleDay> {
    let start: NaiveDate = start.parse().unwrap();
    (0..len)
      .map(|offset| {
        let day_type = if offset < 5 {
          DayType::Period
        } else {
          DayType::Follicular
        };
        test_utils::mock_confirmed_day(&(start + Duration::days(offset)).to_string(), day_type)
      })
      .collect()
  }

  #[test]
  fn test_regularity_recompute_grades_partial_trailing_segment() {
    // A cycle still in progress counts once it clears the grouper's own
    // fragment cutoff; it does not have to reach full cycle length.
    let mut days = confirmed_segment("2024-03-01", 28);
    days.extend(confirmed_segment("2024-03-29", 18));

    let label = regularity_label(None, &days, "2024-05-01".parse().unwrap());
    // lengths [28, 18], variance 25
    assert_eq!(label, RegularityLabel::Irregular);
  }

  #[test]
  fn test_regularity_recompute_ignores_history_older_than_six_months() {
    let mut days = confirmed_segment("2023-01-01", 40);
    days.extend(confirmed_segment("2024-02-01", 28));
    days.extend(confirmed_segment("2024-02-29", 28));

    let label = regularity_label(None, &days, "2024-05-01".parse().unwrap());
    // Only the two recent 28-day segments are graded; the old 40-day one
    // would otherwise drag the label to irregular.
    assert_eq!(label, RegularityLabel::VeryRegular);
  }

  #[test]
  fn test_upcoming_fertile_window_is_first_contiguous_run() {
    let days: Vec<_> = [
      ("2024-05-02", DayType::Follicular),
      ("2024-05-09", DayType::Fertile),
      ("2024-05-10", DayType::Fertile),
      ("2024-05-11", DayType::Ovulation),
      ("2024-05-12", DayType::Fertile),
      ("2024-05-20", DayType::Luteal),
      ("2024-05-30", DayType::Period),
    ]
    .iter()
    .map(|(date, day_type)| {
      let mut day = test_utils::mock_confirmed_day(date, *day_type);
      day.is_confirmed = false;
      day.is_prediction = true;
      day
    })
    .collect();

    let upcoming = upcoming_predictions(&days);
    assert_eq!(upcoming.next_period, Some("2024-05-30".parse().unwrap()));
    assert_eq!(upcoming.next_ovulation, Some("2024-05-11".parse().unwrap()));
    assert_eq!(
      upcoming.fertile_window,
      Some(DateRange {
        start: "2024-05-09".parse().unwrap(),
        end: "2024-05-12".parse().unwrap(),
      })
    );
  }
}
