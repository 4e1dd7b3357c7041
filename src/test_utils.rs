//! Test utilities and helpers for integration and unit testing
//!
//! This module provides common test infrastructure including:
//! - Database setup/teardown
//! - Mock data factories
//! - Seeded cycle histories
//! - A notifier that records what it was asked to schedule

use std::sync::Mutex;

use chrono::{Duration, NaiveDate, Utc};
use sqlx::SqlitePool;

use crate::models::{CycleDay, DayLog, DayType, Flow};
use crate::notify::{Notifier, NotifyError};
use crate::prediction::Prediction;
use crate::store;

/// ---------------------------------------------------------------------------
/// Database Test Utilities
/// ---------------------------------------------------------------------------

/// Create an in-memory SQLite database for testing
/// Runs all migrations and returns a ready-to-use pool
///
/// Uses max_connections(1) to prevent multiple pool connections from creating
/// isolated in-memory databases, which would cause intermittent test failures
pub async fn setup_test_db() -> SqlitePool {
  let pool = sqlx::sqlite::SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .expect("Failed to create in-memory database");

  // Run migrations
  sqlx::migrate!("./migrations")
    .run(&pool)
    .await
    .expect("Failed to run migrations");

  pool
}

/// Close a test database pool
pub async fn teardown_test_db(pool: SqlitePool) {
  pool.close().await;
}

/// Seed consecutive confirmed cycles starting at `first_start`, one cycle per
/// entry in `lengths`. Each cycle logs period on days 1-5 (flow light, heavy,
/// heavy, medium, medium), ovulation on day 14, follicular before it and
/// luteal after. Returns the start date of the final cycle.
pub async fn seed_confirmed_cycles(
  pool: &SqlitePool,
  user_id: i64,
  first_start: &str,
  lengths: &[i64],
) -> NaiveDate {
  let mut cycle_start: NaiveDate = first_start.parse().expect("bad seed date");
  let mut last_start = cycle_start;

  for &len in lengths {
    last_start = cycle_start;
    for offset in 0..len {
      let day_number = offset + 1;
      let (day_type, flow) = match day_number {
        1 => (DayType::Period, Some(Flow::Light)),
        2 | 3 => (DayType::Period, Some(Flow::Heavy)),
        4 | 5 => (DayType::Period, Some(Flow::Medium)),
        14 => (DayType::Ovulation, None),
        n if n < 14 => (DayType::Follicular, None),
        _ => (DayType::Luteal, None),
      };

      let log = DayLog {
        date: cycle_start + Duration::days(offset),
        day_type,
        flow,
        level: None,
        symptoms: vec![],
        notes: None,
        mood: None,
        energy: None,
        sleep: None,
        intimacy: false,
      };
      store::confirm_day(pool, user_id, &log, None, None, Utc::now())
        .await
        .expect("Failed to seed confirmed day");
    }
    cycle_start += Duration::days(len);
  }

  last_start
}

/// ---------------------------------------------------------------------------
/// Mock Data Factories
/// ---------------------------------------------------------------------------

/// Create a prediction for a single day with a neutral confidence
pub fn mock_prediction(date: &str, day_type: DayType) -> Prediction {
  Prediction {
    date: date.parse().expect("bad mock date"),
    cycle_day: 1,
    day_type,
    phase: day_type.phase(),
    flow: None,
    level: None,
    confidence: 0.8,
  }
}

/// Create a confirmed cycle day record without touching the database
pub fn mock_confirmed_day(date: &str, day_type: DayType) -> CycleDay {
  CycleDay {
    id: 0,
    user_id: 1,
    date: date.parse().expect("bad mock date"),
    day_type,
    flow: None,
    level: None,
    cycle_day: None,
    phase: Some(day_type.phase()),
    symptoms: vec![],
    notes: None,
    mood: None,
    energy: None,
    sleep: None,
    intimacy: false,
    is_prediction: false,
    is_confirmed: true,
    confidence: Some(1.0),
    predicted_type: None,
    confirmed_at: Some(Utc::now()),
    generated_at: None,
    created_at: Some(Utc::now()),
  }
}

/// ---------------------------------------------------------------------------
/// Collecting Notifier
/// ---------------------------------------------------------------------------

/// Notifier that records every batch it receives
#[derive(Default)]
pub struct CollectingNotifier {
  batches: Mutex<Vec<(i64, usize)>>,
}

impl CollectingNotifier {
  /// Number of batches received so far
  pub fn batches(&self) -> usize {
    self.batches.lock().unwrap().len()
  }
}

impl Notifier for CollectingNotifier {
  fn schedule(&self, user_id: i64, predictions: &[Prediction]) -> Result<(), NotifyError> {
    self
      .batches
      .lock()
      .unwrap()
      .push((user_id, predictions.len()));
    Ok(())
  }
}

/// ---------------------------------------------------------------------------
/// Tests for Test Utilities
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_setup_db_creates_schema() {
    let pool = setup_test_db().await;

    // Verify key tables exist
    let tables: Vec<(String,)> = sqlx::query_as(
      "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('cycle_days', 'user_profiles')",
    )
    .fetch_all(&pool)
    .await
    .expect("Failed to query tables");

    assert_eq!(tables.len(), 2, "Expected 2 tables, got {}", tables.len());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_seed_confirmed_cycles_counts_and_last_start() {
    let pool = setup_test_db().await;

    let last_start = seed_confirmed_cycles(&pool, 1, "2024-01-01", &[28, 30]).await;
    assert_eq!(last_start, "2024-01-29".parse().unwrap());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cycle_days WHERE user_id = 1")
      .fetch_one(&pool)
      .await
      .expect("Failed to count days");
    assert_eq!(count, 58);

    let periods: i64 = sqlx::query_scalar(
      "SELECT COUNT(*) FROM cycle_days WHERE user_id = 1 AND day_type = 'period'",
    )
    .fetch_one(&pool)
    .await
    .expect("Failed to count periods");
    assert_eq!(periods, 10);

    teardown_test_db(pool).await;
  }

  #[test]
  fn test_collecting_notifier_records_batches() {
    let notifier = CollectingNotifier::default();
    assert_eq!(notifier.batches(), 0);
    notifier
      .schedule(1, &[mock_prediction("2024-05-01", DayType::Period)])
      .unwrap();
    assert_eq!(notifier.batches(), 1);
  }
}
