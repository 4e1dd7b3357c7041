//! Cycle day and profile stores over SQLite.
//!
//! The unique index on (user_id, date) is the only concurrency guard:
//! concurrent writes to the same day collapse into last-writer-wins upserts.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::models::{CycleDay, DayLog, DayType, LearningData, UserCycleProfile};
use crate::prediction::Prediction;

/// ---------------------------------------------------------------------------
/// Row decoding
/// ---------------------------------------------------------------------------

fn parse_opt<T: std::str::FromStr<Err = String>>(
  value: Option<String>,
  column: &str,
) -> Result<Option<T>, String> {
  match value {
    Some(s) => s
      .parse::<T>()
      .map(Some)
      .map_err(|e| format!("Bad {} in store: {}", column, e)),
    None => Ok(None),
  }
}

fn day_from_row(row: &SqliteRow) -> Result<CycleDay, String> {
  let day_type: String = row.get("day_type");
  let symptoms_json: String = row.get("symptoms_json");

  Ok(CycleDay {
    id: row.get("id"),
    user_id: row.get("user_id"),
    date: row.get("date"),
    day_type: day_type
      .parse()
      .map_err(|e| format!("Bad day_type in store: {}", e))?,
    flow: parse_opt(row.get("flow"), "flow")?,
    level: parse_opt(row.get("level"), "level")?,
    cycle_day: row.get("cycle_day"),
    phase: parse_opt(row.get("phase"), "phase")?,
    symptoms: serde_json::from_str(&symptoms_json)
      .map_err(|e| format!("Bad symptoms in store: {}", e))?,
    notes: row.get("notes"),
    mood: parse_opt(row.get("mood"), "mood")?,
    energy: parse_opt(row.get("energy"), "energy")?,
    sleep: parse_opt(row.get("sleep"), "sleep")?,
    intimacy: row.get("intimacy"),
    is_prediction: row.get("is_prediction"),
    is_confirmed: row.get("is_confirmed"),
    confidence: row.get("confidence"),
    predicted_type: parse_opt(row.get("predicted_type"), "predicted_type")?,
    confirmed_at: row.get("confirmed_at"),
    generated_at: row.get("generated_at"),
    created_at: row.get("created_at"),
  })
}

/// ---------------------------------------------------------------------------
/// Cycle Day Store
/// ---------------------------------------------------------------------------

/// Optional filters for range queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct DayFilter {
  pub is_confirmed: Option<bool>,
  pub is_prediction: Option<bool>,
  pub day_type: Option<DayType>,
}

impl DayFilter {
  pub fn confirmed() -> Self {
    Self {
      is_confirmed: Some(true),
      ..Default::default()
    }
  }

  pub fn predictions() -> Self {
    Self {
      is_prediction: Some(true),
      ..Default::default()
    }
  }
}

pub async fn find_day(
  pool: &SqlitePool,
  user_id: i64,
  date: NaiveDate,
) -> Result<Option<CycleDay>, String> {
  let row = sqlx::query("SELECT * FROM cycle_days WHERE user_id = ?1 AND date = ?2")
    .bind(user_id)
    .bind(date)
    .fetch_optional(pool)
    .await
    .map_err(|e| format!("Failed to fetch cycle day: {}", e))?;

  row.as_ref().map(day_from_row).transpose()
}

/// All days for a user within the optional date bounds, ascending by date.
pub async fn find_range(
  pool: &SqlitePool,
  user_id: i64,
  from: Option<NaiveDate>,
  to: Option<NaiveDate>,
  filter: &DayFilter,
) -> Result<Vec<CycleDay>, String> {
  let mut sql = String::from("SELECT * FROM cycle_days WHERE user_id = ?");
  if from.is_some() {
    sql.push_str(" AND date >= ?");
  }
  if to.is_some() {
    sql.push_str(" AND date <= ?");
  }
  if filter.is_confirmed.is_some() {
    sql.push_str(" AND is_confirmed = ?");
  }
  if filter.is_prediction.is_some() {
    sql.push_str(" AND is_prediction = ?");
  }
  if filter.day_type.is_some() {
    sql.push_str(" AND day_type = ?");
  }
  sql.push_str(" ORDER BY date ASC");

  let mut query = sqlx::query(&sql).bind(user_id);
  if let Some(from) = from {
    query = query.bind(from);
  }
  if let Some(to) = to {
    query = query.bind(to);
  }
  if let Some(confirmed) = filter.is_confirmed {
    query = query.bind(confirmed);
  }
  if let Some(prediction) = filter.is_prediction {
    query = query.bind(prediction);
  }
  if let Some(day_type) = filter.day_type {
    query = query.bind(day_type.as_str());
  }

  let rows = query
    .fetch_all(pool)
    .await
    .map_err(|e| format!("Failed to fetch cycle days: {}", e))?;

  rows.iter().map(day_from_row).collect()
}

/// Upsert a confirmed day. When the caller is replacing a prediction row it
/// passes that prediction's type and generated_at so they survive the
/// overwrite; exactly one row exists per (user, date) afterwards.
pub async fn confirm_day(
  pool: &SqlitePool,
  user_id: i64,
  log: &DayLog,
  predicted_type: Option<DayType>,
  generated_at: Option<DateTime<Utc>>,
  confirmed_at: DateTime<Utc>,
) -> Result<CycleDay, String> {
  let symptoms_json = serde_json::to_string(&log.symptoms)
    .map_err(|e| format!("Failed to encode symptoms: {}", e))?;
  let phase = log.day_type.phase();

  sqlx::query(
    r#"
    INSERT INTO cycle_days (
      user_id, date, day_type, flow, level, phase, symptoms_json, notes,
      mood, energy, sleep, intimacy,
      is_prediction, is_confirmed, confidence,
      predicted_type, confirmed_at, generated_at, created_at, updated_at
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 0, 1, 1.0, ?13, ?14, ?15, ?16, ?16)
    ON CONFLICT(user_id, date) DO UPDATE SET
      day_type = excluded.day_type,
      flow = excluded.flow,
      level = excluded.level,
      phase = excluded.phase,
      symptoms_json = excluded.symptoms_json,
      notes = excluded.notes,
      mood = excluded.mood,
      energy = excluded.energy,
      sleep = excluded.sleep,
      intimacy = excluded.intimacy,
      is_prediction = 0,
      is_confirmed = 1,
      confidence = 1.0,
      predicted_type = excluded.predicted_type,
      confirmed_at = excluded.confirmed_at,
      generated_at = excluded.generated_at,
      updated_at = excluded.updated_at
    "#,
  )
  .bind(user_id)
  .bind(log.date)
  .bind(log.day_type.as_str())
  .bind(log.flow.map(|f| f.as_str()))
  .bind(log.level.map(|l| l.as_str()))
  .bind(phase.as_str())
  .bind(&symptoms_json)
  .bind(&log.notes)
  .bind(log.mood.map(|m| m.to_string()))
  .bind(log.energy.map(|e| e.to_string()))
  .bind(log.sleep.map(|s| s.to_string()))
  .bind(log.intimacy)
  .bind(predicted_type.map(|t| t.as_str()))
  .bind(confirmed_at)
  .bind(generated_at)
  .bind(Utc::now())
  .execute(pool)
  .await
  .map_err(|e| format!("Failed to upsert cycle day: {}", e))?;

  find_day(pool, user_id, log.date)
    .await?
    .ok_or_else(|| "Cycle day missing after upsert".to_string())
}

/// Delete a day, returning the removed record if it existed.
pub async fn delete_day(
  pool: &SqlitePool,
  user_id: i64,
  date: NaiveDate,
) -> Result<Option<CycleDay>, String> {
  let existing = find_day(pool, user_id, date).await?;
  if existing.is_none() {
    return Ok(None);
  }

  sqlx::query("DELETE FROM cycle_days WHERE user_id = ?1 AND date = ?2")
    .bind(user_id)
    .bind(date)
    .execute(pool)
    .await
    .map_err(|e| format!("Failed to delete cycle day: {}", e))?;

  Ok(existing)
}

async fn insert_prediction_row(
  conn: &mut sqlx::SqliteConnection,
  user_id: i64,
  p: &Prediction,
  generated_at: DateTime<Utc>,
) -> Result<u64, String> {
  let result = sqlx::query(
    r#"
    INSERT INTO cycle_days (
      user_id, date, day_type, flow, level, cycle_day, phase, symptoms_json,
      is_prediction, is_confirmed, confidence, generated_at, created_at, updated_at
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, '[]', 1, 0, ?8, ?9, ?10, ?10)
    ON CONFLICT(user_id, date) DO NOTHING
    "#,
  )
  .bind(user_id)
  .bind(p.date)
  .bind(p.day_type.as_str())
  .bind(p.flow.map(|f| f.as_str()))
  .bind(p.level.map(|l| l.as_str()))
  .bind(p.cycle_day)
  .bind(p.phase.as_str())
  .bind(p.confidence)
  .bind(generated_at)
  .bind(Utc::now())
  .execute(&mut *conn)
  .await
  .map_err(|e| format!("Failed to insert prediction: {}", e))?;

  Ok(result.rows_affected())
}

/// Persist a batch of generated predictions. A conflicting row means the
/// user already has data for that date; predictions never overwrite it.
pub async fn insert_predictions(
  pool: &SqlitePool,
  user_id: i64,
  predictions: &[Prediction],
  generated_at: DateTime<Utc>,
) -> Result<u64, String> {
  let mut conn = pool
    .acquire()
    .await
    .map_err(|e| format!("Failed to acquire connection: {}", e))?;

  let mut inserted = 0;
  for p in predictions {
    inserted += insert_prediction_row(&mut conn, user_id, p, generated_at).await?;
  }
  Ok(inserted)
}

/// Atomically swap prediction rows for a fresh batch. With `from` set, only
/// predictions dated `from` or later are cleared; without it, all of them.
/// Rows already holding user data keep it (the batch insert skips them).
/// Returns the number of prediction rows written.
pub async fn replace_predictions(
  pool: &SqlitePool,
  user_id: i64,
  from: Option<NaiveDate>,
  predictions: &[Prediction],
  generated_at: DateTime<Utc>,
) -> Result<u64, String> {
  let mut tx = pool
    .begin()
    .await
    .map_err(|e| format!("Failed to begin transaction: {}", e))?;

  let delete = match from {
    Some(from) => {
      sqlx::query("DELETE FROM cycle_days WHERE user_id = ?1 AND is_prediction = 1 AND date >= ?2")
        .bind(user_id)
        .bind(from)
    }
    None => sqlx::query("DELETE FROM cycle_days WHERE user_id = ?1 AND is_prediction = 1")
      .bind(user_id),
  };
  delete
    .execute(&mut *tx)
    .await
    .map_err(|e| format!("Failed to delete predictions: {}", e))?;

  let mut inserted = 0;
  for p in predictions {
    inserted += insert_prediction_row(&mut tx, user_id, p, generated_at).await?;
  }

  tx.commit()
    .await
    .map_err(|e| format!("Failed to commit predictions: {}", e))?;

  Ok(inserted)
}

/// ---------------------------------------------------------------------------
/// User Cycle Profile Store
/// ---------------------------------------------------------------------------

fn profile_from_row(row: &SqliteRow) -> Result<UserCycleProfile, String> {
  let learning_json: String = row.get("learning_data_json");
  let learning: LearningData = serde_json::from_str(&learning_json)
    .map_err(|e| format!("Bad learning data in store: {}", e))?;

  let settings_json: Option<String> = row.get("notification_settings_json");
  let notification_settings = settings_json
    .as_deref()
    .map(serde_json::from_str)
    .transpose()
    .map_err(|e| format!("Bad notification settings in store: {}", e))?;

  Ok(UserCycleProfile {
    user_id: row.get("user_id"),
    cycle_length: row.get("cycle_length"),
    period_length: row.get("period_length"),
    luteal_phase_length: row.get("luteal_phase_length"),
    learning,
    notification_settings,
    last_period_start: row.get("last_period_start"),
    data_points: row.get("data_points"),
    created_at: row.get("created_at"),
    updated_at: row.get("updated_at"),
  })
}

pub async fn load_profile(
  pool: &SqlitePool,
  user_id: i64,
) -> Result<Option<UserCycleProfile>, String> {
  let row = sqlx::query("SELECT * FROM user_profiles WHERE user_id = ?1")
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| format!("Failed to fetch profile: {}", e))?;

  row.as_ref().map(profile_from_row).transpose()
}

/// Load the profile, creating one with default parameters if absent.
pub async fn ensure_profile(pool: &SqlitePool, user_id: i64) -> Result<UserCycleProfile, String> {
  if let Some(profile) = load_profile(pool, user_id).await? {
    return Ok(profile);
  }

  let profile = UserCycleProfile::with_defaults(user_id);
  let learning_json = serde_json::to_string(&profile.learning)
    .map_err(|e| format!("Failed to encode learning data: {}", e))?;

  sqlx::query(
    r#"
    INSERT INTO user_profiles (
      user_id, cycle_length, period_length, luteal_phase_length,
      learning_data_json, data_points, created_at, updated_at
    )
    VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)
    ON CONFLICT(user_id) DO NOTHING
    "#,
  )
  .bind(user_id)
  .bind(profile.cycle_length)
  .bind(profile.period_length)
  .bind(profile.luteal_phase_length)
  .bind(&learning_json)
  .bind(Utc::now())
  .execute(pool)
  .await
  .map_err(|e| format!("Failed to create profile: {}", e))?;

  load_profile(pool, user_id)
    .await?
    .ok_or_else(|| "Profile missing after create".to_string())
}

pub async fn save_profile(pool: &SqlitePool, profile: &UserCycleProfile) -> Result<(), String> {
  let learning_json = serde_json::to_string(&profile.learning)
    .map_err(|e| format!("Failed to encode learning data: {}", e))?;
  let settings_json = profile
    .notification_settings
    .as_ref()
    .map(serde_json::to_string)
    .transpose()
    .map_err(|e| format!("Failed to encode notification settings: {}", e))?;

  sqlx::query(
    r#"
    UPDATE user_profiles SET
      cycle_length = ?1,
      period_length = ?2,
      luteal_phase_length = ?3,
      learning_data_json = ?4,
      notification_settings_json = ?5,
      last_period_start = ?6,
      data_points = ?7,
      updated_at = ?8
    WHERE user_id = ?9
    "#,
  )
  .bind(profile.cycle_length)
  .bind(profile.period_length)
  .bind(profile.luteal_phase_length)
  .bind(&learning_json)
  .bind(settings_json)
  .bind(profile.last_period_start)
  .bind(profile.data_points)
  .bind(Utc::now())
  .bind(profile.user_id)
  .execute(pool)
  .await
  .map_err(|e| format!("Failed to save profile: {}", e))?;

  Ok(())
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
