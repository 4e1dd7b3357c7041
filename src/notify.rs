//! Notification scheduling seam.
//!
//! The core never talks to a delivery channel directly; it hands freshly
//! generated predictions to a `Notifier` and treats failures as best-effort.

use thiserror::Error;

use crate::prediction::Prediction;

#[derive(Debug, Error)]
pub enum NotifyError {
  #[error("Notification scheduling failed: {0}")]
  Schedule(String),
}

/// Downstream scheduler for cycle reminders. Implementations receive the
/// full prediction batch after every (re)generation and decide what to
/// schedule from it.
pub trait Notifier: Send + Sync {
  fn schedule(&self, user_id: i64, predictions: &[Prediction]) -> Result<(), NotifyError>;
}

/// Default notifier: logs the batch and schedules nothing.
pub struct LogNotifier;

impl Notifier for LogNotifier {
  fn schedule(&self, user_id: i64, predictions: &[Prediction]) -> Result<(), NotifyError> {
    tracing::debug!(
      user_id,
      count = predictions.len(),
      "predictions available for notification scheduling"
    );
    Ok(())
  }
}
