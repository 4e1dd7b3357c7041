use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::sync::Arc;

use crate::notify::{LogNotifier, Notifier};

pub type DbPool = SqlitePool;

/// Application state holding the database connection pool and the
/// notification scheduler handed to the learning engine.
pub struct AppState {
  pub db: DbPool,
  pub notifier: Arc<dyn Notifier>,
}

impl AppState {
  pub fn new(db: DbPool) -> Self {
    Self {
      db,
      notifier: Arc::new(LogNotifier),
    }
  }

  pub fn with_notifier(db: DbPool, notifier: Arc<dyn Notifier>) -> Self {
    Self { db, notifier }
  }
}

/// Database location, overridable via CYCLE_LOG_DATABASE_URL.
/// Defaults to a file next to the working directory.
fn database_url() -> String {
  std::env::var("CYCLE_LOG_DATABASE_URL")
    .unwrap_or_else(|_| "sqlite://cycle-log.db?mode=rwc".to_string())
}

/// Initialize the database connection pool and run migrations
pub async fn initialize_db() -> Result<DbPool, Box<dyn std::error::Error>> {
  // Load environment variables from .env file
  dotenvy::dotenv().ok();

  let db_url = database_url();
  tracing::info!("Initializing database at: {}", db_url);

  // Create connection pool
  let pool = SqlitePoolOptions::new()
    .max_connections(5)
    .connect(&db_url)
    .await?;

  // Run migrations
  sqlx::migrate!("./migrations").run(&pool).await?;

  tracing::info!("Database initialized successfully");

  Ok(pool)
}
