pub mod commands;
pub mod db;
pub mod insights;
pub mod learning;
pub mod models;
pub mod notify;
pub mod prediction;
pub mod store;

#[cfg(test)]
mod test_utils;

/// Install the global tracing subscriber. Filter via RUST_LOG; defaults to
/// info for this crate.
pub fn init_tracing() {
  use tracing_subscriber::EnvFilter;

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cycle_log=info")),
    )
    .init();
}
