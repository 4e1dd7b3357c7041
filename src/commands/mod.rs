pub mod days;
pub mod predictions;

pub use days::{
  bulk_update_cycle_days, delete_cycle_day, get_cycle_days, get_current_cycle,
  get_today_cycle_day, upsert_cycle_day,
};
pub use predictions::{get_cycle_insights, initialize_cycle};
