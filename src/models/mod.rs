pub mod cycle_day;
pub mod profile;

pub use cycle_day::{
  CycleDay, DayLog, DayType, Energy, FertileLevel, Flow, Mood, Phase, Sleep, Symptom,
};
pub use profile::{
  Averages, LearningData, Regularity, UserCycleProfile, CYCLE_LENGTH_BOUNDS, PERIOD_LENGTH_BOUNDS,
};
