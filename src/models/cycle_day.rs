use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// ---------------------------------------------------------------------------
/// Closed vocabularies
/// ---------------------------------------------------------------------------

/// Primary classification of a tracked or predicted day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayType {
  Period,
  Fertile,
  Ovulation,
  Luteal,
  Follicular,
}

impl DayType {
  /// The cycle phase implied by the day type.
  pub fn phase(self) -> Phase {
    match self {
      DayType::Period => Phase::Menstrual,
      DayType::Fertile | DayType::Follicular => Phase::Follicular,
      DayType::Ovulation => Phase::Ovulation,
      DayType::Luteal => Phase::Luteal,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      DayType::Period => "period",
      DayType::Fertile => "fertile",
      DayType::Ovulation => "ovulation",
      DayType::Luteal => "luteal",
      DayType::Follicular => "follicular",
    }
  }
}

impl std::fmt::Display for DayType {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl std::str::FromStr for DayType {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "period" => Ok(Self::Period),
      "fertile" => Ok(Self::Fertile),
      "ovulation" => Ok(Self::Ovulation),
      "luteal" => Ok(Self::Luteal),
      "follicular" => Ok(Self::Follicular),
      _ => Err(format!("Unknown day type: {}", s)),
    }
  }
}

/// Menstrual flow intensity, ordered lightest to heaviest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
  Spotting,
  Light,
  Medium,
  Heavy,
}

impl Flow {
  pub fn as_str(self) -> &'static str {
    match self {
      Flow::Spotting => "spotting",
      Flow::Light => "light",
      Flow::Medium => "medium",
      Flow::Heavy => "heavy",
    }
  }
}

impl std::fmt::Display for Flow {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl std::str::FromStr for Flow {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "spotting" => Ok(Self::Spotting),
      "light" => Ok(Self::Light),
      "medium" => Ok(Self::Medium),
      "heavy" => Ok(Self::Heavy),
      _ => Err(format!("Unknown flow: {}", s)),
    }
  }
}

/// Fertility level for fertile-window days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FertileLevel {
  Low,
  Medium,
  High,
  Peak,
}

impl FertileLevel {
  pub fn as_str(self) -> &'static str {
    match self {
      FertileLevel::Low => "low",
      FertileLevel::Medium => "medium",
      FertileLevel::High => "high",
      FertileLevel::Peak => "peak",
    }
  }
}

impl std::fmt::Display for FertileLevel {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl std::str::FromStr for FertileLevel {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "low" => Ok(Self::Low),
      "medium" => Ok(Self::Medium),
      "high" => Ok(Self::High),
      "peak" => Ok(Self::Peak),
      _ => Err(format!("Unknown fertile level: {}", s)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  Menstrual,
  Follicular,
  Ovulation,
  Luteal,
}

impl Phase {
  pub fn as_str(self) -> &'static str {
    match self {
      Phase::Menstrual => "menstrual",
      Phase::Follicular => "follicular",
      Phase::Ovulation => "ovulation",
      Phase::Luteal => "luteal",
    }
  }
}

impl std::fmt::Display for Phase {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl std::str::FromStr for Phase {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "menstrual" => Ok(Self::Menstrual),
      "follicular" => Ok(Self::Follicular),
      "ovulation" => Ok(Self::Ovulation),
      "luteal" => Ok(Self::Luteal),
      _ => Err(format!("Unknown phase: {}", s)),
    }
  }
}

/// Symptom tags a user can attach to a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symptom {
  Cramps,
  Bloating,
  Headache,
  MoodSwings,
  Fatigue,
  TenderBreasts,
  Acne,
  Nausea,
  BackPain,
  Cravings,
  Irritability,
  Anxiety,
  IncreasedEnergy,
  DecreasedEnergy,
}

impl Symptom {
  pub fn as_str(self) -> &'static str {
    match self {
      Symptom::Cramps => "cramps",
      Symptom::Bloating => "bloating",
      Symptom::Headache => "headache",
      Symptom::MoodSwings => "mood_swings",
      Symptom::Fatigue => "fatigue",
      Symptom::TenderBreasts => "tender_breasts",
      Symptom::Acne => "acne",
      Symptom::Nausea => "nausea",
      Symptom::BackPain => "back_pain",
      Symptom::Cravings => "cravings",
      Symptom::Irritability => "irritability",
      Symptom::Anxiety => "anxiety",
      Symptom::IncreasedEnergy => "increased_energy",
      Symptom::DecreasedEnergy => "decreased_energy",
    }
  }
}

impl std::fmt::Display for Symptom {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
  Great,
  Good,
  Okay,
  Low,
  Terrible,
}

impl std::fmt::Display for Mood {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      Mood::Great => "great",
      Mood::Good => "good",
      Mood::Okay => "okay",
      Mood::Low => "low",
      Mood::Terrible => "terrible",
    };
    write!(f, "{}", s)
  }
}

impl std::str::FromStr for Mood {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "great" => Ok(Self::Great),
      "good" => Ok(Self::Good),
      "okay" => Ok(Self::Okay),
      "low" => Ok(Self::Low),
      "terrible" => Ok(Self::Terrible),
      _ => Err(format!("Unknown mood: {}", s)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Energy {
  VeryHigh,
  High,
  Normal,
  Low,
  VeryLow,
}

impl std::fmt::Display for Energy {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      Energy::VeryHigh => "very_high",
      Energy::High => "high",
      Energy::Normal => "normal",
      Energy::Low => "low",
      Energy::VeryLow => "very_low",
    };
    write!(f, "{}", s)
  }
}

impl std::str::FromStr for Energy {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "very_high" => Ok(Self::VeryHigh),
      "high" => Ok(Self::High),
      "normal" => Ok(Self::Normal),
      "low" => Ok(Self::Low),
      "very_low" => Ok(Self::VeryLow),
      _ => Err(format!("Unknown energy level: {}", s)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sleep {
  Excellent,
  Good,
  Fair,
  Poor,
  Terrible,
}

impl std::fmt::Display for Sleep {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      Sleep::Excellent => "excellent",
      Sleep::Good => "good",
      Sleep::Fair => "fair",
      Sleep::Poor => "poor",
      Sleep::Terrible => "terrible",
    };
    write!(f, "{}", s)
  }
}

impl std::str::FromStr for Sleep {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "excellent" => Ok(Self::Excellent),
      "good" => Ok(Self::Good),
      "fair" => Ok(Self::Fair),
      "poor" => Ok(Self::Poor),
      "terrible" => Ok(Self::Terrible),
      _ => Err(format!("Unknown sleep quality: {}", s)),
    }
  }
}

/// ---------------------------------------------------------------------------
/// Records
/// ---------------------------------------------------------------------------

/// One row per (user, calendar date). A day starts life as a prediction
/// (is_prediction, confidence set) and becomes confirmed in place when the
/// user logs actual data; `predicted_type` keeps what was forecast so
/// prediction accuracy can be scored later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleDay {
  pub id: i64,
  pub user_id: i64,
  pub date: NaiveDate,
  pub day_type: DayType,
  pub flow: Option<Flow>,
  pub level: Option<FertileLevel>,
  pub cycle_day: Option<i64>,
  pub phase: Option<Phase>,
  pub symptoms: Vec<Symptom>,
  pub notes: Option<String>,
  pub mood: Option<Mood>,
  pub energy: Option<Energy>,
  pub sleep: Option<Sleep>,
  pub intimacy: bool,
  pub is_prediction: bool,
  pub is_confirmed: bool,
  pub confidence: Option<f64>,
  pub predicted_type: Option<DayType>,
  pub confirmed_at: Option<DateTime<Utc>>,
  pub generated_at: Option<DateTime<Utc>>,
  pub created_at: Option<DateTime<Utc>>,
}

/// User-entered data for confirming a day (without prediction metadata)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayLog {
  pub date: NaiveDate,
  pub day_type: DayType,
  pub flow: Option<Flow>,
  pub level: Option<FertileLevel>,
  #[serde(default)]
  pub symptoms: Vec<Symptom>,
  pub notes: Option<String>,
  pub mood: Option<Mood>,
  pub energy: Option<Energy>,
  pub sleep: Option<Sleep>,
  #[serde(default)]
  pub intimacy: bool,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_day_type_phase_mapping() {
    assert_eq!(DayType::Period.phase(), Phase::Menstrual);
    assert_eq!(DayType::Fertile.phase(), Phase::Follicular);
    assert_eq!(DayType::Follicular.phase(), Phase::Follicular);
    assert_eq!(DayType::Ovulation.phase(), Phase::Ovulation);
    assert_eq!(DayType::Luteal.phase(), Phase::Luteal);
  }

  #[test]
  fn test_enum_string_roundtrip() {
    for ty in [
      DayType::Period,
      DayType::Fertile,
      DayType::Ovulation,
      DayType::Luteal,
      DayType::Follicular,
    ] {
      assert_eq!(ty.to_string().parse::<DayType>().unwrap(), ty);
    }
    for flow in [Flow::Spotting, Flow::Light, Flow::Medium, Flow::Heavy] {
      assert_eq!(flow.to_string().parse::<Flow>().unwrap(), flow);
    }
  }

  #[test]
  fn test_unknown_value_rejected() {
    assert!("predicted-period".parse::<DayType>().is_err());
    assert!("gushing".parse::<Flow>().is_err());
  }

  #[test]
  fn test_flow_ordering_lightest_first() {
    assert!(Flow::Spotting < Flow::Light);
    assert!(Flow::Light < Flow::Medium);
    assert!(Flow::Medium < Flow::Heavy);
  }

  #[test]
  fn test_symptoms_serialize_snake_case() {
    let json = serde_json::to_string(&vec![Symptom::MoodSwings, Symptom::BackPain]).unwrap();
    assert_eq!(json, r#"["mood_swings","back_pain"]"#);
  }
}
