//! Personal (static) factors
//!
//! Age, BMI and sex shape the personal baseline wave length once per day;
//! they are never applied per meal. The insulin-resistance score combines
//! them with the day's sleep and stress.

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_BASE_HOURS;
use crate::types::{Profile, Sex};

const MIN_BASELINE_HOURS: f64 = 1.5;
const MAX_BASELINE_HOURS: f64 = 4.5;

pub fn age_bonus(age: Option<f64>) -> f64 {
    match age {
        Some(a) if a >= 70.0 => 0.40,
        Some(a) if a >= 60.0 => 0.25,
        Some(a) if a >= 45.0 => 0.12,
        Some(a) if a >= 30.0 => 0.06,
        _ => 0.0,
    }
}

pub fn bmi_bonus(bmi: Option<f64>) -> f64 {
    match bmi {
        Some(b) if b >= 30.0 => 0.20,
        Some(b) if b >= 25.0 => 0.10,
        _ => 0.0,
    }
}

pub fn sex_bonus(sex: Option<Sex>) -> f64 {
    match sex {
        Some(Sex::Male) => 0.05,
        Some(Sex::Female) => -0.05,
        None => 0.0,
    }
}

/// Per-user default wave length
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalBaseline {
    /// Baseline wave length (hours), within 1.5..=4.5
    pub hours: f64,
    /// Deviation from the 3 h population default
    pub delta: f64,
    pub bmi: Option<f64>,
    pub age_bonus: f64,
    pub bmi_bonus: f64,
    pub sex_bonus: f64,
}

impl Default for PersonalBaseline {
    fn default() -> Self {
        Self {
            hours: DEFAULT_BASE_HOURS,
            delta: 0.0,
            bmi: None,
            age_bonus: 0.0,
            bmi_bonus: 0.0,
            sex_bonus: 0.0,
        }
    }
}

impl PersonalBaseline {
    pub fn from_profile(profile: &Profile) -> Self {
        let bmi = profile.bmi();
        let mut hours = DEFAULT_BASE_HOURS;

        if let Some(age) = profile.age.filter(|a| a.is_finite() && *a > 30.0) {
            hours += 0.004 * (age - 30.0);
        }

        if let Some(bmi) = bmi {
            if bmi > 25.0 {
                hours += 0.015 * (bmi - 25.0);
            } else {
                hours += (-0.5 * 0.015 * (25.0 - bmi)).max(-0.10);
            }
        }

        hours += match profile.sex {
            Some(Sex::Female) => -0.05,
            Some(Sex::Male) => 0.03,
            None => 0.0,
        };

        let hours = hours.clamp(MIN_BASELINE_HOURS, MAX_BASELINE_HOURS);
        Self {
            hours,
            delta: hours - DEFAULT_BASE_HOURS,
            bmi,
            age_bonus: age_bonus(profile.age),
            bmi_bonus: bmi_bonus(bmi),
            sex_bonus: sex_bonus(profile.sex),
        }
    }
}

/// Insulin-resistance level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IrLevel {
    Optimal,
    Moderate,
    Elevated,
    High,
}

impl IrLevel {
    pub fn from_score(score: f64) -> Self {
        if score <= 1.1 {
            Self::Optimal
        } else if score <= 1.25 {
            Self::Moderate
        } else if score <= 1.5 {
            Self::Elevated
        } else {
            Self::High
        }
    }
}

/// Insulin-resistance score (1.0 = fully sensitive)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrScore {
    pub score: f64,
    pub level: IrLevel,
    pub bmi_factor: f64,
    pub sleep_factor: f64,
    pub stress_factor: f64,
    pub age_factor: f64,
}

impl Default for IrScore {
    fn default() -> Self {
        Self {
            score: 1.0,
            level: IrLevel::Optimal,
            bmi_factor: 1.0,
            sleep_factor: 1.0,
            stress_factor: 1.0,
            age_factor: 1.0,
        }
    }
}

impl IrScore {
    /// Score from the profile and the day's sleep/stress; missing inputs count
    /// as optimal.
    pub fn compute(profile: &Profile, sleep_hours: Option<f64>, stress: Option<f64>) -> Self {
        let bmi_factor = match profile.bmi() {
            Some(b) if b < 25.0 => 1.0,
            Some(b) if b < 30.0 => 1.1,
            Some(b) if b < 35.0 => 1.25,
            Some(_) => 1.4,
            None => 1.0,
        };
        let sleep_factor = match sleep_hours.filter(|h| *h > 0.0) {
            Some(h) if h >= 7.0 => 1.0,
            Some(h) if h >= 6.0 => 1.05,
            Some(_) => 1.15,
            None => 1.0,
        };
        let stress_factor = match stress {
            Some(s) if s <= 3.0 => 1.0,
            Some(s) if s <= 6.0 => 1.08,
            Some(_) => 1.15,
            None => 1.0,
        };
        let age_factor = match profile.age {
            Some(a) if a < 30.0 => 1.0,
            Some(a) if a < 45.0 => 1.06,
            Some(a) if a < 60.0 => 1.12,
            Some(_) => 1.25,
            None => 1.0,
        };

        let raw: f64 = bmi_factor * sleep_factor * stress_factor * age_factor;
        let score = (raw * 1000.0).round() / 1000.0;
        Self {
            score,
            level: IrLevel::from_score(score),
            bmi_factor,
            sleep_factor,
            stress_factor,
            age_factor,
        }
    }
}
