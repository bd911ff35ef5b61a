//! Metabolic and behavioral factors
//!
//! Day-level context (sleep, stress, hydration, cycle), fasting, supplements,
//! cold exposure, meal stacking and the circadian rhythm.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::clock::{parse_hhmm, DAY_START_MINUTES, MINUTES_PER_DAY};
use crate::types::{ColdExposure, ColdExposureKind, Supplement};

/// Default wake time when the day carries none (07:00)
pub const DEFAULT_WAKE_MINUTES: i64 = 7 * 60;

/// Default sleep length when the day carries none
pub const DEFAULT_SLEEP_HOURS: f64 = 7.0;

/// Assumed gap between the last evening meal and sleep onset
const PRE_SLEEP_FASTING_HOURS: f64 = 2.0;

/// Cold exposure only counts within this window before the meal
const COLD_EXPOSURE_WINDOW_MINUTES: i64 = 5 * 60;

/// Hydration goal per kg of body weight (ml)
const WATER_ML_PER_KG: f64 = 30.0;

pub fn fasting_bonus(hours: f64) -> f64 {
    if !hours.is_finite() {
        0.0
    } else if hours >= 16.0 {
        -0.15
    } else if hours >= 12.0 {
        -0.10
    } else if hours >= 8.0 {
        -0.05
    } else {
        0.0
    }
}

/// Fasting hours before the first meal of the day.
///
/// Time awake before the meal, plus the night's sleep, plus the usual gap
/// between dinner and bedtime.
pub fn first_meal_fasting_hours(
    meal_minutes: i64,
    wake_minutes: Option<i64>,
    sleep_hours: Option<f64>,
) -> f64 {
    let wake = wake_minutes.unwrap_or(DEFAULT_WAKE_MINUTES);
    let sleep = sleep_hours
        .filter(|h| h.is_finite() && *h > 0.0)
        .unwrap_or(DEFAULT_SLEEP_HOURS);
    let awake = ((meal_minutes - wake).max(0)) as f64 / 60.0;
    awake + sleep + PRE_SLEEP_FASTING_HOURS
}

pub fn spicy_multiplier(spicy: bool) -> f64 {
    if spicy {
        0.96
    } else {
        1.0
    }
}

pub fn caffeine_bonus(caffeine: bool) -> f64 {
    if caffeine {
        0.06
    } else {
        0.0
    }
}

pub fn stress_bonus(stress: Option<f64>) -> f64 {
    match stress {
        Some(s) if s >= 7.0 => 0.15,
        Some(s) if s >= 5.0 => 0.08,
        _ => 0.0,
    }
}

pub fn sleep_bonus(sleep_hours: Option<f64>) -> f64 {
    match sleep_hours {
        Some(h) if h > 0.0 && h < 4.0 => 0.20,
        Some(h) if h > 0.0 && h < 5.0 => 0.15,
        Some(h) if h > 0.0 && h < 6.0 => 0.08,
        _ => 0.0,
    }
}

pub fn sleep_quality_bonus(quality: Option<f64>) -> f64 {
    match quality {
        Some(q) if q > 0.0 && q <= 4.0 => 0.08,
        Some(q) if q > 0.0 && q <= 6.0 => 0.04,
        _ => 0.0,
    }
}

/// Dehydration bonus against a goal of 30 ml per kg
pub fn hydration_bonus(water_ml: Option<f64>, weight_kg: f64) -> f64 {
    let Some(water) = water_ml.filter(|w| w.is_finite()) else {
        return 0.0;
    };
    let goal = weight_kg * WATER_ML_PER_KG;
    if goal <= 0.0 {
        return 0.0;
    }
    let share = water / goal;
    if share < 0.3 {
        0.08
    } else if share < 0.5 {
        0.05
    } else if share < 0.7 {
        0.03
    } else {
        0.0
    }
}

pub fn trans_fat_bonus(trans_fat: f64) -> f64 {
    if trans_fat >= 2.0 {
        0.15
    } else if trans_fat >= 1.0 {
        0.08
    } else if trans_fat >= 0.5 {
        0.04
    } else {
        0.0
    }
}

/// Menstrual cycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Menstrual,
    Follicular,
    Ovulation,
}

impl CyclePhase {
    pub fn from_day(day: u32) -> Option<Self> {
        match day {
            1..=5 => Some(Self::Menstrual),
            6..=12 => Some(Self::Follicular),
            13..=14 => Some(Self::Ovulation),
            _ => None,
        }
    }

    pub fn multiplier(self) -> f64 {
        match self {
            Self::Menstrual => 1.12,
            Self::Follicular => 0.95,
            Self::Ovulation => 0.92,
        }
    }
}

/// Cycle bonus: only the excess of the phase multiplier over 1.0
pub fn cycle_bonus(cycle_day: Option<u32>) -> f64 {
    cycle_day
        .and_then(CyclePhase::from_day)
        .map(|phase| (phase.multiplier() - 1.0).max(0.0))
        .unwrap_or(0.0)
}

/// Phase of extended fasting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutophagyPhase {
    None,
    Early,
    Active,
    Deep,
    Extended,
}

impl AutophagyPhase {
    pub fn from_hours(hours: f64) -> Self {
        if hours >= 48.0 {
            Self::Extended
        } else if hours >= 24.0 {
            Self::Deep
        } else if hours >= 16.0 {
            Self::Active
        } else if hours >= 12.0 {
            Self::Early
        } else {
            Self::None
        }
    }

    /// Hour range of the phase; extended has no upper bound
    fn bounds(self) -> (f64, Option<f64>) {
        match self {
            Self::None => (0.0, Some(12.0)),
            Self::Early => (12.0, Some(16.0)),
            Self::Active => (16.0, Some(24.0)),
            Self::Deep => (24.0, Some(48.0)),
            Self::Extended => (48.0, None),
        }
    }

    /// Insulin sensitivity gain, applied as a negative bonus
    pub fn sensitivity(self) -> f64 {
        match self {
            Self::None => 0.0,
            Self::Early => 0.05,
            Self::Active => 0.10,
            Self::Deep => 0.15,
            Self::Extended => 0.18,
        }
    }
}

/// Autophagy timer state for the current fast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutophagyState {
    pub phase: AutophagyPhase,
    /// Hours fasted so far
    pub hours: f64,
    /// Progress through the current phase (0-100)
    pub progress: f64,
    /// Hours until the next phase, if any
    pub hours_to_next: Option<f64>,
    pub bonus: f64,
}

impl AutophagyState {
    pub fn from_hours(hours: f64) -> Self {
        let hours = if hours.is_finite() { hours.max(0.0) } else { 0.0 };
        let phase = AutophagyPhase::from_hours(hours);
        let (start, end) = phase.bounds();
        let (progress, hours_to_next) = match end {
            Some(end) => (
                ((hours - start) / (end - start) * 100.0).clamp(0.0, 100.0),
                Some(end - hours),
            ),
            None => (100.0, None),
        };
        Self {
            phase,
            hours: (hours * 10.0).round() / 10.0,
            progress: progress.round(),
            hours_to_next: hours_to_next.map(|h| (h * 10.0).round() / 10.0),
            bonus: -phase.sensitivity(),
        }
    }
}

pub fn autophagy_bonus(fasting_hours: Option<f64>) -> f64 {
    fasting_hours
        .filter(|h| h.is_finite())
        .map(|h| -AutophagyPhase::from_hours(h).sensitivity())
        .unwrap_or(0.0)
}

/// Cold exposure bonus when it happened within 5 h before the meal
pub fn cold_exposure_bonus(exposure: Option<&ColdExposure>, meal_minutes: i64) -> f64 {
    let Some(exposure) = exposure else {
        return 0.0;
    };
    if let Some(time) = exposure.time.as_deref() {
        let Ok(at) = parse_hhmm(time) else {
            return 0.0;
        };
        let before = meal_minutes - at;
        if !(0..=COLD_EXPOSURE_WINDOW_MINUTES).contains(&before) {
            return 0.0;
        }
    }
    match exposure.kind {
        ColdExposureKind::Shower => -0.05,
        ColdExposureKind::Bath => -0.10,
        ColdExposureKind::Swim => -0.12,
    }
}

pub fn supplement_bonus(supplement: Supplement) -> f64 {
    match supplement {
        Supplement::Vinegar => -0.20,
        Supplement::Cinnamon => -0.10,
        Supplement::Berberine => -0.15,
    }
}

/// Summed supplement bonus; a supplement listed twice counts once
pub fn supplements_bonus(supplements: &[Supplement]) -> f64 {
    let mut seen: Vec<Supplement> = Vec::with_capacity(supplements.len());
    for supplement in supplements {
        if !seen.contains(supplement) {
            seen.push(*supplement);
        }
    }
    seen.into_iter().map(supplement_bonus).sum()
}

/// Second-meal effect: eating into a still-running wave blunts the new one.
pub fn meal_stacking_bonus(overlap_minutes: f64, previous_gl: f64) -> f64 {
    let mut overlap = overlap_minutes;
    if overlap < -(MINUTES_PER_DAY as f64) / 2.0 {
        overlap += MINUTES_PER_DAY as f64;
    }
    if !overlap.is_finite() || overlap <= 0.0 || !previous_gl.is_finite() || previous_gl <= 0.0 {
        return 0.0;
    }
    let overlap_weight = (overlap / 90.0 * 0.5).min(1.0);
    let gl_weight = (previous_gl / 30.0).min(1.2);
    (overlap_weight * gl_weight * -0.15).max(-0.15)
}

/// Circadian sensitivity multiplier: lowest at 08:00, highest at 20:00
pub fn circadian_multiplier(hour: f64) -> f64 {
    if !hour.is_finite() {
        return 1.0;
    }
    1.025 - 0.175 * ((hour - 8.0) / 24.0 * 2.0 * PI).cos()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircadianPeriod {
    Night,
    EarlyMorning,
    PeakMorning,
    Midday,
    Afternoon,
    Evening,
    LateEvening,
}

impl CircadianPeriod {
    pub fn from_hour(hour: f64) -> Self {
        if !(5.0..22.0).contains(&hour) {
            Self::Night
        } else if hour < 7.0 {
            Self::EarlyMorning
        } else if hour < 10.0 {
            Self::PeakMorning
        } else if hour < 14.0 {
            Self::Midday
        } else if hour < 18.0 {
            Self::Afternoon
        } else if hour < 21.0 {
            Self::Evening
        } else {
            Self::LateEvening
        }
    }
}

/// Hours between two meals, across the 03:00 day boundary when needed
pub fn hours_between(previous_minutes: i64, current_minutes: i64) -> f64 {
    let mut gap = current_minutes - previous_minutes;
    if gap < 0 && current_minutes < DAY_START_MINUTES {
        gap += MINUTES_PER_DAY;
    }
    gap.max(0) as f64 / 60.0
}
