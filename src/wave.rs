//! Wave duration and phase model
//!
//! Turns the composed multiplier into a duration, places "now" on the wave
//! (elapsed, remaining, progress, status) and splits the wave into
//! rise → plateau → decline → lipolysis.

use serde::{Deserialize, Serialize};

use crate::clock::{align_now, format_hhmm, is_night_hour};
use crate::types::{round1, NutrientSnapshot, WavePhase, WaveStatus, DEFAULT_WEIGHT_KG};

/// Last-resort wave length (minutes)
pub const FALLBACK_WAVE_MINUTES: f64 = 180.0;

const MIN_RISE_MINUTES: f64 = 10.0;
const MAX_RISE_MINUTES: f64 = 45.0;
const MIN_DECLINE_MINUTES: f64 = 20.0;

/// Fat oxidised per lipolysis minute at the reference weight (kcal)
const LIPOLYSIS_KCAL_PER_MINUTE: f64 = 1.0;

/// Wave length in minutes, with fallbacks for degenerate inputs.
///
/// Never longer than `max_multiplier` personal baselines.
pub fn wave_minutes(
    base_hours: f64,
    final_multiplier: f64,
    personal_base_hours: f64,
    max_multiplier: f64,
) -> f64 {
    let minutes = base_hours * final_multiplier * 60.0;
    let personal = personal_base_hours * 60.0;
    if minutes.is_finite() && minutes > 0.0 {
        let ceiling = personal * max_multiplier;
        if ceiling.is_finite() && ceiling > 0.0 && minutes > ceiling {
            tracing::debug!(minutes, ceiling, "wave capped at personal ceiling");
            return ceiling;
        }
        return minutes;
    }
    if personal.is_finite() && personal > 0.0 {
        tracing::warn!(minutes, "degenerate wave length, using personal baseline");
        return personal;
    }
    tracing::warn!(minutes, "degenerate wave length, using fallback");
    FALLBACK_WAVE_MINUTES
}

/// Phase boundaries of one wave (minutes from the meal)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WavePhases {
    pub rise_minutes: f64,
    pub plateau_minutes: f64,
    pub decline_minutes: f64,
    pub lipolysis_start_minutes: f64,
}

impl WavePhases {
    /// Split a wave by meal composition.
    ///
    /// Fiber slows the rise, liquids speed it up; protein and fat widen the
    /// plateau; an activity context shortens the decline.
    pub fn compute(total_minutes: f64, snapshot: &NutrientSnapshot, has_activity: bool) -> Self {
        let mut rise = 20.0 + (snapshot.fiber / 5.0).floor().max(0.0) * 3.0;
        if snapshot.has_liquid {
            rise *= 0.6;
        }
        let rise = rise.clamp(MIN_RISE_MINUTES, MAX_RISE_MINUTES);

        let plateau_share = (0.35
            + (snapshot.protein / 20.0).floor().max(0.0) * 0.05
            + (snapshot.fat / 15.0).floor().max(0.0) * 0.08)
            .min(0.55);
        let plateau = (total_minutes - rise).max(0.0) * plateau_share;

        let mut decline = (total_minutes - rise - plateau).max(0.0);
        if has_activity {
            decline *= 0.85;
        }
        let decline = decline.max(MIN_DECLINE_MINUTES);

        Self {
            rise_minutes: round1(rise),
            plateau_minutes: round1(plateau),
            decline_minutes: round1(decline),
            lipolysis_start_minutes: round1(rise + plateau + decline),
        }
    }

    /// Phase at a point of the wave
    pub fn phase_at(&self, elapsed: f64, wave_minutes: f64) -> WavePhase {
        if elapsed >= wave_minutes {
            WavePhase::Lipolysis
        } else if elapsed < self.rise_minutes {
            WavePhase::Rising
        } else if elapsed < self.rise_minutes + self.plateau_minutes {
            WavePhase::Plateau
        } else {
            WavePhase::Declining
        }
    }
}

pub fn wave_status(remaining_minutes: f64) -> WaveStatus {
    if remaining_minutes <= 0.0 {
        WaveStatus::Lipolysis
    } else if remaining_minutes <= 15.0 {
        WaveStatus::Almost
    } else if remaining_minutes <= 30.0 {
        WaveStatus::Soon
    } else {
        WaveStatus::Active
    }
}

/// Where "now" sits on a wave
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveTiming {
    pub elapsed_minutes: f64,
    pub remaining_minutes: f64,
    /// Percent elapsed (0-100)
    pub progress: f64,
    pub end_time: String,
    /// Minutes since the wave ended
    pub lipolysis_minutes: f64,
    pub is_night: bool,
    pub status: WaveStatus,
}

impl WaveTiming {
    pub fn compute(meal_minutes: i64, now_minutes: f64, wave_minutes: f64) -> Self {
        let now = align_now(meal_minutes, now_minutes);
        let elapsed = (now - meal_minutes as f64).max(0.0);
        let remaining = round1((wave_minutes - elapsed).max(0.0));
        let progress = if wave_minutes > 0.0 {
            (elapsed / wave_minutes * 100.0).clamp(0.0, 100.0)
        } else {
            100.0
        };
        let end = meal_minutes + wave_minutes.round() as i64;
        Self {
            elapsed_minutes: round1(elapsed),
            remaining_minutes: remaining,
            progress: round1(progress),
            end_time: format_hhmm(end),
            lipolysis_minutes: round1((elapsed - wave_minutes).max(0.0)),
            is_night: is_night_hour((now_minutes / 60.0).rem_euclid(24.0)),
            status: wave_status(remaining),
        }
    }
}

/// Fat burned during lipolysis, scaled by body weight
pub fn lipolysis_kcal(lipolysis_minutes: f64, weight_kg: f64) -> f64 {
    let weight = if weight_kg.is_finite() && weight_kg > 0.0 {
        weight_kg
    } else {
        DEFAULT_WEIGHT_KG
    };
    (lipolysis_minutes.max(0.0) * LIPOLYSIS_KCAL_PER_MINUTE * weight / DEFAULT_WEIGHT_KG).round()
}

/// Lipolysis availability by insulin level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsulinZone {
    Full,
    Partial,
    Suppressed,
    Blocked,
}

impl InsulinZone {
    pub fn from_level(level: f64) -> Self {
        if level <= 5.0 {
            Self::Full
        } else if level <= 15.0 {
            Self::Partial
        } else if level <= 50.0 {
            Self::Suppressed
        } else {
            Self::Blocked
        }
    }

    /// Share of normal lipolysis still possible (percent)
    pub fn lipolysis_percent(self) -> u8 {
        match self {
            Self::Full => 100,
            Self::Partial => 50,
            Self::Suppressed => 10,
            Self::Blocked => 0,
        }
    }
}

/// Estimated insulin level at "now"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsulinLevel {
    /// µU/ml
    pub level: f64,
    pub zone: InsulinZone,
    pub lipolysis_percent: u8,
}

impl InsulinLevel {
    pub fn from_progress(progress: f64) -> Self {
        let level = (5.0 + 75.0 * (-progress.max(0.0) / 25.0).exp()).round();
        let zone = InsulinZone::from_level(level);
        Self {
            level,
            zone,
            lipolysis_percent: zone.lipolysis_percent(),
        }
    }
}

/// Contributors to reactive hypoglycemia risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HypoglycemiaFactor {
    HighGi,
    LowProtein,
    LowFat,
    Fasted,
}

/// Reactive hypoglycemia risk after a meal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypoglycemiaRisk {
    /// Risk score (0-1)
    pub score: f64,
    pub warning: bool,
    pub factors: Vec<HypoglycemiaFactor>,
    pub window_start_minutes: f64,
    pub window_end_minutes: f64,
    /// Whether "now" falls inside the risk window
    pub in_window: bool,
}

const HYPO_WINDOW: (f64, f64) = (120.0, 240.0);

impl HypoglycemiaRisk {
    pub fn assess(snapshot: &NutrientSnapshot, fasting_hours: Option<f64>, elapsed: f64) -> Self {
        let mut score = 0.0;
        let mut factors = Vec::new();
        if snapshot.avg_gi > 70.0 {
            score += 0.4;
            factors.push(HypoglycemiaFactor::HighGi);
        }
        if snapshot.protein < 10.0 {
            score += 0.3;
            factors.push(HypoglycemiaFactor::LowProtein);
        }
        if snapshot.fat < 5.0 {
            score += 0.2;
            factors.push(HypoglycemiaFactor::LowFat);
        }
        if fasting_hours.is_some_and(|h| h >= 12.0) {
            score += 0.1;
            factors.push(HypoglycemiaFactor::Fasted);
        }
        let score: f64 = (score * 100.0_f64).round() / 100.0;
        Self {
            score,
            warning: score >= 0.6,
            factors,
            window_start_minutes: HYPO_WINDOW.0,
            window_end_minutes: HYPO_WINDOW.1,
            in_window: (HYPO_WINDOW.0..=HYPO_WINDOW.1).contains(&elapsed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn make_snapshot(protein: f64, fat: f64, fiber: f64) -> NutrientSnapshot {
        NutrientSnapshot {
            protein,
            fat,
            fiber,
            ..Default::default()
        }
    }

    #[test]
    fn test_wave_minutes_fallbacks() {
        assert!((wave_minutes(3.0, 1.2, 3.0, 1.5) - 216.0).abs() < 0.001);
        assert!((wave_minutes(f64::NAN, 1.0, 3.5, 1.5) - 210.0).abs() < 0.001);
        assert!((wave_minutes(0.0, 1.0, f64::NAN, 1.5) - 180.0).abs() < 0.001);
    }

    #[test]
    fn test_wave_minutes_personal_ceiling() {
        // damped base above the personal baseline: 2.94 * 1.5 > 2.8 * 1.5
        assert!((wave_minutes(2.94, 1.5, 2.8, 1.5) - 252.0).abs() < 0.001);
        assert!((wave_minutes(2.5, 1.5, 2.8, 1.5) - 225.0).abs() < 0.001);
        // no usable baseline, no ceiling
        assert!((wave_minutes(3.0, 1.5, f64::NAN, 1.5) - 270.0).abs() < 0.001);
    }

    #[test]
    fn test_phases_basic() {
        let phases = WavePhases::compute(180.0, &make_snapshot(0.0, 0.0, 0.0), false);
        assert!((phases.rise_minutes - 20.0).abs() < 0.001);
        // (180 - 20) * 0.35
        assert!((phases.plateau_minutes - 56.0).abs() < 0.001);
        assert!((phases.decline_minutes - 104.0).abs() < 0.001);
        assert!((phases.lipolysis_start_minutes - 180.0).abs() < 0.001);
    }

    #[test]
    fn test_phases_rich_meal_with_activity() {
        let mut snapshot = make_snapshot(45.0, 30.0, 12.0);
        snapshot.has_liquid = true;
        let phases = WavePhases::compute(200.0, &snapshot, true);
        // (20 + 2*3) * 0.6 = 15.6
        assert!((phases.rise_minutes - 15.6).abs() < 0.001);
        // share capped at 0.55
        assert!((phases.plateau_minutes - 101.4).abs() < 0.051);
        let remainder = 200.0 - 15.6 - 184.4 * 0.55;
        assert!((phases.decline_minutes - round1(remainder * 0.85)).abs() < 0.051);
    }

    #[test]
    fn test_phase_at() {
        let phases = WavePhases::compute(180.0, &make_snapshot(0.0, 0.0, 0.0), false);
        assert_eq!(phases.phase_at(0.0, 180.0), WavePhase::Rising);
        assert_eq!(phases.phase_at(30.0, 180.0), WavePhase::Plateau);
        assert_eq!(phases.phase_at(100.0, 180.0), WavePhase::Declining);
        assert_eq!(phases.phase_at(180.0, 180.0), WavePhase::Lipolysis);
    }

    #[test]
    fn test_status_thresholds() {
        assert_eq!(wave_status(0.0), WaveStatus::Lipolysis);
        assert_eq!(wave_status(15.0), WaveStatus::Almost);
        assert_eq!(wave_status(30.0), WaveStatus::Soon);
        assert_eq!(wave_status(31.0), WaveStatus::Active);
    }

    #[test]
    fn test_timing_active_and_lipolysis() {
        let active = WaveTiming::compute(720, 720.0, 200.0);
        assert_eq!(active.status, WaveStatus::Active);
        assert!(active.progress.abs() < 0.001);
        assert_eq!(active.end_time, "15:20");

        let done = WaveTiming::compute(720, 720.0 + 260.0, 200.0);
        assert_eq!(done.status, WaveStatus::Lipolysis);
        assert!(done.remaining_minutes.abs() < 0.001);
        assert!((done.lipolysis_minutes - 60.0).abs() < 0.001);
        assert!((done.progress - 100.0).abs() < 0.001);
    }

    #[test]
    fn test_timing_status_matches_reported_remaining() {
        // 0.04 min left rounds to zero and reads as lipolysis
        let timing = WaveTiming::compute(720, 720.0 + 199.96, 200.0);
        assert!(timing.remaining_minutes.abs() < 0.001);
        assert_eq!(timing.status, WaveStatus::Lipolysis);

        let timing = WaveTiming::compute(720, 720.0 + 199.9, 200.0);
        assert!((timing.remaining_minutes - 0.1).abs() < 0.001);
        assert_eq!(timing.status, WaveStatus::Almost);
    }

    #[test]
    fn test_timing_midnight() {
        let timing = WaveTiming::compute(23 * 60 + 30, 15.0, 180.0);
        assert!((timing.elapsed_minutes - 45.0).abs() < 0.001);
        assert_eq!(timing.end_time, "02:30");
        assert!(timing.is_night);
    }

    #[test]
    fn test_lipolysis_kcal() {
        assert!((lipolysis_kcal(60.0, 70.0) - 60.0).abs() < 0.001);
        assert!((lipolysis_kcal(60.0, 105.0) - 90.0).abs() < 0.001);
        assert!(lipolysis_kcal(-5.0, 70.0).abs() < 0.001);
    }

    #[test]
    fn test_insulin_level() {
        let start = InsulinLevel::from_progress(0.0);
        assert!((start.level - 80.0).abs() < 0.001);
        assert_eq!(start.zone, InsulinZone::Blocked);
        let end = InsulinLevel::from_progress(100.0);
        assert!((end.level - 6.0).abs() < 0.001);
        assert_eq!(end.zone, InsulinZone::Partial);
        assert_eq!(end.lipolysis_percent, 50);
    }

    #[test]
    fn test_hypoglycemia_risk() {
        let mut snapshot = make_snapshot(5.0, 2.0, 0.0);
        snapshot.avg_gi = 85.0;
        let risk = HypoglycemiaRisk::assess(&snapshot, Some(14.0), 150.0);
        assert!((risk.score - 1.0).abs() < 0.001);
        assert!(risk.warning);
        assert!(risk.in_window);

        let balanced = HypoglycemiaRisk::assess(&make_snapshot(30.0, 15.0, 5.0), None, 30.0);
        assert!(balanced.score.abs() < 0.001);
        assert!(!balanced.warning);
        assert!(!balanced.in_window);
    }
}
