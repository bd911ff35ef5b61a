//! Next-day training effect (NDTE)
//!
//! A heavy training session keeps insulin sensitivity elevated into the next
//! day. The effect scales with yesterday's energy expenditure and BMI, and
//! decays with the hours since the last session ended.

use serde::{Deserialize, Serialize};

use crate::clock::MINUTES_PER_DAY;
use crate::factors::activity::{is_valid_training, training_interval, training_kcal};
use crate::types::{DayContext, Profile, TrainingType};

/// Below this expenditure yesterday's training has no carry-over
const MIN_KCAL: f64 = 200.0;

/// Carry-over window (hours)
const MAX_WINDOW_HOURS: f64 = 48.0;

/// Hours assumed since yesterday's training when no session carries a time
const UNTIMED_HOURS_SINCE: f64 = 24.0;

const MAX_TDEE_BOOST: f64 = 0.20;
const MAX_WAVE_REDUCTION: f64 = 0.45;
const MAX_PEAK_REDUCTION: f64 = 0.50;

/// Expenditure tiers: (min kcal, tdee boost, wave reduction, peak reduction)
const KCAL_TIERS: [(f64, f64, f64, f64); 3] = [
    (900.0, 0.10, 0.25, 0.30),
    (500.0, 0.07, 0.15, 0.20),
    (300.0, 0.04, 0.08, 0.10),
];

/// Cross-day training effect applied to today's meals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NdteEffect {
    pub active: bool,
    /// Energy-expenditure boost, for an energy-balance collaborator
    pub tdee_boost: f64,
    pub wave_reduction: f64,
    pub peak_reduction: f64,
    /// `1 - wave_reduction`, consumed by composition
    pub wave_multiplier: f64,
    /// Yesterday's total training expenditure
    pub training_kcal: f64,
    pub hours_since: Option<f64>,
    pub trainings_count: usize,
    pub dominant_type: Option<TrainingType>,
    pub bmi_multiplier: f64,
    pub decay_multiplier: f64,
}

impl Default for NdteEffect {
    fn default() -> Self {
        Self {
            active: false,
            tdee_boost: 0.0,
            wave_reduction: 0.0,
            peak_reduction: 0.0,
            wave_multiplier: 1.0,
            training_kcal: 0.0,
            hours_since: None,
            trainings_count: 0,
            dominant_type: None,
            bmi_multiplier: 1.0,
            decay_multiplier: 1.0,
        }
    }
}

/// Summary of yesterday's trainings
#[derive(Debug, Clone, PartialEq)]
pub struct PreviousDayLoad {
    pub total_kcal: f64,
    /// End of the latest timed session (minutes from yesterday's midnight)
    pub last_end_minutes: Option<i64>,
    pub dominant_type: Option<TrainingType>,
    pub count: usize,
}

impl PreviousDayLoad {
    pub fn from_day(day: &DayContext, weight_kg: f64) -> Self {
        let trainings: Vec<_> = day.trainings.iter().filter(|t| is_valid_training(t)).collect();
        let total_kcal: f64 = trainings.iter().map(|t| training_kcal(t, weight_kg)).sum();
        let last_end_minutes = trainings
            .iter()
            .filter_map(|t| training_interval(t, weight_kg))
            .map(|i| i.end_minutes)
            .max();
        Self {
            total_kcal,
            last_end_minutes,
            dominant_type: trainings.first().map(|t| t.training_type),
            count: trainings.len(),
        }
    }

    /// Hours from the end of the last session to `now_minutes` today
    pub fn hours_since(&self, now_minutes: f64) -> f64 {
        match self.last_end_minutes {
            Some(end) => (MINUTES_PER_DAY as f64 - end as f64 + now_minutes) / 60.0,
            None => UNTIMED_HOURS_SINCE,
        }
    }
}

pub fn bmi_multiplier(bmi: Option<f64>) -> f64 {
    match bmi {
        Some(b) if b >= 30.0 => 1.8,
        Some(b) if b >= 25.0 => 1.4,
        Some(b) if b >= 18.5 => 1.0,
        Some(b) if b > 0.0 => 0.8,
        _ => 1.0,
    }
}

pub fn decay_multiplier(hours_since: f64) -> f64 {
    if hours_since <= 12.0 {
        1.0
    } else if hours_since <= 24.0 {
        0.8
    } else if hours_since <= 36.0 {
        0.5
    } else if hours_since <= MAX_WINDOW_HOURS {
        0.25
    } else {
        0.0
    }
}

/// (tdee, wave) multipliers by training type
fn type_multipliers(training_type: Option<TrainingType>) -> (f64, f64) {
    match training_type {
        Some(TrainingType::Strength) => (1.2, 0.9),
        Some(TrainingType::Cardio) | None => (1.0, 1.1),
        Some(TrainingType::Hobby) => (0.8, 0.8),
        Some(TrainingType::Other) => (1.0, 1.0),
    }
}

fn cumulative_multiplier(count: usize) -> f64 {
    if count > 1 {
        (1.0 + (count - 1) as f64 * 0.2).min(1.5)
    } else {
        1.0
    }
}

fn base_tier(kcal: f64) -> (f64, f64, f64) {
    if let Some((_, tdee, wave, peak)) = KCAL_TIERS.iter().find(|(min, _, _, _)| kcal >= *min) {
        return (*tdee, *wave, *peak);
    }
    // 200-300 kcal: the lowest tier, scaled
    let (_, tdee, wave, peak) = KCAL_TIERS[KCAL_TIERS.len() - 1];
    let ratio = kcal / 300.0;
    (tdee * ratio, wave * ratio, peak * ratio)
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// NDTE from a summarized previous-day load
pub fn calculate_ndte(load: &PreviousDayLoad, hours_since: f64, bmi: Option<f64>) -> NdteEffect {
    let inactive = NdteEffect {
        training_kcal: load.total_kcal,
        hours_since: Some(hours_since),
        trainings_count: load.count,
        dominant_type: load.dominant_type,
        ..Default::default()
    };
    if load.total_kcal < MIN_KCAL || !hours_since.is_finite() || hours_since >= MAX_WINDOW_HOURS {
        return inactive;
    }

    let (tdee, wave, peak) = base_tier(load.total_kcal);
    let bmi_mult = bmi_multiplier(bmi);
    let decay = decay_multiplier(hours_since);
    let (type_tdee, type_wave) = type_multipliers(load.dominant_type);
    let cumulative = cumulative_multiplier(load.count);

    let tdee_boost = round3(tdee * bmi_mult * decay * type_tdee * cumulative).min(MAX_TDEE_BOOST);
    let wave_reduction =
        round3(wave * bmi_mult * decay * type_wave * cumulative).min(MAX_WAVE_REDUCTION);
    let peak_reduction = round3(peak * bmi_mult * decay * cumulative).min(MAX_PEAK_REDUCTION);

    NdteEffect {
        active: true,
        tdee_boost,
        wave_reduction,
        peak_reduction,
        wave_multiplier: 1.0 - wave_reduction,
        bmi_multiplier: bmi_mult,
        decay_multiplier: decay,
        ..inactive
    }
}

/// NDTE for today given yesterday's record.
///
/// Weight and BMI come from today's profile, falling back to yesterday's.
pub fn ndte_from_previous_day(
    previous: Option<&DayContext>,
    profile: &Profile,
    now_minutes: f64,
) -> NdteEffect {
    let Some(previous) = previous else {
        return NdteEffect::default();
    };
    let profile = if profile.weight_kg.is_some() {
        profile
    } else {
        &previous.profile
    };
    let load = PreviousDayLoad::from_day(previous, profile.weight_or_default());
    if load.count == 0 {
        return NdteEffect::default();
    }
    calculate_ndte(&load, load.hours_since(now_minutes), profile.bmi())
}
