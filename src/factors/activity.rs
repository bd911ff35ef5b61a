//! Activity context
//!
//! Collects every training/steps/household situation that applies to a meal
//! and keeps the single highest-priority one. Training helpers derive each
//! session's interval, intensity class and energy expenditure.

use serde::{Deserialize, Serialize};

use crate::clock::parse_hhmm;
use crate::types::{DayContext, Intensity, NutrientSnapshot, Training, TrainingType};

/// Duration assumed for a training without zones or an explicit duration
pub const DEFAULT_TRAINING_MINUTES: f64 = 30.0;

/// MET values for heart-rate zones 1-4
pub const ZONE_METS: [f64; 4] = [2.5, 6.0, 8.0, 10.0];

/// A meal this late may still sit in a post-workout window
const NIGHT_MEAL_MINUTES: i64 = 22 * 60;

/// How long after a training a night meal keeps its post-workout override
const NIGHT_OVERRIDE_MINUTES: i64 = 4 * 60;

/// Minimum protein (g) for the strength recovery rule
const STRENGTH_PROTEIN_GRAMS: f64 = 30.0;

/// Post-workout window tiers: (max gap minutes, wave bonus)
const POST_TIERS: [(f64, f64); 5] = [
    (30.0, -0.40),
    (60.0, -0.35),
    (120.0, -0.25),
    (240.0, -0.15),
    (360.0, -0.08),
];

/// Pre-workout tiers: (max gap minutes, wave bonus, harm multiplier)
const PRE_TIERS: [(i64, f64, f64); 2] = [(45, -0.20, 0.6), (90, -0.10, 0.8)];

/// Step tiers: (threshold, wave bonus, harm multiplier)
const STEP_TIERS: [(f64, f64, f64); 4] = [
    (12000.0, -0.12, 0.92),
    (10000.0, -0.10, 0.95),
    (7500.0, -0.06, 0.97),
    (5000.0, -0.04, 0.98),
];

/// Household tiers: (minutes, wave bonus, harm multiplier)
const HOUSEHOLD_TIERS: [(f64, f64, f64); 3] =
    [(90.0, -0.12, 0.90), (60.0, -0.10, 0.93), (30.0, -0.05, 0.96)];

/// Kind of activity context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// Meal eaten during a training
    Peri,
    /// Meal eaten after a training
    Post,
    /// Meal eaten shortly before a training
    Pre,
    Steps,
    Household,
    MorningTraining,
    DoubleTraining,
}

impl ActivityKind {
    pub fn priority(self) -> u8 {
        match self {
            Self::Peri => 100,
            Self::Post => 80,
            Self::Pre => 60,
            Self::Steps => 20,
            Self::Household => 15,
            Self::MorningTraining | Self::DoubleTraining => 10,
        }
    }
}

/// Activity situation applying to one meal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityContext {
    pub kind: ActivityKind,
    pub priority: u8,
    /// Wave bonus (negative shortens the wave)
    pub bonus: f64,
    /// Multiplier on the meal's harm score
    pub harm_multiplier: f64,
    /// Multiplier on the meal's glycemic load before damping
    pub gl_multiplier: f64,
    /// Whether the circadian night penalty is cancelled
    pub cancels_night_penalty: bool,
    /// Training this context refers to, if any
    pub training_time: Option<String>,
    pub training_type: Option<TrainingType>,
    pub intensity: Option<Intensity>,
    /// Minutes between meal and training boundary
    pub gap_minutes: Option<f64>,
    /// Energy spent in the referenced training
    pub training_kcal: Option<f64>,
}

impl ActivityContext {
    fn new(kind: ActivityKind, bonus: f64, harm_multiplier: f64) -> Self {
        Self {
            kind,
            priority: kind.priority(),
            bonus,
            harm_multiplier,
            gl_multiplier: 1.0,
            cancels_night_penalty: false,
            training_time: None,
            training_type: None,
            intensity: None,
            gap_minutes: None,
            training_kcal: None,
        }
    }

    fn for_training(mut self, interval: &TrainingInterval, gap: Option<f64>) -> Self {
        self.training_time = Some(interval.time.clone());
        self.training_type = Some(interval.training_type);
        self.intensity = Some(interval.intensity);
        self.gap_minutes = gap;
        self.training_kcal = Some(interval.kcal);
        self
    }
}

/// A training placed on the day axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingInterval {
    pub time: String,
    pub start_minutes: i64,
    pub end_minutes: i64,
    pub duration_minutes: f64,
    pub intensity: Intensity,
    pub training_type: TrainingType,
    pub kcal: f64,
}

/// A training counts when it has a time or recorded zone minutes
pub fn is_valid_training(training: &Training) -> bool {
    let has_time = training
        .time
        .as_deref()
        .is_some_and(|t| !t.trim().is_empty());
    let has_zones = training
        .zones
        .is_some_and(|z| z.iter().any(|m| m.is_finite() && *m > 0.0));
    has_time || has_zones
}

fn zone_total(training: &Training) -> f64 {
    training
        .zones
        .map(|z| z.iter().filter(|m| m.is_finite()).map(|m| m.max(0.0)).sum::<f64>())
        .unwrap_or(0.0)
}

/// Intensity class: explicit, else by share of minutes in zones 3-4
pub fn training_intensity(training: &Training) -> Intensity {
    if let Some(intensity) = training.intensity {
        return intensity;
    }
    let total = zone_total(training);
    if total <= 0.0 {
        return Intensity::Liss;
    }
    let high = training
        .zones
        .map(|z| z[2].max(0.0) + z[3].max(0.0))
        .unwrap_or(0.0);
    let share = high / total;
    if share >= 0.5 {
        Intensity::Hiit
    } else if share >= 0.2 {
        Intensity::Moderate
    } else {
        Intensity::Liss
    }
}

pub fn intensity_multiplier(intensity: Intensity) -> f64 {
    match intensity {
        Intensity::Hiit => 2.0,
        Intensity::Moderate => 1.5,
        Intensity::Liss => 1.0,
    }
}

fn intensity_met(intensity: Intensity) -> f64 {
    match intensity {
        Intensity::Liss => ZONE_METS[1],
        Intensity::Moderate => ZONE_METS[2],
        Intensity::Hiit => ZONE_METS[3],
    }
}

/// Duration in minutes: zone total, else the explicit duration, else 30
pub fn training_duration(training: &Training) -> f64 {
    let zones = zone_total(training);
    if zones > 0.0 {
        return zones;
    }
    training
        .duration_minutes
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(DEFAULT_TRAINING_MINUTES)
}

/// Energy expenditure: `MET * 3.5 * weight / 200` per minute, rounded
pub fn training_kcal(training: &Training, weight_kg: f64) -> f64 {
    let per_minute = |met: f64| met * 3.5 * weight_kg / 200.0;
    let kcal = if zone_total(training) > 0.0 {
        training
            .zones
            .map(|z| {
                z.iter()
                    .zip(ZONE_METS)
                    .map(|(minutes, met)| minutes.max(0.0) * per_minute(met))
                    .sum::<f64>()
            })
            .unwrap_or(0.0)
    } else {
        training_duration(training) * per_minute(intensity_met(training_intensity(training)))
    };
    kcal.round()
}

/// Place a training on the day axis; trainings without a parseable time have
/// no interval.
pub fn training_interval(training: &Training, weight_kg: f64) -> Option<TrainingInterval> {
    let time = training.time.as_deref()?;
    let start = parse_hhmm(time).ok()?;
    let duration = training_duration(training);
    Some(TrainingInterval {
        time: time.trim().to_string(),
        start_minutes: start,
        end_minutes: start + duration.round() as i64,
        duration_minutes: duration,
        intensity: training_intensity(training),
        training_type: training.training_type,
        kcal: training_kcal(training, weight_kg),
    })
}

fn post_type_multiplier(training_type: TrainingType) -> f64 {
    match training_type {
        TrainingType::Cardio => 1.15,
        TrainingType::Strength | TrainingType::Other => 1.0,
        TrainingType::Hobby => 0.8,
    }
}

fn post_kcal_multiplier(kcal: f64) -> f64 {
    if kcal >= 1000.0 {
        1.5
    } else if kcal >= 700.0 {
        1.35
    } else if kcal >= 400.0 {
        1.25
    } else if kcal >= 200.0 {
        1.15
    } else {
        1.0
    }
}

fn training_contexts(
    meal_minutes: i64,
    interval: &TrainingInterval,
    contexts: &mut Vec<ActivityContext>,
) {
    let mult = intensity_multiplier(interval.intensity);

    if meal_minutes >= interval.start_minutes && meal_minutes <= interval.end_minutes {
        let bonus = (-0.60 * mult).max(-0.95);
        let harm = (0.5 / mult).max(0.2);
        contexts.push(
            ActivityContext::new(ActivityKind::Peri, bonus, harm)
                .for_training(interval, Some((meal_minutes - interval.start_minutes) as f64)),
        );
        return;
    }

    if meal_minutes > interval.end_minutes {
        let gap = (meal_minutes - interval.end_minutes) as f64;
        let window = (120.0 + interval.kcal / 60.0).min(360.0 * mult);
        if gap <= window {
            let tier = POST_TIERS
                .iter()
                .find(|(max_gap, _)| gap <= *max_gap)
                .or(POST_TIERS.last())
                .map(|(_, bonus)| *bonus)
                .unwrap_or(0.0);
            let bonus = (tier
                * post_kcal_multiplier(interval.kcal)
                * post_type_multiplier(interval.training_type))
            .max(-0.60);
            let harm = (0.7 - (interval.kcal / 2000.0).min(0.5)).max(0.3);
            let mut context = ActivityContext::new(ActivityKind::Post, bonus, harm)
                .for_training(interval, Some(gap));
            context.cancels_night_penalty = true;
            contexts.push(context);
        }
    }

    if meal_minutes < interval.start_minutes {
        let gap = interval.start_minutes - meal_minutes;
        if let Some((_, bonus, harm)) = PRE_TIERS.iter().find(|(max_gap, _, _)| gap <= *max_gap) {
            contexts.push(
                ActivityContext::new(ActivityKind::Pre, *bonus, *harm)
                    .for_training(interval, Some(gap as f64)),
            );
        }
    }
}

/// All activity contexts applying to a meal, in discovery order
pub fn collect_activity_contexts(
    meal_minutes: i64,
    snapshot: &NutrientSnapshot,
    day: &DayContext,
) -> Vec<ActivityContext> {
    let weight = day.profile.weight_or_default();
    let trainings: Vec<&Training> = day.trainings.iter().filter(|t| is_valid_training(t)).collect();
    let intervals: Vec<TrainingInterval> = trainings
        .iter()
        .filter_map(|t| training_interval(t, weight))
        .collect();

    let mut contexts = Vec::new();
    for interval in &intervals {
        training_contexts(meal_minutes, interval, &mut contexts);
    }

    if let Some(steps) = day.steps.filter(|s| s.is_finite()) {
        if let Some((_, bonus, harm)) = STEP_TIERS.iter().find(|(threshold, _, _)| steps >= *threshold) {
            let evening = if meal_minutes >= 18 * 60 { 1.3 } else { 1.0 };
            contexts.push(ActivityContext::new(ActivityKind::Steps, bonus * evening, *harm));
        }
    }

    if let Some(minutes) = day.household_minutes.filter(|m| m.is_finite() && *m > 0.0) {
        if let Some((_, bonus, harm)) = HOUSEHOLD_TIERS.iter().find(|(threshold, _, _)| minutes >= *threshold) {
            contexts.push(ActivityContext::new(ActivityKind::Household, *bonus, *harm));
        }
    }

    if intervals.iter().any(|i| i.start_minutes < 12 * 60) {
        contexts.push(ActivityContext::new(ActivityKind::MorningTraining, -0.05, 1.0));
    }

    if trainings.len() >= 2 {
        contexts.push(ActivityContext::new(ActivityKind::DoubleTraining, -0.10, 1.0));
    }

    // Strength + protein: recovery meal
    if snapshot.protein >= STRENGTH_PROTEIN_GRAMS {
        if let Some(post) = contexts.iter_mut().find(|c| {
            c.kind == ActivityKind::Post && c.training_type == Some(TrainingType::Strength)
        }) {
            post.harm_multiplier = post.harm_multiplier.min(0.8);
        }
    }

    // Cardio + simple carbs: glycogen refuel
    if snapshot.simple > 0.0 {
        let is_cardio = |c: &ActivityContext, kind: ActivityKind| {
            c.kind == kind && c.training_type == Some(TrainingType::Cardio)
        };
        let target = contexts
            .iter()
            .position(|c| is_cardio(c, ActivityKind::Peri))
            .or_else(|| contexts.iter().position(|c| is_cardio(c, ActivityKind::Post)));
        if let Some(i) = target {
            contexts[i].gl_multiplier = 0.7;
        }
    }

    // Night meal right after a training keeps the post-workout override
    if meal_minutes >= NIGHT_MEAL_MINUTES {
        let recent = intervals.iter().find(|i| {
            let since = meal_minutes - i.end_minutes;
            (0..=NIGHT_OVERRIDE_MINUTES).contains(&since)
        });
        if let Some(recent) = recent {
            if let Some(post) = contexts.iter_mut().find(|c| {
                c.kind == ActivityKind::Post && c.training_time.as_deref() == Some(recent.time.as_str())
            }) {
                post.cancels_night_penalty = true;
            }
        }
    }

    contexts
}

/// The single highest-priority context; ties keep the first found
pub fn select_activity_context(
    meal_minutes: i64,
    snapshot: &NutrientSnapshot,
    day: &DayContext,
) -> Option<ActivityContext> {
    let mut best: Option<ActivityContext> = None;
    for context in collect_activity_contexts(meal_minutes, snapshot, day) {
        if best.as_ref().map_or(true, |b| context.priority > b.priority) {
            best = Some(context);
        }
    }
    best
}
