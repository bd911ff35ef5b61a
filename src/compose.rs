//! Composition engine
//!
//! Folds the evaluated factor list into a single wave-length multiplier:
//!
//! 1. bucket the bonuses (food, day-level, activity) around the food core,
//! 2. damp day-level and circadian effects for low glycemic loads,
//! 3. multiply the buckets with the stand-alone multipliers,
//! 4. clamp, and fall back to neutral values if anything went non-finite.

use serde::{Deserialize, Serialize};

use crate::config::WaveConfig;
use crate::factors::activity::ActivityContext;
use crate::factors::{factor_value, Bucket, FactorId, FactorKind, FactorOutput};
use crate::types::NutrientSnapshot;

/// Composition breakdown for one meal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    /// `(gi + protein + fiber + fat) * gl * liquid * form`
    pub food_core: f64,
    pub food_bonus: f64,
    /// Day-level bonus sum before damping
    pub day_bonus: f64,
    pub activity_bonus: f64,
    pub food_multiplier: f64,
    pub activity_multiplier: f64,
    /// Circadian multiplier before damping
    pub circadian_multiplier: f64,
    pub scaled_circadian: f64,
    pub ndte_multiplier: f64,
    pub spicy_multiplier: f64,
    pub insulinogenic_multiplier: f64,
    pub simple_ratio_multiplier: f64,
    /// Weighted and damped insulin-resistance term
    pub ir_term: f64,
    /// Glycemic load after the activity GL multiplier
    pub effective_gl: f64,
    pub day_scale: f64,
    pub circadian_scale: f64,
    pub night_override: bool,
    /// Base hours after damping the personal deviation
    pub base_hours: f64,
    /// Product before clamping
    pub raw_multiplier: f64,
    pub final_multiplier: f64,
    pub clamped: bool,
    /// A non-finite intermediate forced the neutral fallback
    pub degenerate: bool,
    pub factors: Vec<FactorOutput>,
}

fn value_or(outputs: &[FactorOutput], id: FactorId, default: f64) -> f64 {
    factor_value(outputs, id).unwrap_or(default)
}

/// Compose evaluated factors into the final multiplier.
///
/// `personal_delta` is the personal baseline's deviation from the default
/// base hours; it is damped together with the day-level bucket.
pub fn compose(
    snapshot: &NutrientSnapshot,
    factors: &[FactorOutput],
    activity: Option<&ActivityContext>,
    personal_delta: f64,
    config: &WaveConfig,
) -> Composition {
    let core_base = value_or(factors, FactorId::GiCategory, 1.0);
    let core_bonus: f64 = factors
        .iter()
        .filter(|f| f.kind == FactorKind::CoreBonus)
        .map(|f| f.value)
        .sum();
    let core_multiplier: f64 = factors
        .iter()
        .filter(|f| f.kind == FactorKind::CoreMultiplier)
        .map(|f| f.value)
        .product();
    let food_core = (core_base + core_bonus) * core_multiplier;

    let bucket_sum = |bucket: Bucket| -> f64 {
        factors
            .iter()
            .filter(|f| f.kind == FactorKind::Bonus && f.bucket == Some(bucket))
            .map(|f| f.value)
            .sum()
    };
    let food_bonus = bucket_sum(Bucket::Food);
    let day_bonus = bucket_sum(Bucket::DayLevel);
    let activity_bonus = bucket_sum(Bucket::Activity);

    let gl_multiplier = activity.map(|a| a.gl_multiplier).unwrap_or(1.0);
    let effective_gl = snapshot.glycemic_load * gl_multiplier;
    let day_scale = config.day_damping.scale(effective_gl);
    let circadian_scale = config.circadian_damping.scale(effective_gl);

    let food_multiplier = (food_core + food_bonus + day_scale * day_bonus).max(config.min_multiplier);
    let activity_multiplier = (1.0 + activity_bonus).max(config.activity_floor);

    let circadian_multiplier = value_or(factors, FactorId::Circadian, 1.0);
    let night_override = activity.is_some_and(|a| a.cancels_night_penalty);
    let mut scaled_circadian = 1.0 + (circadian_multiplier - 1.0) * circadian_scale;
    if night_override {
        scaled_circadian = scaled_circadian.min(1.0);
    }

    let ndte_multiplier = value_or(factors, FactorId::NextDayTraining, 1.0);
    let spicy_multiplier = value_or(factors, FactorId::Spicy, 1.0);
    let insulinogenic_multiplier = value_or(factors, FactorId::Insulinogenic, 1.0);
    let simple_ratio_multiplier = value_or(factors, FactorId::SimpleCarbRatio, 1.0);
    let ir_score = value_or(factors, FactorId::InsulinResistance, 1.0);
    let ir_term = 1.0 + (ir_score - 1.0) * config.ir_weight * day_scale;

    let base_hours = config.default_base_hours + personal_delta * day_scale;

    let raw_multiplier = food_multiplier
        * activity_multiplier
        * ndte_multiplier
        * scaled_circadian
        * spicy_multiplier
        * insulinogenic_multiplier
        * simple_ratio_multiplier
        * ir_term;

    let degenerate = !raw_multiplier.is_finite() || !base_hours.is_finite();
    let (final_multiplier, clamped, base_hours) = if degenerate {
        tracing::warn!(
            raw_multiplier,
            base_hours,
            "non-finite composition, falling back to neutral multiplier"
        );
        (1.0, false, config.default_base_hours)
    } else {
        let bounded = raw_multiplier.clamp(config.min_multiplier, config.max_multiplier);
        let clamped = bounded != raw_multiplier;
        if clamped {
            tracing::debug!(raw_multiplier, bounded, "final multiplier clamped");
        }
        (bounded, clamped, base_hours)
    };

    tracing::debug!(
        food_core,
        food_multiplier,
        activity_multiplier,
        scaled_circadian,
        ndte_multiplier,
        ir_term,
        day_scale,
        final_multiplier,
        "composed wave multiplier"
    );

    Composition {
        food_core,
        food_bonus,
        day_bonus,
        activity_bonus,
        food_multiplier,
        activity_multiplier,
        circadian_multiplier,
        scaled_circadian,
        ndte_multiplier,
        spicy_multiplier,
        insulinogenic_multiplier,
        simple_ratio_multiplier,
        ir_term,
        effective_gl,
        day_scale,
        circadian_scale,
        night_override,
        base_hours,
        raw_multiplier,
        final_multiplier,
        clamped,
        degenerate,
        factors: factors.to_vec(),
    }
}
