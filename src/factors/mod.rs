//! Factor library
//!
//! Every factor is a pure function of a [`FactorInputs`] slice. Dispatch runs
//! through [`FACTOR_TABLE`], an explicit ordered list, so evaluation order and
//! output order are deterministic.

pub mod activity;
pub mod food;
pub mod metabolic;
pub mod personal;

use serde::{Deserialize, Serialize};

use crate::clock::hour_of;
use crate::config::WaveConfig;
use crate::ndte::NdteEffect;
use crate::types::{DayContext, NutrientSnapshot};

use self::activity::ActivityContext;
use self::personal::IrScore;

/// Identifier of a factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorId {
    GiCategory,
    ProteinBonus,
    FiberBonus,
    FatBonus,
    GlContinuous,
    LiquidFood,
    FoodForm,
    ResistantStarch,
    Temperature,
    LargePortion,
    Fasting,
    Alcohol,
    Caffeine,
    TransFat,
    ColdExposure,
    Supplements,
    Autophagy,
    MealStacking,
    Stress,
    Sleep,
    SleepQuality,
    Hydration,
    MenstrualCycle,
    ActivityContext,
    Spicy,
    Insulinogenic,
    SimpleCarbRatio,
    Circadian,
    NextDayTraining,
    InsulinResistance,
}

/// How a factor enters the composition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorKind {
    /// The GI multiplier the food core is built on
    CoreBase,
    /// Added to the core base (protein, fiber, fat)
    CoreBonus,
    /// Multiplies the food core
    CoreMultiplier,
    /// Signed bonus summed into a bucket
    Bonus,
    /// Stand-alone multiplier in the final product
    Multiplier,
}

/// Bonus bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Food,
    /// Damped by glycemic load
    DayLevel,
    Activity,
}

impl FactorId {
    pub fn kind(self) -> FactorKind {
        match self {
            FactorId::GiCategory => FactorKind::CoreBase,
            FactorId::ProteinBonus | FactorId::FiberBonus | FactorId::FatBonus => {
                FactorKind::CoreBonus
            }
            FactorId::GlContinuous | FactorId::LiquidFood | FactorId::FoodForm => {
                FactorKind::CoreMultiplier
            }
            FactorId::Spicy
            | FactorId::Insulinogenic
            | FactorId::SimpleCarbRatio
            | FactorId::Circadian
            | FactorId::NextDayTraining
            | FactorId::InsulinResistance => FactorKind::Multiplier,
            _ => FactorKind::Bonus,
        }
    }

    /// Default bucket of a bonus factor
    pub fn default_bucket(self) -> Option<Bucket> {
        match self {
            FactorId::Stress
            | FactorId::Sleep
            | FactorId::SleepQuality
            | FactorId::Hydration
            | FactorId::MenstrualCycle => Some(Bucket::DayLevel),
            FactorId::ActivityContext => Some(Bucket::Activity),
            _ if self.kind() == FactorKind::Bonus => Some(Bucket::Food),
            _ => None,
        }
    }
}

/// Everything a factor may look at for one meal
#[derive(Debug, Clone)]
pub struct FactorInputs<'a> {
    pub snapshot: &'a NutrientSnapshot,
    pub day: &'a DayContext,
    /// Meal time on the extended day axis
    pub meal_minutes: i64,
    /// Hours fasted before this meal
    pub fasting_hours: Option<f64>,
    /// Projected fasting hours feeding the autophagy factor
    pub autophagy_hours: Option<f64>,
    /// Overlap with the previous wave (minutes) and the previous meal's GL
    pub stacking: Option<(f64, f64)>,
    pub activity: Option<&'a ActivityContext>,
    pub ndte: &'a NdteEffect,
    pub ir: &'a IrScore,
}

/// One entry of the factor table
#[derive(Clone, Copy)]
pub struct FactorSpec {
    pub id: FactorId,
    pub kind: FactorKind,
    pub apply: fn(&FactorInputs<'_>) -> f64,
}

/// Evaluated factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorOutput {
    pub id: FactorId,
    pub kind: FactorKind,
    /// Bucket for bonus factors
    pub bucket: Option<Bucket>,
    /// Value after the per-factor clamp
    pub value: f64,
    /// Whether the per-factor clamp changed the value
    pub clamped: bool,
}

macro_rules! factor {
    ($id:ident, $kind:ident, $apply:ident) => {
        FactorSpec {
            id: FactorId::$id,
            kind: FactorKind::$kind,
            apply: $apply,
        }
    };
}

/// Ordered factor table
pub static FACTOR_TABLE: [FactorSpec; 30] = [
    factor!(GiCategory, CoreBase, gi_category),
    factor!(ProteinBonus, CoreBonus, protein_bonus),
    factor!(FiberBonus, CoreBonus, fiber_bonus),
    factor!(FatBonus, CoreBonus, fat_bonus),
    factor!(GlContinuous, CoreMultiplier, gl_continuous),
    factor!(LiquidFood, CoreMultiplier, liquid_food),
    factor!(FoodForm, CoreMultiplier, food_form),
    factor!(ResistantStarch, Bonus, resistant_starch),
    factor!(Temperature, Bonus, temperature),
    factor!(LargePortion, Bonus, large_portion),
    factor!(Fasting, Bonus, fasting),
    factor!(Alcohol, Bonus, alcohol),
    factor!(Caffeine, Bonus, caffeine),
    factor!(TransFat, Bonus, trans_fat),
    factor!(ColdExposure, Bonus, cold_exposure),
    factor!(Supplements, Bonus, supplements),
    factor!(Autophagy, Bonus, autophagy),
    factor!(MealStacking, Bonus, meal_stacking),
    factor!(Stress, Bonus, stress),
    factor!(Sleep, Bonus, sleep),
    factor!(SleepQuality, Bonus, sleep_quality),
    factor!(Hydration, Bonus, hydration),
    factor!(MenstrualCycle, Bonus, menstrual_cycle),
    factor!(ActivityContext, Bonus, activity_context),
    factor!(Spicy, Multiplier, spicy),
    factor!(Insulinogenic, Multiplier, insulinogenic),
    factor!(SimpleCarbRatio, Multiplier, simple_carb_ratio),
    factor!(Circadian, Multiplier, circadian),
    factor!(NextDayTraining, Multiplier, next_day_training),
    factor!(InsulinResistance, Multiplier, insulin_resistance),
];

fn gi_category(i: &FactorInputs<'_>) -> f64 {
    food::gi_multiplier(i.snapshot.avg_gi, i.snapshot.glycemic_load)
}

fn protein_bonus(i: &FactorInputs<'_>) -> f64 {
    food::protein_bonus(i.snapshot.protein, i.snapshot.protein_type, i.snapshot.glycemic_load)
}

fn fiber_bonus(i: &FactorInputs<'_>) -> f64 {
    food::fiber_bonus(i.snapshot.fiber, i.snapshot.glycemic_load)
}

fn fat_bonus(i: &FactorInputs<'_>) -> f64 {
    food::fat_bonus(i.snapshot.fat, i.snapshot.glycemic_load)
}

fn gl_continuous(i: &FactorInputs<'_>) -> f64 {
    food::gl_continuous_multiplier(i.snapshot.glycemic_load)
}

fn liquid_food(i: &FactorInputs<'_>) -> f64 {
    food::liquid_multiplier(i.snapshot.has_liquid)
}

fn food_form(i: &FactorInputs<'_>) -> f64 {
    food::food_form_multiplier(i.snapshot.food_form)
}

fn resistant_starch(i: &FactorInputs<'_>) -> f64 {
    food::resistant_starch_bonus(i.snapshot.resistant_starch)
}

fn temperature(i: &FactorInputs<'_>) -> f64 {
    food::temperature_bonus(i.snapshot.temperature)
}

fn large_portion(i: &FactorInputs<'_>) -> f64 {
    food::large_portion(i.snapshot.kcal).bonus
}

fn fasting(i: &FactorInputs<'_>) -> f64 {
    i.fasting_hours.map(metabolic::fasting_bonus).unwrap_or(0.0)
}

fn alcohol(i: &FactorInputs<'_>) -> f64 {
    i.snapshot.alcohol_bonus
}

fn caffeine(i: &FactorInputs<'_>) -> f64 {
    metabolic::caffeine_bonus(i.snapshot.caffeine)
}

fn trans_fat(i: &FactorInputs<'_>) -> f64 {
    metabolic::trans_fat_bonus(i.snapshot.trans_fat)
}

fn cold_exposure(i: &FactorInputs<'_>) -> f64 {
    metabolic::cold_exposure_bonus(i.day.cold_exposure.as_ref(), i.meal_minutes)
}

fn supplements(i: &FactorInputs<'_>) -> f64 {
    metabolic::supplements_bonus(&i.day.supplements)
}

fn autophagy(i: &FactorInputs<'_>) -> f64 {
    metabolic::autophagy_bonus(i.autophagy_hours)
}

fn meal_stacking(i: &FactorInputs<'_>) -> f64 {
    i.stacking
        .map(|(overlap, previous_gl)| metabolic::meal_stacking_bonus(overlap, previous_gl))
        .unwrap_or(0.0)
}

fn stress(i: &FactorInputs<'_>) -> f64 {
    metabolic::stress_bonus(i.day.stress)
}

fn sleep(i: &FactorInputs<'_>) -> f64 {
    metabolic::sleep_bonus(i.day.sleep_hours)
}

fn sleep_quality(i: &FactorInputs<'_>) -> f64 {
    metabolic::sleep_quality_bonus(i.day.sleep_quality)
}

fn hydration(i: &FactorInputs<'_>) -> f64 {
    metabolic::hydration_bonus(i.day.water_ml, i.day.profile.weight_or_default())
}

fn menstrual_cycle(i: &FactorInputs<'_>) -> f64 {
    metabolic::cycle_bonus(i.day.cycle_day)
}

fn activity_context(i: &FactorInputs<'_>) -> f64 {
    i.activity.map(|a| a.bonus).unwrap_or(0.0)
}

fn spicy(i: &FactorInputs<'_>) -> f64 {
    metabolic::spicy_multiplier(i.snapshot.spicy)
}

fn insulinogenic(i: &FactorInputs<'_>) -> f64 {
    food::insulin_index(i.snapshot.insulinogenic).wave
}

fn simple_carb_ratio(i: &FactorInputs<'_>) -> f64 {
    food::simple_ratio_multiplier(i.snapshot.simple_ratio, i.snapshot.carbs)
}

fn circadian(i: &FactorInputs<'_>) -> f64 {
    metabolic::circadian_multiplier(hour_of(i.meal_minutes))
}

fn next_day_training(i: &FactorInputs<'_>) -> f64 {
    i.ndte.wave_multiplier
}

fn insulin_resistance(i: &FactorInputs<'_>) -> f64 {
    i.ir.score
}

/// Evaluate the whole table for one meal.
///
/// Non-activity bonuses are clamped to `±config.factor_bonus_limit`; the
/// activity context is bounded by its bucket floor instead.
pub fn evaluate(inputs: &FactorInputs<'_>, config: &WaveConfig) -> Vec<FactorOutput> {
    let limit = config.factor_bonus_limit;
    FACTOR_TABLE
        .iter()
        .map(|spec| {
            let raw = (spec.apply)(inputs);
            let bounded = matches!(spec.kind, FactorKind::CoreBonus | FactorKind::Bonus)
                && spec.id != FactorId::ActivityContext;
            let value = if bounded && raw.is_finite() {
                raw.clamp(-limit, limit)
            } else {
                raw
            };
            let clamped = value != raw && raw.is_finite();
            if clamped {
                tracing::debug!(factor = ?spec.id, raw, value, "factor bonus clamped");
            }
            FactorOutput {
                id: spec.id,
                kind: spec.kind,
                bucket: config.bucket_for(spec.id),
                value,
                clamped,
            }
        })
        .collect()
}

/// Value of a factor in an evaluated list
pub fn factor_value(outputs: &[FactorOutput], id: FactorId) -> Option<f64> {
    outputs.iter().find(|o| o.id == id).map(|o| o.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Supplement, TrainingType};
    use pretty_assertions::assert_eq;

    fn make_snapshot() -> NutrientSnapshot {
        NutrientSnapshot {
            carbs: 60.0,
            simple: 60.0,
            protein: 10.0,
            fat: 5.0,
            avg_gi: 80.0,
            glycemic_load: 48.0,
            base_glycemic_load: 48.0,
            simple_ratio: 1.0,
            kcal: 325.0,
            ..Default::default()
        }
    }

    fn make_inputs<'a>(
        snapshot: &'a NutrientSnapshot,
        day: &'a DayContext,
        ndte: &'a NdteEffect,
        ir: &'a IrScore,
    ) -> FactorInputs<'a> {
        FactorInputs {
            snapshot,
            day,
            meal_minutes: 12 * 60,
            fasting_hours: None,
            autophagy_hours: None,
            stacking: None,
            activity: None,
            ndte,
            ir,
        }
    }

    #[test]
    fn test_table_is_ordered_and_complete() {
        let ids: Vec<FactorId> = FACTOR_TABLE.iter().map(|s| s.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        for spec in FACTOR_TABLE.iter() {
            assert_eq!(spec.kind, spec.id.kind());
        }
    }

    #[test]
    fn test_default_buckets() {
        assert_eq!(FactorId::Stress.default_bucket(), Some(Bucket::DayLevel));
        assert_eq!(FactorId::Caffeine.default_bucket(), Some(Bucket::Food));
        assert_eq!(FactorId::ActivityContext.default_bucket(), Some(Bucket::Activity));
        assert_eq!(FactorId::ProteinBonus.default_bucket(), None);
        assert_eq!(FactorId::Circadian.default_bucket(), None);
    }

    #[test]
    fn test_evaluate_reference_meal() {
        let snapshot = make_snapshot();
        let day = DayContext::default();
        let ndte = NdteEffect::default();
        let ir = IrScore::default();
        let inputs = make_inputs(&snapshot, &day, &ndte, &ir);
        let outputs = evaluate(&inputs, &WaveConfig::default());

        assert_eq!(outputs.len(), FACTOR_TABLE.len());
        assert!((factor_value(&outputs, FactorId::GiCategory).unwrap() - 1.2).abs() < 0.001);
        assert!((factor_value(&outputs, FactorId::GlContinuous).unwrap() - 1.30).abs() < 0.001);
        assert!((factor_value(&outputs, FactorId::SimpleCarbRatio).unwrap() - 0.95).abs() < 0.001);
        // 1.025 - 0.175 * cos(pi / 3)
        assert!((factor_value(&outputs, FactorId::Circadian).unwrap() - 0.9375).abs() < 0.001);
        assert!(factor_value(&outputs, FactorId::Stress).unwrap().abs() < 0.001);
    }

    #[test]
    fn test_bonus_clamp_and_activity_exemption() {
        let snapshot = make_snapshot();
        let day = DayContext {
            supplements: vec![Supplement::Vinegar, Supplement::Berberine, Supplement::Cinnamon],
            ..Default::default()
        };
        let ndte = NdteEffect::default();
        let ir = IrScore::default();
        let activity = ActivityContext {
            kind: activity::ActivityKind::Peri,
            priority: 100,
            bonus: -0.95,
            harm_multiplier: 0.25,
            gl_multiplier: 1.0,
            cancels_night_penalty: false,
            training_time: Some("11:30".to_string()),
            training_type: Some(TrainingType::Cardio),
            intensity: None,
            gap_minutes: Some(30.0),
            training_kcal: Some(400.0),
        };
        let mut inputs = make_inputs(&snapshot, &day, &ndte, &ir);
        inputs.activity = Some(&activity);
        let outputs = evaluate(&inputs, &WaveConfig::default());

        let supplements = outputs.iter().find(|o| o.id == FactorId::Supplements).unwrap();
        assert!((supplements.value + 0.30).abs() < 0.001);
        assert!(supplements.clamped);
        assert!((factor_value(&outputs, FactorId::ActivityContext).unwrap() + 0.95).abs() < 0.001);
    }

    #[test]
    fn test_bucket_override_applies() {
        let snapshot = make_snapshot();
        let day = DayContext::default();
        let ndte = NdteEffect::default();
        let ir = IrScore::default();
        let inputs = make_inputs(&snapshot, &day, &ndte, &ir);
        let mut config = WaveConfig::default();
        config.buckets.insert(FactorId::Fasting, Bucket::DayLevel);
        let outputs = evaluate(&inputs, &config);
        let fasting = outputs.iter().find(|o| o.id == FactorId::Fasting).unwrap();
        assert_eq!(fasting.bucket, Some(Bucket::DayLevel));
    }
}
