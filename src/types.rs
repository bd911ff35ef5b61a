//! Core types for the insulin wave engine
//!
//! This module defines the data structures that flow through the engine:
//! meal inputs, product records, day context, the per-meal nutrient snapshot,
//! and the final wave result.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calibration::{GapHistoryEntry, LipolysisRecord};
use crate::compose::Composition;
use crate::curve::{WaveCurve, WaveScore};
use crate::factors::activity::ActivityContext;
use crate::factors::metabolic::AutophagyState;
use crate::factors::personal::IrScore;
use crate::history::{GapQuality, MealWave, Overlap};
use crate::ndte::NdteEffect;
use crate::wave::{HypoglycemiaRisk, InsulinLevel, WavePhases};

/// Default weight (kg) used when the profile has none
pub const DEFAULT_WEIGHT_KG: f64 = 70.0;

/// Default portion (g) when a meal item carries no weight
pub const DEFAULT_ITEM_GRAMS: f64 = 100.0;

/// Biological sex, as used by the personal baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    #[serde(alias = "m")]
    Male,
    #[serde(alias = "f")]
    Female,
}

/// User profile attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    /// Age in years
    pub age: Option<f64>,
    /// Biological sex
    pub sex: Option<Sex>,
    /// Body weight (kg)
    pub weight_kg: Option<f64>,
    /// Height (cm)
    pub height_cm: Option<f64>,
}

impl Profile {
    /// Body-mass index rounded to one decimal, if weight and height are known
    pub fn bmi(&self) -> Option<f64> {
        match (self.weight_kg, self.height_cm) {
            (Some(w), Some(h)) if w > 0.0 && h > 0.0 => {
                let m = h / 100.0;
                Some(round1(w / (m * m)))
            }
            _ => None,
        }
    }

    /// Weight with the engine-wide default applied
    pub fn weight_or_default(&self) -> f64 {
        self.weight_kg
            .filter(|w| w.is_finite() && *w > 0.0)
            .unwrap_or(DEFAULT_WEIGHT_KG)
    }
}

/// Physical form of a product, when the catalog knows it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductForm {
    Whole,
    Processed,
}

/// Per-100g nutrient record resolved from the product catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Product {
    /// Catalog identifier
    pub id: String,
    /// Display name (also used for pattern detection)
    pub name: String,
    /// Protein per 100 g
    pub protein100: f64,
    /// Simple carbohydrates per 100 g
    pub simple100: f64,
    /// Complex carbohydrates per 100 g
    pub complex100: f64,
    /// Total carbohydrates per 100 g, used when simple/complex are absent
    pub carbs100: f64,
    /// Saturated fat per 100 g
    pub bad_fat100: f64,
    /// Unsaturated fat per 100 g
    pub good_fat100: f64,
    /// Trans fat per 100 g
    pub trans100: f64,
    /// Dietary fiber per 100 g
    pub fiber100: f64,
    /// Energy per 100 g; derived from macros when absent
    pub kcal100: Option<f64>,
    /// Glycemic index
    pub gi: Option<f64>,
    /// Harm score (0-10)
    pub harm: Option<f64>,
    /// Catalog category
    pub category: Option<String>,
    /// Whole vs processed form
    pub form: Option<ProductForm>,
}

impl Product {
    /// Carbohydrates per 100 g: simple + complex when present, else the total
    pub fn carbs_per_100(&self) -> f64 {
        let split = self.simple100 + self.complex100;
        if split > 0.0 {
            split
        } else {
            self.carbs100.max(0.0)
        }
    }

    /// Total fat per 100 g
    pub fn fat_per_100(&self) -> f64 {
        self.bad_fat100 + self.good_fat100 + self.trans100
    }

    /// Energy per 100 g
    pub fn kcal_per_100(&self) -> f64 {
        match self.kcal100 {
            Some(kcal) if kcal.is_finite() && kcal >= 0.0 => kcal,
            _ => self.protein100 * 4.0 + self.carbs_per_100() * 4.0 + self.fat_per_100() * 9.0,
        }
    }
}

/// One line of a meal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MealItem {
    /// Catalog reference
    pub product_id: Option<String>,
    /// Product name (fallback lookup key)
    pub name: Option<String>,
    /// Portion weight in grams (defaults to 100)
    pub grams: Option<f64>,
    /// Inline per-100g snapshot captured when the item was logged
    pub snapshot: Option<Product>,
}

impl MealItem {
    pub fn grams_or_default(&self) -> f64 {
        match self.grams {
            Some(g) if g.is_finite() && g > 0.0 => g,
            _ => DEFAULT_ITEM_GRAMS,
        }
    }
}

/// A logged meal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Meal {
    /// Wall-clock time "HH:MM"; hours up to 47 mark a night continuation
    pub time: String,
    pub items: Vec<MealItem>,
    pub meal_type: Option<String>,
    pub mood: Option<String>,
    pub note: Option<String>,
}

/// Training category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainingType {
    #[default]
    Cardio,
    Strength,
    Hobby,
    #[serde(other)]
    Other,
}

/// Training intensity class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    #[serde(alias = "LISS")]
    Liss,
    #[serde(alias = "MODERATE")]
    Moderate,
    #[serde(alias = "HIIT")]
    Hiit,
}

/// A training session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Training {
    /// Start time "HH:MM"
    pub time: Option<String>,
    /// Duration (minutes), used when heart-rate zones are absent
    pub duration_minutes: Option<f64>,
    /// Minutes spent in heart-rate zones 1-4
    #[serde(alias = "z")]
    pub zones: Option<[f64; 4]>,
    #[serde(rename = "type")]
    pub training_type: TrainingType,
    /// Explicit intensity; derived from zones when absent
    pub intensity: Option<Intensity>,
}

/// Supplement taken with or before a meal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Supplement {
    Vinegar,
    Cinnamon,
    Berberine,
}

/// Kind of cold exposure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColdExposureKind {
    Shower,
    Bath,
    Swim,
}

/// A cold exposure event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColdExposure {
    pub kind: ColdExposureKind,
    /// Time of the exposure "HH:MM"; without it the exposure applies all day
    #[serde(default)]
    pub time: Option<String>,
}

/// Day-level context supplied wholesale per computation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DayContext {
    /// Calendar date of the day record
    pub date: Option<NaiveDate>,
    pub profile: Profile,
    pub trainings: Vec<Training>,
    pub steps: Option<f64>,
    /// Household / NEAT activity (minutes)
    pub household_minutes: Option<f64>,
    pub sleep_hours: Option<f64>,
    /// Sleep quality (1-10)
    pub sleep_quality: Option<f64>,
    /// Wake-up time "HH:MM"
    pub wake_time: Option<String>,
    /// Average stress (1-10)
    pub stress: Option<f64>,
    pub water_ml: Option<f64>,
    /// Menstrual cycle day (1-based)
    pub cycle_day: Option<u32>,
    pub supplements: Vec<Supplement>,
    pub cold_exposure: Option<ColdExposure>,
}

/// Persisted day record (meals plus context)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DayRecord {
    #[serde(default)]
    pub meals: Vec<Meal>,
    #[serde(flatten)]
    pub context: DayContext,
}

/// Insulinogenic classification of a meal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsulinogenicType {
    LiquidDairy,
    SoftDairy,
    HardDairy,
    PureProtein,
    HighFiber,
}

/// Dominant protein source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProteinType {
    Animal,
    Plant,
    Whey,
    #[default]
    Mixed,
}

/// Alcohol strength class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlcoholStrength {
    Strong,
    Medium,
    Weak,
}

/// Serving temperature of a meal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoodTemperature {
    Hot,
    Cold,
    #[default]
    Room,
}

/// Physical form of a whole meal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoodForm {
    Liquid,
    Processed,
    Whole,
    #[default]
    Mixed,
}

/// Aggregate nutrient features of one meal (derived, never persisted)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NutrientSnapshot {
    /// Total portion weight (g)
    pub grams: f64,
    pub protein: f64,
    /// Total carbohydrates (g)
    pub carbs: f64,
    pub simple: f64,
    pub complex: f64,
    /// Total fat including trans (g)
    pub fat: f64,
    pub trans_fat: f64,
    pub fiber: f64,
    pub kcal: f64,
    /// Carbohydrate-weighted glycemic index (50 when carb-free)
    pub avg_gi: f64,
    /// Glycemic load with insulin-index boosts
    pub glycemic_load: f64,
    /// Glycemic load from avg GI and carbs only
    pub base_glycemic_load: f64,
    /// Share of kcal from liquid items (0-1)
    pub liquid_ratio: f64,
    pub has_liquid: bool,
    /// Share of carbohydrates that are simple (0-1)
    pub simple_ratio: f64,
    pub insulinogenic: Option<InsulinogenicType>,
    pub protein_type: ProteinType,
    pub spicy: bool,
    pub alcohol: Option<AlcoholStrength>,
    pub alcohol_bonus: f64,
    pub caffeine: bool,
    pub resistant_starch: bool,
    pub temperature: FoodTemperature,
    pub food_form: FoodForm,
    /// kcal-weighted harm score, when any item carries one
    pub harm: Option<f64>,
    pub resolved_items: usize,
    pub unresolved_items: usize,
}

/// User-facing countdown status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveStatus {
    Active,
    Soon,
    Almost,
    Lipolysis,
}

/// Physiological phase of the wave at "now"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WavePhase {
    Rising,
    Plateau,
    Declining,
    Lipolysis,
}

/// Gap statistics for today and the rolling history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapStats {
    /// Mean start-to-start gap today (minutes, 0 with a single meal)
    pub avg_gap_today: i64,
    /// Mean of the rolling gap history (minutes, 0 without history)
    pub personal_avg_gap: i64,
    /// Gap recommended by the base wave length (minutes)
    pub recommended_gap: i64,
    pub quality: GapQuality,
    /// The most recent history entries (up to 7)
    pub recent: Vec<GapHistoryEntry>,
    /// Whether today's entry differs from the persisted history
    pub history_changed: bool,
}

/// Full output of a wave computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveResult {
    pub status: WaveStatus,
    pub phase: WavePhase,
    /// Percent of the wave elapsed (0-100)
    pub progress: f64,
    pub remaining_minutes: f64,
    pub elapsed_minutes: f64,
    pub last_meal_time: String,
    pub end_time: String,
    pub wave_minutes: f64,
    pub wave_hours: f64,
    /// Base hours after GL-scaled personal deviation
    pub base_hours: f64,
    /// Unscaled personal baseline (hours)
    pub personal_base_hours: f64,
    pub final_multiplier: f64,
    pub is_night: bool,
    pub lipolysis_minutes: f64,
    pub lipolysis_kcal: f64,
    pub nutrients: NutrientSnapshot,
    pub breakdown: Composition,
    pub phases: WavePhases,
    pub curve: WaveCurve,
    pub score: WaveScore,
    pub insulin_level: InsulinLevel,
    pub hypoglycemia: HypoglycemiaRisk,
    pub history: Vec<MealWave>,
    pub overlaps: Vec<Overlap>,
    pub worst_overlap: Option<Overlap>,
    pub gaps: GapStats,
    pub gap_history: Vec<GapHistoryEntry>,
    pub ndte: NdteEffect,
    pub activity_context: Option<ActivityContext>,
    pub ir_score: IrScore,
    pub autophagy: Option<AutophagyState>,
    pub lipolysis_record: Option<LipolysisRecord>,
}

/// Round to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bmi_rounding() {
        let profile = Profile {
            weight_kg: Some(70.0),
            height_cm: Some(175.0),
            ..Default::default()
        };
        assert!((profile.bmi().unwrap() - 22.9).abs() < 0.001);
        assert!(Profile::default().bmi().is_none());
    }

    #[test]
    fn test_product_carbs_fallback() {
        let split = Product {
            simple100: 10.0,
            complex100: 20.0,
            carbs100: 99.0,
            ..Default::default()
        };
        assert!((split.carbs_per_100() - 30.0).abs() < 0.001);

        let total_only = Product {
            carbs100: 45.0,
            ..Default::default()
        };
        assert!((total_only.carbs_per_100() - 45.0).abs() < 0.001);
    }

    #[test]
    fn test_kcal_derived_from_macros() {
        let product = Product {
            protein100: 10.0,
            carbs100: 20.0,
            good_fat100: 5.0,
            ..Default::default()
        };
        assert!((product.kcal_per_100() - 165.0).abs() < 0.001);
    }

    #[test]
    fn test_training_deserializes_zone_alias() {
        let training: Training =
            serde_json::from_str(r#"{"time":"18:00","z":[5,10,15,0],"type":"strength"}"#).unwrap();
        assert_eq!(training.zones, Some([5.0, 10.0, 15.0, 0.0]));
        assert_eq!(training.training_type, TrainingType::Strength);
    }

    #[test]
    fn test_day_record_flattens_context() {
        let json = r#"{
            "date": "2024-03-10",
            "meals": [{"time": "08:30", "items": []}],
            "steps": 8000,
            "profile": {"age": 35, "sex": "female"}
        }"#;
        let record: DayRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.meals.len(), 1);
        assert_eq!(record.context.steps, Some(8000.0));
        assert_eq!(record.context.profile.sex, Some(Sex::Female));
    }
}
