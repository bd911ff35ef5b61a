//! Food-intrinsic factors
//!
//! Everything here depends only on the meal's nutrient snapshot.

use serde::{Deserialize, Serialize};

use crate::types::{FoodForm, FoodTemperature, InsulinogenicType, ProteinType};

/// GL at and above which the GI category applies in full
const GI_FULL_WEIGHT_GL: f64 = 20.0;

/// GL below which the GI category is ignored
const GI_ZERO_WEIGHT_GL: f64 = 7.0;

/// GL at which the continuous multiplier saturates
const GL_CONTINUOUS_MAX: f64 = 40.0;

/// GL below which protein/fiber/fat bonuses are scaled down
const GL_SCALE_THRESHOLD: f64 = 20.0;

/// Glycemic index category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GiCategory {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl GiCategory {
    pub fn from_gi(gi: f64) -> Self {
        if gi <= 35.0 {
            Self::Low
        } else if gi <= 55.0 {
            Self::Medium
        } else if gi <= 70.0 {
            Self::High
        } else {
            Self::VeryHigh
        }
    }

    pub fn multiplier(self) -> f64 {
        match self {
            Self::Low => 0.85,
            Self::Medium => 1.0,
            Self::High => 1.1,
            Self::VeryHigh => 1.2,
        }
    }
}

/// Glycemic load category (labels only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlCategory {
    Micro,
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl GlCategory {
    pub fn from_gl(gl: f64) -> Self {
        if gl < 2.0 {
            Self::Micro
        } else if gl < 5.0 {
            Self::VeryLow
        } else if gl < 10.0 {
            Self::Low
        } else if gl < 20.0 {
            Self::Medium
        } else if gl < 30.0 {
            Self::High
        } else {
            Self::VeryHigh
        }
    }
}

/// Insulin-index profile of an insulinogenic food type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InsulinIndex {
    /// Per-item glycemic load boost
    pub gl_boost: f64,
    /// Reported peak multiplier
    pub peak: f64,
    /// Wave length multiplier
    pub wave: f64,
}

impl InsulinIndex {
    const NEUTRAL: Self = Self {
        gl_boost: 1.0,
        peak: 1.0,
        wave: 1.0,
    };
}

/// Insulin-index profile for a type (neutral when unclassified)
pub fn insulin_index(kind: Option<InsulinogenicType>) -> InsulinIndex {
    match kind {
        Some(InsulinogenicType::LiquidDairy) => InsulinIndex {
            gl_boost: 1.5,
            peak: 1.35,
            wave: 0.85,
        },
        Some(InsulinogenicType::SoftDairy) => InsulinIndex {
            gl_boost: 1.3,
            peak: 1.25,
            wave: 0.90,
        },
        Some(InsulinogenicType::HardDairy) => InsulinIndex {
            gl_boost: 1.1,
            peak: 1.10,
            wave: 0.95,
        },
        Some(InsulinogenicType::PureProtein) => InsulinIndex {
            gl_boost: 1.2,
            peak: 1.15,
            wave: 0.92,
        },
        Some(InsulinogenicType::HighFiber) => InsulinIndex {
            gl_boost: 0.8,
            peak: 0.85,
            wave: 1.10,
        },
        None => InsulinIndex::NEUTRAL,
    }
}

/// GI category multiplier, weighted by glycemic load.
///
/// Low-GL meals barely move blood glucose, so their GI matters less: full
/// weight from GL 20, linear between GL 7 and 20, none below 7.
pub fn gi_multiplier(gi: f64, gl: f64) -> f64 {
    let category = GiCategory::from_gi(gi).multiplier();
    if !gl.is_finite() || gl < GI_ZERO_WEIGHT_GL {
        1.0
    } else if gl >= GI_FULL_WEIGHT_GL {
        category
    } else {
        let weight = (gl - GI_ZERO_WEIGHT_GL) / (GI_FULL_WEIGHT_GL - GI_ZERO_WEIGHT_GL);
        1.0 + (category - 1.0) * weight
    }
}

/// Continuous GL multiplier: `0.15 + 1.15 * (gl / 40)^0.6`
pub fn gl_continuous_multiplier(gl: f64) -> f64 {
    if !gl.is_finite() {
        return 1.0;
    }
    if gl <= 0.0 {
        return 0.15;
    }
    if gl >= GL_CONTINUOUS_MAX {
        return 1.30;
    }
    0.15 + 1.15 * (gl / GL_CONTINUOUS_MAX).powf(0.6)
}

/// Scale applied to protein/fiber/fat bonuses for low-GL meals
pub fn gl_scale(gl: f64) -> f64 {
    if !gl.is_finite() || gl >= GL_SCALE_THRESHOLD {
        return 1.0;
    }
    (0.25 + gl.max(0.0) / GL_SCALE_THRESHOLD * 0.75).max(0.25)
}

/// Protein type multiplier on the protein bonus
pub fn protein_type_multiplier(protein_type: ProteinType) -> f64 {
    match protein_type {
        ProteinType::Animal => 1.8,
        ProteinType::Plant => 1.3,
        ProteinType::Whey => 2.0,
        ProteinType::Mixed => 1.5,
    }
}

pub fn protein_bonus(protein: f64, protein_type: ProteinType, gl: f64) -> f64 {
    let tier = if protein >= 50.0 {
        0.07
    } else if protein >= 35.0 {
        0.05
    } else if protein >= 20.0 {
        0.03
    } else {
        0.0
    };
    tier * protein_type_multiplier(protein_type) * gl_scale(gl)
}

pub fn fiber_bonus(fiber: f64, gl: f64) -> f64 {
    let tier = if fiber >= 15.0 {
        -0.20
    } else if fiber >= 10.0 {
        -0.15
    } else if fiber >= 5.0 {
        -0.08
    } else {
        0.0
    };
    tier * gl_scale(gl)
}

pub fn fat_bonus(fat: f64, gl: f64) -> f64 {
    let tier = if fat >= 25.0 {
        0.15
    } else if fat >= 15.0 {
        0.10
    } else if fat >= 8.0 {
        0.05
    } else {
        0.0
    };
    tier * gl_scale(gl)
}

pub fn liquid_multiplier(has_liquid: bool) -> f64 {
    if has_liquid {
        0.75
    } else {
        1.0
    }
}

/// Insulinogenic bonus (reported alongside the wave multiplier)
pub fn insulinogenic_bonus(kind: Option<InsulinogenicType>) -> f64 {
    match kind {
        Some(InsulinogenicType::LiquidDairy) => 0.15,
        Some(InsulinogenicType::SoftDairy) => 0.10,
        Some(InsulinogenicType::PureProtein) => 0.08,
        Some(InsulinogenicType::HardDairy) => 0.05,
        Some(InsulinogenicType::HighFiber) | None => 0.0,
    }
}

pub fn food_form_multiplier(form: FoodForm) -> f64 {
    match form {
        FoodForm::Liquid => 1.30,
        FoodForm::Processed => 1.15,
        FoodForm::Whole => 0.85,
        FoodForm::Mixed => 1.0,
    }
}

pub fn resistant_starch_bonus(present: bool) -> f64 {
    if present {
        -0.15
    } else {
        0.0
    }
}

pub fn temperature_bonus(temperature: FoodTemperature) -> f64 {
    match temperature {
        FoodTemperature::Hot => 0.08,
        FoodTemperature::Cold => -0.05,
        FoodTemperature::Room => 0.0,
    }
}

pub fn temperature_peak_multiplier(temperature: FoodTemperature) -> f64 {
    match temperature {
        FoodTemperature::Hot => 1.15,
        FoodTemperature::Cold => 0.9,
        FoodTemperature::Room => 1.0,
    }
}

/// Effect of a large meal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortionEffect {
    pub bonus: f64,
    pub peak_multiplier: f64,
}

pub fn large_portion(kcal: f64) -> PortionEffect {
    let (bonus, peak_multiplier): (f64, f64) = if kcal >= 1200.0 {
        (0.25, 0.80)
    } else if kcal >= 1000.0 {
        (0.18, 0.85)
    } else if kcal >= 800.0 {
        (0.10, 0.90)
    } else if kcal >= 600.0 {
        (0.05, 0.95)
    } else {
        (0.0, 1.0)
    };
    PortionEffect {
        bonus: bonus.min(0.30),
        peak_multiplier,
    }
}

/// Simple:complex carbohydrate ratio multiplier.
///
/// Mostly-simple carbs clear faster (0.95); mostly-complex carbs keep the
/// wave up longer (1.05).
pub fn simple_ratio_multiplier(simple_ratio: f64, carbs: f64) -> f64 {
    if carbs <= 0.0 || !simple_ratio.is_finite() {
        1.0
    } else if simple_ratio >= 0.7 {
        0.95
    } else if simple_ratio <= 0.3 {
        1.05
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gi_categories() {
        assert_eq!(GiCategory::from_gi(35.0), GiCategory::Low);
        assert_eq!(GiCategory::from_gi(55.0), GiCategory::Medium);
        assert_eq!(GiCategory::from_gi(70.0), GiCategory::High);
        assert_eq!(GiCategory::from_gi(80.0), GiCategory::VeryHigh);
    }

    #[test]
    fn test_gi_weighting_by_gl() {
        assert!((gi_multiplier(80.0, 48.0) - 1.2).abs() < 0.001);
        assert!((gi_multiplier(80.0, 5.0) - 1.0).abs() < 0.001);
        // halfway between 7 and 20
        assert!((gi_multiplier(80.0, 13.5) - 1.1).abs() < 0.001);
        assert!((gi_multiplier(20.0, 20.0) - 0.85).abs() < 0.001);
    }

    #[test]
    fn test_gl_continuous() {
        assert!((gl_continuous_multiplier(0.0) - 0.15).abs() < 0.001);
        assert!((gl_continuous_multiplier(-3.0) - 0.15).abs() < 0.001);
        assert!((gl_continuous_multiplier(40.0) - 1.30).abs() < 0.001);
        assert!((gl_continuous_multiplier(80.0) - 1.30).abs() < 0.001);
        assert!((gl_continuous_multiplier(f64::NAN) - 1.0).abs() < 0.001);
        // 0.15 + 1.15 * 0.5^0.6
        assert!((gl_continuous_multiplier(20.0) - 0.9089).abs() < 0.001);
    }

    #[test]
    fn test_gl_continuous_monotonic() {
        let mut previous = gl_continuous_multiplier(0.0);
        for gl in 1..=45 {
            let current = gl_continuous_multiplier(gl as f64);
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn test_gl_scale() {
        assert!((gl_scale(0.0) - 0.25).abs() < 0.001);
        assert!((gl_scale(10.0) - 0.625).abs() < 0.001);
        assert!((gl_scale(25.0) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_macro_bonuses() {
        assert!((protein_bonus(55.0, ProteinType::Animal, 30.0) - 0.126).abs() < 0.001);
        assert!((protein_bonus(10.0, ProteinType::Whey, 30.0)).abs() < 0.001);
        assert!((fiber_bonus(12.0, 30.0) + 0.15).abs() < 0.001);
        assert!((fat_bonus(16.0, 0.0) - 0.025).abs() < 0.001);
    }

    #[test]
    fn test_large_portion() {
        let big = large_portion(1300.0);
        assert!((big.bonus - 0.25).abs() < 0.001);
        assert!((big.peak_multiplier - 0.80).abs() < 0.001);
        assert!((large_portion(500.0).bonus).abs() < 0.001);
        assert!((large_portion(650.0).bonus - 0.05).abs() < 0.001);
    }

    #[test]
    fn test_simple_ratio_multiplier() {
        assert!((simple_ratio_multiplier(1.0, 60.0) - 0.95).abs() < 0.001);
        assert!((simple_ratio_multiplier(0.1, 60.0) - 1.05).abs() < 0.001);
        assert!((simple_ratio_multiplier(0.5, 60.0) - 1.0).abs() < 0.001);
        assert!((simple_ratio_multiplier(0.0, 0.0) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_insulin_index_table() {
        let liquid = insulin_index(Some(InsulinogenicType::LiquidDairy));
        assert!((liquid.gl_boost - 1.5).abs() < 0.001);
        assert!((liquid.wave - 0.85).abs() < 0.001);
        assert_eq!(insulin_index(None), InsulinIndex::NEUTRAL);
        assert!((insulinogenic_bonus(Some(InsulinogenicType::HardDairy)) - 0.05).abs() < 0.001);
    }
}
