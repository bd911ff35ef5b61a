//! Curve synthesis and wave scoring
//!
//! A presentation model: the insulin response is drawn as the sum of three
//! Gaussian components (fast secretion, slow secretion, hepatic clearance)
//! over normalized time. Nothing here feeds back into the wave duration.

use serde::{Deserialize, Serialize};

use crate::clock::is_night_hour;
use crate::types::NutrientSnapshot;

/// Resting insulin level relative to the peak
pub const BASELINE_LEVEL: f64 = 0.05;

/// Number of intervals the curve is sampled at (points = intervals + 1)
pub const SAMPLE_INTERVALS: usize = 100;

const PREDICTION_MINUTES: [f64; 5] = [15.0, 30.0, 60.0, 90.0, 120.0];

const SAFE_TO_EAT_LEVEL: f64 = 0.3;
const FAT_BURNING_LEVEL: f64 = 0.15;
const OPTIMAL_WINDOW_LEVEL: f64 = 0.25;

// Reference AUCs: 50 g glucose = 1.0
const REFERENCE_RICE: f64 = 0.85;
const REFERENCE_OATMEAL: f64 = 0.45;

/// One Gaussian component
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveComponent {
    pub amplitude: f64,
    pub sigma: f64,
    /// Peak position (0-1)
    pub peak: f64,
}

impl CurveComponent {
    pub fn value_at(&self, t: f64) -> f64 {
        self.amplitude * (-(t - self.peak).powi(2) / (2.0 * self.sigma * self.sigma)).exp()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveComponents {
    pub fast: CurveComponent,
    pub slow: CurveComponent,
    pub hepatic: CurveComponent,
}

/// Meal-level inputs to the curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveInputs {
    pub gi: f64,
    pub simple_ratio: f64,
    pub simple: f64,
    pub complex: f64,
    pub protein: f64,
    pub fat: f64,
    pub fiber: f64,
    pub liquid: bool,
    pub alcohol: bool,
    /// Insulin-resistance score above 1.0
    pub ir_excess: f64,
    pub training: bool,
}

impl CurveInputs {
    pub fn from_snapshot(snapshot: &NutrientSnapshot, ir_score: f64, training: bool) -> Self {
        Self {
            gi: snapshot.avg_gi,
            simple_ratio: snapshot.simple_ratio,
            simple: snapshot.simple,
            complex: snapshot.complex,
            protein: snapshot.protein,
            fat: snapshot.fat,
            fiber: snapshot.fiber,
            liquid: snapshot.has_liquid,
            alcohol: snapshot.alcohol.is_some(),
            ir_excess: (ir_score - 1.0).max(0.0),
            training,
        }
    }
}

impl CurveComponents {
    pub fn from_inputs(inputs: &CurveInputs) -> Self {
        let mut fast = CurveComponent {
            amplitude: 0.6,
            sigma: 0.12,
            peak: 0.15,
        };
        if inputs.gi > 70.0 {
            fast.amplitude *= 1.3;
        }
        if inputs.simple_ratio > 0.5 {
            fast.amplitude *= 1.0 + (inputs.simple_ratio - 0.5);
        }
        if inputs.liquid {
            fast.amplitude *= 1.5;
            fast.sigma *= 0.8;
            fast.peak *= 0.8;
        }
        if inputs.fiber >= 5.0 {
            fast.amplitude *= 0.7;
            fast.sigma *= 1.2;
        }

        let mut slow = CurveComponent {
            amplitude: 0.35,
            sigma: 0.25,
            peak: 0.45,
        };
        if inputs.protein >= 20.0 {
            slow.amplitude *= 1.4;
        }
        if inputs.fat >= 15.0 {
            slow.amplitude *= 1.3;
        }
        if inputs.complex > inputs.simple {
            slow.amplitude *= 1.2;
        }

        let mut hepatic = CurveComponent {
            amplitude: 0.05,
            sigma: 0.35,
            peak: 0.70,
        };
        if inputs.ir_excess > 0.3 {
            hepatic.amplitude *= 1.5 * (1.0 + inputs.ir_excess);
        }
        if inputs.alcohol {
            hepatic.amplitude *= 1.3;
        }

        // working muscle takes up glucose
        if inputs.training {
            fast.amplitude *= 0.8;
            hepatic.sigma *= 0.9;
        }

        Self { fast, slow, hepatic }
    }

    /// Fast amplitude share of all amplitudes
    pub fn fast_contribution(&self) -> f64 {
        let total = self.fast.amplitude + self.slow.amplitude + self.hepatic.amplitude;
        if total > 0.0 {
            self.fast.amplitude / total
        } else {
            0.0
        }
    }

    fn value_at(&self, t: f64) -> f64 {
        BASELINE_LEVEL + self.fast.value_at(t) + self.slow.value_at(t) + self.hepatic.value_at(t)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveShape {
    Spike,
    Balanced,
    Prolonged,
}

impl WaveShape {
    pub fn from_fast_contribution(share: f64) -> Self {
        if share >= 0.7 {
            Self::Spike
        } else if share <= 0.3 {
            Self::Prolonged
        } else {
            Self::Balanced
        }
    }
}

/// Early vs late distribution of the area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AucShape {
    FrontLoaded,
    Normal,
    Prolonged,
}

/// Relative insulin level band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelBand {
    Peak,
    High,
    Moderate,
    Low,
    Baseline,
}

impl LevelBand {
    pub fn from_value(value: f64) -> Self {
        if value >= 0.9 {
            Self::Peak
        } else if value >= 0.6 {
            Self::High
        } else if value >= 0.3 {
            Self::Moderate
        } else if value >= 0.1 {
            Self::Low
        } else {
            Self::Baseline
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    /// Normalized time (0-1)
    pub t: f64,
    pub minutes: f64,
    /// Level relative to the peak (0-1)
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelPrediction {
    pub minutes: f64,
    pub value: f64,
    pub band: LevelBand,
}

/// Predicted levels and meal-timing hints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsulinForecast {
    pub predictions: Vec<LevelPrediction>,
    pub safe_to_eat_minutes: Option<f64>,
    pub fat_burning_minutes: Option<f64>,
    pub optimal_next_meal_minutes: Option<f64>,
}

/// Synthesized curve with its analytics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveCurve {
    pub points: Vec<CurvePoint>,
    pub components: CurveComponents,
    pub shape: WaveShape,
    pub fast_contribution: f64,
    pub peak_minutes: f64,
    /// Un-normalized peak after meal peak modifiers
    pub peak_value: f64,
    /// Mean sampled level
    pub auc: f64,
    pub total_auc: f64,
    pub early_auc: f64,
    pub peak_auc: f64,
    pub late_auc: f64,
    /// Area above the baseline level
    pub iauc: f64,
    pub early_late_ratio: f64,
    pub auc_shape: AucShape,
    /// Total area relative to 50 g glucose
    pub normalized_auc: f64,
    pub vs_rice: f64,
    pub vs_oatmeal: f64,
    pub forecast: InsulinForecast,
}

/// Trapezoidal area between `start` and `end` (normalized time)
pub fn trapezoidal_auc(points: &[CurvePoint], start: f64, end: f64) -> f64 {
    points
        .windows(2)
        .filter(|w| w[0].t >= start && w[1].t <= end)
        .map(|w| (w[0].value + w[1].value) * (w[1].t - w[0].t) / 2.0)
        .sum()
}

fn incremental_auc(points: &[CurvePoint], baseline: f64) -> f64 {
    let adjusted: Vec<CurvePoint> = points
        .iter()
        .map(|p| CurvePoint {
            value: (p.value - baseline).max(0.0),
            ..*p
        })
        .collect();
    trapezoidal_auc(&adjusted, 0.0, 1.0)
}

/// Level at `minutes` by linear interpolation (past the end: last point)
pub fn level_at(points: &[CurvePoint], wave_minutes: f64) -> impl Fn(f64) -> f64 + '_ {
    move |minutes| {
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            return 0.0;
        };
        if wave_minutes <= 0.0 {
            return last.value;
        }
        let t = (minutes / wave_minutes).clamp(0.0, 1.0);
        points
            .windows(2)
            .find(|w| w[0].t <= t && w[1].t >= t)
            .map(|w| {
                let span = w[1].t - w[0].t;
                let ratio = if span > 0.0 { (t - w[0].t) / span } else { 0.0 };
                w[0].value + ratio * (w[1].value - w[0].value)
            })
            .unwrap_or(if t <= first.t { first.value } else { last.value })
    }
}

fn forecast(points: &[CurvePoint], wave_minutes: f64, peak_index: usize) -> InsulinForecast {
    let level = level_at(points, wave_minutes);
    let predictions = PREDICTION_MINUTES
        .iter()
        .map(|&minutes| {
            let value = level(minutes);
            LevelPrediction {
                minutes,
                value,
                band: LevelBand::from_value(value),
            }
        })
        .collect();

    let after_peak = points.get(peak_index..).unwrap_or_default();
    let first_below =
        |threshold: f64| after_peak.iter().find(|p| p.value < threshold).map(|p| p.minutes);

    InsulinForecast {
        predictions,
        safe_to_eat_minutes: first_below(SAFE_TO_EAT_LEVEL),
        fat_burning_minutes: first_below(FAT_BURNING_LEVEL),
        optimal_next_meal_minutes: first_below(OPTIMAL_WINDOW_LEVEL),
    }
}

/// Sample the curve over a wave.
///
/// `peak_modifier` scales the reported (un-normalized) peak: insulin index,
/// serving temperature, portion size and next-day training effects.
pub fn synthesize(inputs: &CurveInputs, wave_minutes: f64, peak_modifier: f64) -> WaveCurve {
    let components = CurveComponents::from_inputs(inputs);

    let raw: Vec<(f64, f64)> = (0..=SAMPLE_INTERVALS)
        .map(|i| {
            let t = i as f64 / SAMPLE_INTERVALS as f64;
            (t, components.value_at(t))
        })
        .collect();

    // first maximum wins
    let (peak_index, max_value) = raw
        .iter()
        .enumerate()
        .fold((0, 0.0_f64), |(best_i, best_v), (i, &(_, v))| {
            if v > best_v {
                (i, v)
            } else {
                (best_i, best_v)
            }
        });
    let mean = raw.iter().map(|(_, v)| v).sum::<f64>() / raw.len() as f64;
    let scale = if max_value > 0.0 { max_value } else { 1.0 };

    let points: Vec<CurvePoint> = raw
        .iter()
        .map(|&(t, v)| CurvePoint {
            t,
            minutes: (t * wave_minutes).round(),
            value: v / scale,
        })
        .collect();

    let total_auc = trapezoidal_auc(&points, 0.0, 1.0);
    let early_auc = trapezoidal_auc(&points, 0.0, 0.25);
    let late_auc = trapezoidal_auc(&points, 0.5, 1.0);
    let early_late_ratio = if late_auc > 0.0 {
        early_auc / late_auc
    } else {
        0.0
    };
    let auc_shape = if early_late_ratio > 1.5 {
        AucShape::FrontLoaded
    } else if early_late_ratio < 0.5 {
        AucShape::Prolonged
    } else {
        AucShape::Normal
    };
    let fast_contribution = components.fast_contribution();

    WaveCurve {
        forecast: forecast(&points, wave_minutes, peak_index),
        peak_minutes: points[peak_index].minutes,
        peak_value: max_value * peak_modifier,
        auc: mean,
        total_auc,
        early_auc,
        peak_auc: trapezoidal_auc(&points, 0.15, 0.5),
        late_auc,
        iauc: incremental_auc(&points, BASELINE_LEVEL),
        early_late_ratio,
        auc_shape,
        normalized_auc: total_auc,
        vs_rice: total_auc / REFERENCE_RICE,
        vs_oatmeal: total_auc / REFERENCE_OATMEAL,
        shape: WaveShape::from_fast_contribution(fast_contribution),
        fast_contribution,
        components,
        points,
    }
}

// ============================================================================
// Wave score
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreLevel {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl ScoreLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            Self::Excellent
        } else if score >= 70.0 {
            Self::Good
        } else if score >= 50.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

/// Meal context for the context sub-score
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoreContext {
    pub training: bool,
    /// Meal hour (0-24)
    pub hour: f64,
    /// Gap since the previous meal
    pub gap_minutes: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub peak: f64,
    pub duration: f64,
    pub shape: f64,
    pub auc: f64,
    pub context: f64,
}

/// Overall wave quality (0-100)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveScore {
    pub score: f64,
    pub level: ScoreLevel,
    pub components: ScoreComponents,
}

fn tier_score(value: f64, thresholds: [f64; 4]) -> f64 {
    const SCORES: [f64; 4] = [100.0, 85.0, 70.0, 50.0];
    thresholds
        .iter()
        .zip(SCORES)
        .find(|(limit, _)| value <= **limit)
        .map(|(_, score)| score)
        .unwrap_or(30.0)
}

pub fn peak_score(peak_value: f64) -> f64 {
    tier_score(peak_value, [0.6, 0.75, 0.9, 1.0])
}

pub fn auc_score(normalized_auc: f64) -> f64 {
    tier_score(normalized_auc, [0.5, 0.75, 1.0, 1.5])
}

/// 100 at the 180-minute target, 85 at the tolerance edge, 0 past 60 minutes off
pub fn duration_score(wave_minutes: f64) -> f64 {
    const TARGET: f64 = 180.0;
    const TOLERANCE: f64 = 30.0;
    const MAX_PENALTY: f64 = 60.0;
    let deviation = (wave_minutes - TARGET).abs();
    if deviation <= TOLERANCE {
        return 100.0 - deviation / TOLERANCE * 15.0;
    }
    let penalty = ((deviation - TOLERANCE) / (MAX_PENALTY - TOLERANCE)).min(1.0);
    (85.0 - penalty * 85.0).max(0.0)
}

pub fn shape_score(shape: WaveShape) -> f64 {
    match shape {
        WaveShape::Prolonged => 95.0,
        WaveShape::Balanced => 80.0,
        WaveShape::Spike => 50.0,
    }
}

pub fn context_score(context: &ScoreContext) -> f64 {
    let mut score: f64 = 70.0;
    if context.training {
        score += 15.0;
    }
    if (6.0..18.0).contains(&context.hour) {
        score += 10.0;
    } else if is_night_hour(context.hour) {
        score -= 10.0;
    }
    if context.gap_minutes.is_some_and(|gap| gap >= 180.0) {
        score += 5.0;
    }
    score.clamp(0.0, 100.0)
}

impl WaveScore {
    pub fn compute(curve: &WaveCurve, wave_minutes: f64, context: &ScoreContext) -> Self {
        let components = ScoreComponents {
            peak: peak_score(curve.peak_value),
            duration: duration_score(wave_minutes),
            shape: shape_score(curve.shape),
            auc: auc_score(curve.normalized_auc),
            context: context_score(context),
        };
        let weighted = components.peak * 0.25
            + components.duration * 0.20
            + components.shape * 0.20
            + components.auc * 0.20
            + components.context * 0.15;
        let score = weighted.round();
        Self {
            score,
            level: ScoreLevel::from_score(score),
            components,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn make_inputs() -> CurveInputs {
        CurveInputs {
            gi: 50.0,
            simple_ratio: 0.0,
            simple: 0.0,
            complex: 0.0,
            protein: 0.0,
            fat: 0.0,
            fiber: 0.0,
            liquid: false,
            alcohol: false,
            ir_excess: 0.0,
            training: false,
        }
    }

    #[test]
    fn test_curve_normalized_to_peak() {
        let curve = synthesize(&make_inputs(), 180.0, 1.0);
        assert_eq!(curve.points.len(), SAMPLE_INTERVALS + 1);
        let max = curve.points.iter().map(|p| p.value).fold(0.0, f64::max);
        assert!((max - 1.0).abs() < 0.001);
        assert!((curve.points[100].minutes - 180.0).abs() < 0.001);
    }

    #[test]
    fn test_peak_near_fast_component() {
        let curve = synthesize(&make_inputs(), 200.0, 1.0);
        // fast peak at t=0.15 dominates
        assert!((curve.peak_minutes - 30.0).abs() <= 6.0);
        assert_eq!(curve.shape, WaveShape::Balanced);
    }

    #[test]
    fn test_shape_spike_for_liquid_sugar() {
        let inputs = CurveInputs {
            gi: 90.0,
            simple_ratio: 1.0,
            simple: 50.0,
            liquid: true,
            ..make_inputs()
        };
        let curve = synthesize(&inputs, 120.0, 1.0);
        assert_eq!(curve.shape, WaveShape::Spike);
        assert!(curve.early_late_ratio > 1.0);
    }

    #[test]
    fn test_shape_prolonged_for_rich_meal() {
        let inputs = CurveInputs {
            protein: 40.0,
            fat: 25.0,
            fiber: 8.0,
            complex: 30.0,
            training: true,
            ..make_inputs()
        };
        let curve = synthesize(&inputs, 240.0, 1.0);
        assert_eq!(curve.shape, WaveShape::Prolonged);
    }

    #[test]
    fn test_auc_segments_consistent() {
        let curve = synthesize(&make_inputs(), 180.0, 1.0);
        assert!(curve.total_auc > 0.0 && curve.total_auc <= 1.0);
        assert!(curve.iauc < curve.total_auc);
        assert!(curve.early_auc + curve.late_auc < curve.total_auc + 0.001);
        assert!((curve.vs_rice - curve.total_auc / 0.85).abs() < 0.001);
    }

    #[test]
    fn test_forecast_after_peak() {
        let curve = synthesize(&make_inputs(), 180.0, 1.0);
        assert_eq!(curve.forecast.predictions.len(), 5);
        let safe = curve.forecast.safe_to_eat_minutes.unwrap();
        assert!(safe > curve.peak_minutes);
        if let Some(fat) = curve.forecast.fat_burning_minutes {
            assert!(fat >= safe);
        }
    }

    #[test]
    fn test_level_interpolation() {
        let points = vec![
            CurvePoint {
                t: 0.0,
                minutes: 0.0,
                value: 0.0,
            },
            CurvePoint {
                t: 1.0,
                minutes: 100.0,
                value: 1.0,
            },
        ];
        let level = level_at(&points, 100.0);
        assert!((level(25.0) - 0.25).abs() < 0.001);
        assert!((level(500.0) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_training_dampens_fast_component() {
        let idle = CurveComponents::from_inputs(&make_inputs());
        let trained = CurveComponents::from_inputs(&CurveInputs {
            training: true,
            ..make_inputs()
        });
        assert!((trained.fast.amplitude - idle.fast.amplitude * 0.8).abs() < 0.001);
        assert!((trained.hepatic.sigma - 0.315).abs() < 0.001);
    }

    #[test]
    fn test_score_tiers() {
        assert!((peak_score(0.5) - 100.0).abs() < 0.001);
        assert!((peak_score(0.8) - 70.0).abs() < 0.001);
        assert!((peak_score(1.2) - 30.0).abs() < 0.001);
        assert!((duration_score(180.0) - 100.0).abs() < 0.001);
        assert!((duration_score(210.0) - 85.0).abs() < 0.001);
        assert!(duration_score(300.0).abs() < 0.001);
        assert!((auc_score(0.6) - 85.0).abs() < 0.001);
    }

    #[test]
    fn test_context_score() {
        let day = ScoreContext {
            training: true,
            hour: 12.0,
            gap_minutes: Some(200.0),
        };
        assert!((context_score(&day) - 100.0).abs() < 0.001);
        let night = ScoreContext {
            hour: 23.0,
            ..Default::default()
        };
        assert!((context_score(&night) - 60.0).abs() < 0.001);
    }

    #[test]
    fn test_wave_score_level() {
        let curve = synthesize(&make_inputs(), 180.0, 1.0);
        let score = WaveScore::compute(&curve, 180.0, &ScoreContext::default());
        assert!(score.score >= 0.0 && score.score <= 100.0);
        assert_eq!(score.level, ScoreLevel::from_score(score.score));
    }
}
