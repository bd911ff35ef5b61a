//! Per-meal wave timeline, overlaps and meal-gap statistics

use serde::{Deserialize, Serialize};

/// One meal's wave on the day timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealWave {
    pub time: String,
    /// Meal start (minutes from midnight, extended axis)
    pub start_min: i64,
    pub end_min: i64,
    /// Wave length (minutes)
    pub duration: i64,
    pub avg_gi: f64,
    pub gl: f64,
    pub protein: f64,
    pub fiber: f64,
    pub multiplier: f64,
    /// The latest meal whose wave has not ended yet
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn from_minutes(overlap_minutes: i64) -> Self {
        if overlap_minutes > 60 {
            Self::High
        } else if overlap_minutes >= 30 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// A meal eaten before the previous wave ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overlap {
    pub from: String,
    pub to: String,
    pub overlap_minutes: i64,
    pub severity: Severity,
}

/// Adjacent-pair overlaps of a chronologically sorted timeline
pub fn detect_overlaps(waves: &[MealWave]) -> Vec<Overlap> {
    waves
        .windows(2)
        .filter(|pair| pair[0].end_min > pair[1].start_min)
        .map(|pair| {
            let overlap_minutes = pair[0].end_min - pair[1].start_min;
            Overlap {
                from: pair[0].time.clone(),
                to: pair[1].time.clone(),
                overlap_minutes,
                severity: Severity::from_minutes(overlap_minutes),
            }
        })
        .collect()
}

/// Longest overlap; the earliest wins ties
pub fn worst_overlap(overlaps: &[Overlap]) -> Option<Overlap> {
    overlaps
        .iter()
        .fold(None::<&Overlap>, |worst, o| match worst {
            Some(w) if w.overlap_minutes >= o.overlap_minutes => Some(w),
            _ => Some(o),
        })
        .cloned()
}

/// Start-to-start gaps of a sorted timeline
pub fn meal_gaps(waves: &[MealWave]) -> Vec<i64> {
    waves
        .windows(2)
        .map(|pair| pair[1].start_min - pair[0].start_min)
        .collect()
}

/// Rounded mean of integer minutes (0 when empty)
pub fn mean_minutes(values: &[i64]) -> i64 {
    if values.is_empty() {
        return 0;
    }
    let sum: i64 = values.iter().sum();
    (sum as f64 / values.len() as f64).round() as i64
}

/// How the personal meal rhythm compares to the recommended gap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapQuality {
    Excellent,
    Good,
    Moderate,
    NeedsWork,
    Unknown,
}

/// Classify a personal average gap against the recommendation.
///
/// Compared in integer per-mille so exactly 90% lands on `Excellent`.
pub fn classify_gap(personal_avg_gap: i64, recommended_gap: i64) -> GapQuality {
    if personal_avg_gap <= 0 || recommended_gap <= 0 {
        return GapQuality::Unknown;
    }
    let scaled = personal_avg_gap * 1000;
    if scaled >= recommended_gap * 900 {
        GapQuality::Excellent
    } else if scaled >= recommended_gap * 750 {
        GapQuality::Good
    } else if scaled >= recommended_gap * 500 {
        GapQuality::Moderate
    } else {
        GapQuality::NeedsWork
    }
}
