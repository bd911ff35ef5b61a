//! Engine configuration
//!
//! Tunable constants of the composition engine. Every field has a default, so
//! a partial JSON document (or none at all) yields a working configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::WaveError;
use crate::factors::{Bucket, FactorId, FactorKind};

/// Default personal base wave length (hours)
pub const DEFAULT_BASE_HOURS: f64 = 3.0;

/// Default rolling gap-history window (days)
pub const DEFAULT_GAP_HISTORY_DAYS: usize = 14;

/// Glycemic-load damping: how strongly low-GL meals mute context factors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DampingConfig {
    /// Scale applied at GL 0
    pub floor: f64,
    /// GL at and above which no damping applies
    pub threshold: f64,
}

impl DampingConfig {
    /// Damping scale for a glycemic load, in `[floor, 1]`
    pub fn scale(&self, gl: f64) -> f64 {
        if !gl.is_finite() || self.threshold <= 0.0 {
            return 1.0;
        }
        if gl >= self.threshold {
            return 1.0;
        }
        let gl = gl.max(0.0);
        (self.floor + (gl / self.threshold) * (1.0 - self.floor)).max(self.floor)
    }
}

/// Composition engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveConfig {
    /// Base wave hours used when no personal baseline applies
    pub default_base_hours: f64,
    /// Upper clamp of the final multiplier
    pub max_multiplier: f64,
    /// Lower clamp of the final multiplier (and of the food bucket)
    pub min_multiplier: f64,
    /// Floor of the activity bucket
    pub activity_floor: f64,
    /// Magnitude limit for individual non-activity bonuses
    pub factor_bonus_limit: f64,
    /// Damping of day-level factors and the personal deviation
    pub day_damping: DampingConfig,
    /// Damping of the circadian multiplier
    pub circadian_damping: DampingConfig,
    /// Weight of the insulin-resistance excess in the final product
    pub ir_weight: f64,
    /// Days kept in the rolling gap history
    pub gap_history_days: usize,
    /// Bucket overrides for bonus factors
    pub buckets: BTreeMap<FactorId, Bucket>,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            default_base_hours: DEFAULT_BASE_HOURS,
            max_multiplier: 1.5,
            min_multiplier: 0.1,
            activity_floor: 0.1,
            factor_bonus_limit: 0.30,
            day_damping: DampingConfig {
                floor: 0.3,
                threshold: 20.0,
            },
            circadian_damping: DampingConfig {
                floor: 0.2,
                threshold: 20.0,
            },
            ir_weight: 0.5,
            gap_history_days: DEFAULT_GAP_HISTORY_DAYS,
            buckets: BTreeMap::new(),
        }
    }
}

impl WaveConfig {
    /// Bucket of a bonus factor, honoring overrides. `None` for multipliers.
    pub fn bucket_for(&self, id: FactorId) -> Option<Bucket> {
        if id.kind() != FactorKind::Bonus {
            return None;
        }
        self.buckets
            .get(&id)
            .copied()
            .or_else(|| id.default_bucket())
    }

    /// Check ranges and bucket overrides
    pub fn validate(&self) -> Result<(), WaveError> {
        let positive = [
            ("default_base_hours", self.default_base_hours),
            ("max_multiplier", self.max_multiplier),
            ("min_multiplier", self.min_multiplier),
            ("activity_floor", self.activity_floor),
            ("day_damping.threshold", self.day_damping.threshold),
            ("circadian_damping.threshold", self.circadian_damping.threshold),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(WaveError::ConfigError(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }

        if self.min_multiplier > self.max_multiplier {
            return Err(WaveError::ConfigError(format!(
                "min_multiplier {} exceeds max_multiplier {}",
                self.min_multiplier, self.max_multiplier
            )));
        }

        for (name, damping) in [
            ("day_damping", &self.day_damping),
            ("circadian_damping", &self.circadian_damping),
        ] {
            if !(0.0..=1.0).contains(&damping.floor) {
                return Err(WaveError::ConfigError(format!(
                    "{}.floor must be within 0..=1, got {}",
                    name, damping.floor
                )));
            }
        }

        if !self.factor_bonus_limit.is_finite() || self.factor_bonus_limit < 0.0 {
            return Err(WaveError::ConfigError(format!(
                "factor_bonus_limit must be non-negative, got {}",
                self.factor_bonus_limit
            )));
        }

        if !self.ir_weight.is_finite() || self.ir_weight < 0.0 {
            return Err(WaveError::ConfigError(format!(
                "ir_weight must be non-negative, got {}",
                self.ir_weight
            )));
        }

        if self.gap_history_days == 0 {
            return Err(WaveError::ConfigError(
                "gap_history_days must be at least 1".to_string(),
            ));
        }

        for id in self.buckets.keys() {
            if id.kind() != FactorKind::Bonus {
                return Err(WaveError::ConfigError(format!(
                    "{:?} is a multiplier and has no bucket",
                    id
                )));
            }
        }

        Ok(())
    }

    /// Load a configuration from JSON and validate it
    pub fn from_json(json: &str) -> Result<Self, WaveError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Export the configuration as JSON
    pub fn to_json(&self) -> Result<String, WaveError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_damping_scale() {
        let damping = DampingConfig {
            floor: 0.3,
            threshold: 20.0,
        };
        assert!((damping.scale(0.0) - 0.3).abs() < 0.001);
        assert!((damping.scale(10.0) - 0.65).abs() < 0.001);
        assert!((damping.scale(20.0) - 1.0).abs() < 0.001);
        assert!((damping.scale(48.0) - 1.0).abs() < 0.001);
        assert!((damping.scale(f64::NAN) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_damping_monotonic() {
        let damping = WaveConfig::default().circadian_damping;
        let mut previous = damping.scale(0.0);
        for gl in 1..=25 {
            let current = damping.scale(gl as f64);
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = WaveConfig::from_json(r#"{"ir_weight": 0.25}"#).unwrap();
        assert!((config.ir_weight - 0.25).abs() < 0.001);
        assert!((config.max_multiplier - 1.5).abs() < 0.001);
        assert_eq!(config.gap_history_days, 14);
    }

    #[test]
    fn test_bucket_override() {
        let config = WaveConfig::from_json(r#"{"buckets": {"caffeine": "day_level"}}"#).unwrap();
        assert_eq!(
            config.bucket_for(FactorId::Caffeine),
            Some(Bucket::DayLevel)
        );
        assert_eq!(config.bucket_for(FactorId::Stress), Some(Bucket::DayLevel));
        assert_eq!(config.bucket_for(FactorId::Circadian), None);
    }

    #[test]
    fn test_rejects_multiplier_bucket() {
        let result = WaveConfig::from_json(r#"{"buckets": {"circadian": "food"}}"#);
        assert!(matches!(result, Err(WaveError::ConfigError(_))));
    }

    #[test]
    fn test_rejects_inverted_clamps() {
        let result = WaveConfig::from_json(r#"{"min_multiplier": 2.0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = WaveConfig::default();
        let json = config.to_json().unwrap();
        let restored = WaveConfig::from_json(&json).unwrap();
        assert_eq!(config, restored);
    }
}
