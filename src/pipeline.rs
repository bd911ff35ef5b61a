//! Pipeline orchestration
//!
//! This module provides the public API for the insulin wave engine.
//! It runs every timed meal of a day through extraction, factor evaluation,
//! composition and the wave model, then builds the curve, the timeline and the
//! gap statistics for the latest meal.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::calibration::{
    load_day, load_gap_history, load_lipolysis_record, load_profile, save_gap_history,
    save_lipolysis_record, GapHistory, GapHistoryEntry, KeyValueStore, LipolysisRecord,
};
use crate::clock::{
    hour_of, minutes_of_day, parse_hhmm, precise_minutes_of_day, Clock, SystemClock,
    DAY_START_MINUTES,
};
use crate::compose::{compose, Composition};
use crate::config::WaveConfig;
use crate::curve::{synthesize, CurveInputs, ScoreContext, WaveScore};
use crate::error::WaveError;
use crate::extractor::MealFeatureExtractor;
use crate::factors::activity::{select_activity_context, ActivityContext};
use crate::factors::food::{insulin_index, large_portion, temperature_peak_multiplier};
use crate::factors::metabolic::{first_meal_fasting_hours, hours_between, AutophagyState};
use crate::factors::personal::{IrScore, PersonalBaseline};
use crate::factors::{self, FactorInputs};
use crate::history::{
    classify_gap, detect_overlaps, meal_gaps, mean_minutes, worst_overlap, MealWave,
};
use crate::lookup::{NutrientLookup, ProductIndex};
use crate::ndte::ndte_from_previous_day;
use crate::types::{
    round1, DayContext, DayRecord, Meal, NutrientSnapshot, Product, WaveResult, WaveStatus,
};
use crate::wave::{
    lipolysis_kcal, wave_minutes, HypoglycemiaRisk, InsulinLevel, WavePhases, WaveTiming,
};

/// Gap history entries echoed in the result
const RECENT_GAP_ENTRIES: usize = 7;

/// Everything one wave computation needs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveInput {
    pub meals: Vec<Meal>,
    /// Overrides the configured default base hours
    pub base_wave_hours: Option<f64>,
    pub day: DayContext,
    /// Yesterday's context, for the next-day training effect
    pub previous_day: Option<DayContext>,
    pub gap_history: Vec<GapHistoryEntry>,
    pub config: WaveConfig,
    /// Projected fasting hours before the next meal (feeds autophagy)
    pub current_fasting_hours: Option<f64>,
    pub lipolysis_record: Option<LipolysisRecord>,
}

/// A document bundled with the product catalog its meals refer to.
///
/// Used by the CLI and FFI, where a single JSON document carries both.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogInput<T> {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(flatten)]
    pub body: T,
}

impl<T> CatalogInput<T> {
    /// Split into the body and an index over the catalog
    pub fn into_parts(self) -> (T, ProductIndex) {
        (self.body, ProductIndex::new(self.products))
    }
}

/// One meal run through extraction, factors and composition
struct MealEvaluation<'a> {
    meal: &'a Meal,
    minutes: i64,
    snapshot: NutrientSnapshot,
    activity: Option<ActivityContext>,
    composition: Composition,
    wave_minutes: f64,
    fasting_hours: f64,
    /// Start-to-start gap from the previous meal
    gap_minutes: Option<f64>,
}

/// Tracking date of an instant: before 03:00 it still belongs to yesterday
pub fn tracking_date(now: NaiveDateTime) -> NaiveDate {
    if minutes_of_day(now) < DAY_START_MINUTES {
        now.date() - Duration::days(1)
    } else {
        now.date()
    }
}

/// Meals with a parseable time, sorted by time
fn timed_meals(meals: &[Meal]) -> Vec<(i64, &Meal)> {
    let mut timed: Vec<(i64, &Meal)> = meals
        .iter()
        .filter_map(|meal| parse_hhmm(&meal.time).ok().map(|m| (m, meal)))
        .collect();
    timed.sort_by_key(|(minutes, _)| *minutes);
    timed
}

fn effective_config(input: &WaveInput) -> WaveConfig {
    let mut config = input.config.clone();
    if let Some(hours) = input.base_wave_hours.filter(|h| h.is_finite() && *h > 0.0) {
        config.default_base_hours = hours;
    }
    config
}

/// Compute the insulin wave of the latest meal.
///
/// # Arguments
/// * `input` - Meals, day context, rolling history and configuration
/// * `lookup` - Product catalog used to resolve meal items
/// * `now` - Wall-clock time the countdown is evaluated at
///
/// # Returns
/// The wave result, or `None` when no meal carries a parseable time
///
/// # Example
/// ```ignore
/// let products = ProductIndex::from_json(catalog_json)?;
/// let result = compute_wave(&input, &products, now);
/// ```
pub fn compute_wave(
    input: &WaveInput,
    lookup: &dyn NutrientLookup,
    now: NaiveDateTime,
) -> Option<WaveResult> {
    let meals = timed_meals(&input.meals);
    if meals.is_empty() {
        return None;
    }

    let config = effective_config(input);
    let day = &input.day;
    let profile = &day.profile;
    let personal = PersonalBaseline::from_profile(profile);
    let personal_base_hours = config.default_base_hours + personal.delta;
    let ir = IrScore::compute(profile, day.sleep_hours, day.stress);
    let now_minutes = precise_minutes_of_day(now);
    let ndte = ndte_from_previous_day(input.previous_day.as_ref(), profile, now_minutes);
    let wake_minutes = day.wake_time.as_deref().and_then(|t| parse_hhmm(t).ok());

    let last_index = meals.len() - 1;
    let mut evaluations: Vec<MealEvaluation<'_>> = Vec::with_capacity(meals.len());
    for (i, &(minutes, meal)) in meals.iter().enumerate() {
        let previous = evaluations.last();
        let fasting_hours = match previous {
            Some(prev) => hours_between(prev.minutes, minutes),
            None => first_meal_fasting_hours(minutes, wake_minutes, day.sleep_hours),
        };
        let stacking = previous.map(|prev| {
            let previous_end = prev.minutes as f64 + prev.wave_minutes;
            (previous_end - minutes as f64, prev.snapshot.glycemic_load)
        });
        let gap_minutes = previous.map(|prev| (minutes - prev.minutes) as f64);

        let snapshot = MealFeatureExtractor::extract(meal, lookup);
        let activity = select_activity_context(minutes, &snapshot, day);
        let autophagy_hours = if i == last_index {
            input.current_fasting_hours
        } else {
            None
        };

        let inputs = FactorInputs {
            snapshot: &snapshot,
            day,
            meal_minutes: minutes,
            fasting_hours: Some(fasting_hours),
            autophagy_hours,
            stacking,
            activity: activity.as_ref(),
            ndte: &ndte,
            ir: &ir,
        };
        let outputs = factors::evaluate(&inputs, &config);
        let composition = compose(
            &snapshot,
            &outputs,
            activity.as_ref(),
            personal.delta,
            &config,
        );
        let wave = wave_minutes(
            composition.base_hours,
            composition.final_multiplier,
            personal_base_hours,
            config.max_multiplier,
        );

        evaluations.push(MealEvaluation {
            meal,
            minutes,
            snapshot,
            activity,
            composition,
            wave_minutes: wave,
            fasting_hours,
            gap_minutes,
        });
    }

    let latest = evaluations.last()?;
    let timing = WaveTiming::compute(latest.minutes, now_minutes, latest.wave_minutes);
    let has_activity = latest.activity.is_some();
    let training = latest
        .activity
        .as_ref()
        .is_some_and(|a| a.training_type.is_some());

    let phases = WavePhases::compute(latest.wave_minutes, &latest.snapshot, has_activity);
    let phase = phases.phase_at(timing.elapsed_minutes, latest.wave_minutes);

    let peak_modifier = insulin_index(latest.snapshot.insulinogenic).peak
        * temperature_peak_multiplier(latest.snapshot.temperature)
        * large_portion(latest.snapshot.kcal).peak_multiplier
        * (1.0 - ndte.peak_reduction);
    let curve = synthesize(
        &CurveInputs::from_snapshot(&latest.snapshot, ir.score, training),
        latest.wave_minutes,
        peak_modifier,
    );
    let score = WaveScore::compute(
        &curve,
        latest.wave_minutes,
        &ScoreContext {
            training,
            hour: hour_of(latest.minutes),
            gap_minutes: latest.gap_minutes,
        },
    );

    let history: Vec<MealWave> = evaluations
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let duration = e.wave_minutes.round() as i64;
            MealWave {
                time: e.meal.time.clone(),
                start_min: e.minutes,
                end_min: e.minutes + duration,
                duration,
                avg_gi: e.snapshot.avg_gi,
                gl: round1(e.snapshot.glycemic_load),
                protein: round1(e.snapshot.protein),
                fiber: round1(e.snapshot.fiber),
                multiplier: e.composition.final_multiplier,
                is_active: i == last_index && timing.remaining_minutes > 0.0,
            }
        })
        .collect();
    let overlaps = detect_overlaps(&history);
    let worst = worst_overlap(&overlaps);

    let gaps_today = meal_gaps(&history);
    let avg_gap_today = mean_minutes(&gaps_today);
    let date = day.date.unwrap_or_else(|| tracking_date(now));
    let mut gap_history =
        GapHistory::from_entries(input.gap_history.clone(), config.gap_history_days);
    let history_changed = gap_history.upsert(date, avg_gap_today, gaps_today.len());
    let personal_avg_gap = gap_history.average();
    let recommended_gap = (config.default_base_hours * 60.0).round() as i64;

    let lipolysis_record = LipolysisRecord::improved(
        input.lipolysis_record.as_ref(),
        timing.lipolysis_minutes,
        date,
    )
    .or_else(|| input.lipolysis_record.clone());

    let fasting_now = input
        .current_fasting_hours
        .unwrap_or(timing.elapsed_minutes / 60.0);

    tracing::debug!(
        meals = evaluations.len(),
        wave_minutes = latest.wave_minutes,
        remaining = timing.remaining_minutes,
        "computed insulin wave"
    );

    Some(WaveResult {
        status: timing.status,
        phase,
        progress: timing.progress,
        remaining_minutes: timing.remaining_minutes,
        elapsed_minutes: timing.elapsed_minutes,
        last_meal_time: latest.meal.time.clone(),
        end_time: timing.end_time.clone(),
        wave_minutes: round1(latest.wave_minutes),
        wave_hours: round1(latest.wave_minutes / 60.0),
        base_hours: latest.composition.base_hours,
        personal_base_hours,
        final_multiplier: latest.composition.final_multiplier,
        is_night: timing.is_night,
        lipolysis_minutes: timing.lipolysis_minutes,
        lipolysis_kcal: lipolysis_kcal(timing.lipolysis_minutes, profile.weight_or_default()),
        nutrients: latest.snapshot.clone(),
        breakdown: latest.composition.clone(),
        phases,
        curve,
        score,
        insulin_level: InsulinLevel::from_progress(timing.progress),
        hypoglycemia: HypoglycemiaRisk::assess(
            &latest.snapshot,
            Some(latest.fasting_hours),
            timing.elapsed_minutes,
        ),
        overlaps,
        worst_overlap: worst,
        gaps: crate::types::GapStats {
            avg_gap_today,
            personal_avg_gap,
            recommended_gap,
            quality: classify_gap(personal_avg_gap, recommended_gap),
            recent: gap_history.recent(RECENT_GAP_ENTRIES),
            history_changed,
        },
        gap_history: gap_history.entries(),
        history,
        ndte,
        activity_context: latest.activity.clone(),
        ir_score: ir,
        autophagy: Some(AutophagyState::from_hours(fasting_now)),
        lipolysis_record,
    })
}

/// Persisted processor state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorState {
    pub gap_history: Vec<GapHistoryEntry>,
    pub lipolysis_record: Option<LipolysisRecord>,
}

/// Stateful processor that keeps calibration state in a key-value store.
///
/// Use this when the gap history and the lipolysis record should carry over
/// between computations.
pub struct WaveProcessor<S: KeyValueStore> {
    store: S,
    config: WaveConfig,
    clock: Box<dyn Clock + Send + Sync>,
}

impl<S: KeyValueStore> WaveProcessor<S> {
    /// Create a processor with default settings
    pub fn new(store: S) -> Self {
        Self::with_config(store, WaveConfig::default())
    }

    pub fn with_config(store: S, config: WaveConfig) -> Self {
        Self {
            store,
            config,
            clock: Box::new(SystemClock),
        }
    }

    /// Replace the wall clock (tests, replays)
    pub fn with_clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn set_clock(&mut self, clock: impl Clock + Send + Sync + 'static) {
        self.clock = Box::new(clock);
    }

    pub fn config(&self) -> &WaveConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Compute the wave for a day and persist what changed.
    ///
    /// Store failures are logged and degrade to "no personal history"; the
    /// computation itself still succeeds.
    pub fn compute(
        &mut self,
        day: &DayRecord,
        lookup: &dyn NutrientLookup,
    ) -> Result<Option<WaveResult>, WaveError> {
        let now = self.clock.now();
        let date = day.context.date.unwrap_or_else(|| tracking_date(now));

        let gap_history = load_gap_history(&self.store, self.config.gap_history_days)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to load gap history");
                GapHistory::new(self.config.gap_history_days)
            });
        let stored_record = load_lipolysis_record(&self.store).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load lipolysis record");
            None
        });
        let previous_day = load_day(&self.store, date - Duration::days(1))
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to load previous day");
                None
            })
            .map(|record| record.context);

        let mut context = day.context.clone();
        if context.profile == Default::default() {
            match load_profile(&self.store) {
                Ok(Some(profile)) => context.profile = profile,
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "failed to load profile"),
            }
        }
        context.date = Some(date);

        let input = WaveInput {
            meals: day.meals.clone(),
            base_wave_hours: None,
            day: context,
            previous_day,
            gap_history: gap_history.entries(),
            config: self.config.clone(),
            current_fasting_hours: None,
            lipolysis_record: stored_record.clone(),
        };

        let Some(result) = compute_wave(&input, lookup, now) else {
            return Ok(None);
        };

        if result.gaps.history_changed {
            let updated =
                GapHistory::from_entries(result.gap_history.clone(), self.config.gap_history_days);
            match save_gap_history(&self.store, &updated) {
                Ok(()) => tracing::info!(
                    date = %date,
                    avg_gap = result.gaps.avg_gap_today,
                    "gap history persisted"
                ),
                Err(e) => tracing::warn!(error = %e, "failed to persist gap history"),
            }
        }

        if let Some(record) = &result.lipolysis_record {
            if stored_record.as_ref() != Some(record) {
                match save_lipolysis_record(&self.store, record) {
                    Ok(()) => tracing::info!(minutes = record.minutes, "new lipolysis record"),
                    Err(e) => tracing::warn!(error = %e, "failed to persist lipolysis record"),
                }
            }
        }

        Ok(Some(result))
    }

    /// Compute from a day-record JSON document
    pub fn compute_json(
        &mut self,
        day_json: &str,
        lookup: &dyn NutrientLookup,
    ) -> Result<Option<WaveResult>, WaveError> {
        let day: DayRecord = serde_json::from_str(day_json)?;
        self.compute(&day, lookup)
    }

    /// Load calibration state from JSON into the store
    pub fn load_state(&mut self, json: &str) -> Result<(), WaveError> {
        let state: ProcessorState = serde_json::from_str(json)
            .map_err(|e| WaveError::ParseError(e.to_string()))?;
        let history = GapHistory::from_entries(state.gap_history, self.config.gap_history_days);
        save_gap_history(&self.store, &history)?;
        if let Some(record) = &state.lipolysis_record {
            save_lipolysis_record(&self.store, record)?;
        }
        Ok(())
    }

    /// Save calibration state to JSON
    pub fn save_state(&self) -> Result<String, WaveError> {
        let state = ProcessorState {
            gap_history: load_gap_history(&self.store, self.config.gap_history_days)?.entries(),
            lipolysis_record: load_lipolysis_record(&self.store)?,
        };
        Ok(serde_json::to_string(&state)?)
    }
}

/// Whether a result is in the fat-burning phase
pub fn is_lipolysis(result: &WaveResult) -> bool {
    result.status == WaveStatus::Lipolysis
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{MemoryStore, GAP_HISTORY_KEY};
    use crate::clock::FixedClock;
    use crate::factors::FactorId;
    use crate::types::{
        Intensity, MealItem, Product, ProductForm, Profile, Sex, Training, TrainingType,
        WavePhase,
    };
    use pretty_assertions::assert_eq;

    fn make_now(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn make_products() -> ProductIndex {
        ProductIndex::new(vec![
            Product {
                id: "candy".to_string(),
                name: "Candy".to_string(),
                protein100: 10.0,
                simple100: 60.0,
                good_fat100: 5.0,
                gi: Some(80.0),
                ..Default::default()
            },
            Product {
                id: "oats".to_string(),
                name: "Oat flakes".to_string(),
                protein100: 12.0,
                complex100: 60.0,
                good_fat100: 6.0,
                fiber100: 10.0,
                gi: Some(55.0),
                ..Default::default()
            },
            Product {
                id: "butter".to_string(),
                name: "Butter".to_string(),
                bad_fat100: 80.0,
                ..Default::default()
            },
        ])
    }

    fn make_meal(time: &str, product_id: &str, grams: f64) -> Meal {
        Meal {
            time: time.to_string(),
            items: vec![MealItem {
                product_id: Some(product_id.to_string()),
                grams: Some(grams),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn make_profile() -> Profile {
        Profile {
            age: Some(30.0),
            sex: Some(Sex::Male),
            weight_kg: Some(70.0),
            height_cm: Some(175.0),
        }
    }

    fn make_input(meals: Vec<Meal>) -> WaveInput {
        WaveInput {
            meals,
            day: DayContext {
                profile: make_profile(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_end_to_end_single_meal() {
        let input = make_input(vec![make_meal("12:00", "candy", 100.0)]);
        let result = compute_wave(&input, &make_products(), make_now(12, 0)).unwrap();

        assert_eq!(result.status, WaveStatus::Active);
        assert_eq!(result.phase, WavePhase::Rising);
        assert!(result.progress.abs() < 0.001);
        assert!((result.nutrients.avg_gi - 80.0).abs() < 0.001);
        assert!((result.nutrients.glycemic_load - 48.0).abs() < 0.001);
        assert!(result.final_multiplier > 1.0);

        let baseline = result.personal_base_hours;
        let hours = result.wave_minutes / 60.0;
        assert!(hours >= baseline - 0.01);
        assert!(hours <= baseline * 1.5 + 0.01);
        assert_eq!(result.last_meal_time, "12:00");
        assert_eq!(result.history.len(), 1);
        assert!(result.history[0].is_active);
    }

    #[test]
    fn test_no_timed_meals() {
        let mut untimed = make_meal("", "candy", 100.0);
        untimed.time = "later".to_string();
        let input = make_input(vec![untimed]);
        assert!(compute_wave(&input, &make_products(), make_now(12, 0)).is_none());
        assert!(compute_wave(&make_input(vec![]), &make_products(), make_now(12, 0)).is_none());
    }

    #[test]
    fn test_deterministic() {
        let input = make_input(vec![
            make_meal("08:00", "oats", 80.0),
            make_meal("12:30", "candy", 100.0),
        ]);
        let products = make_products();
        let first = serde_json::to_string(&compute_wave(&input, &products, make_now(13, 0))).unwrap();
        let second = serde_json::to_string(&compute_wave(&input, &products, make_now(13, 0))).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_bounds_across_extreme_contexts() {
        let products = make_products();
        let meals_options = vec![
            vec![make_meal("12:00", "candy", 300.0)],
            vec![make_meal("12:00", "butter", 50.0)],
            vec![make_meal("23:00", "oats", 200.0)],
            vec![Meal {
                time: "09:00".to_string(),
                ..Default::default()
            }],
        ];
        let hiit = Training {
            time: Some("11:30".to_string()),
            zones: Some([0.0, 0.0, 30.0, 30.0]),
            intensity: Some(Intensity::Hiit),
            training_type: TrainingType::Cardio,
            ..Default::default()
        };

        for meals in &meals_options {
            for stress in [None, Some(10.0)] {
                for sleep in [None, Some(2.0)] {
                    for trainings in [vec![], vec![hiit.clone()]] {
                        for steps in [None, Some(25_000.0)] {
                            let mut input = make_input(meals.clone());
                            input.day.stress = stress;
                            input.day.sleep_hours = sleep;
                            input.day.trainings = trainings.clone();
                            input.day.steps = steps;
                            input.day.supplements =
                                vec![crate::types::Supplement::Vinegar];
                            let result =
                                compute_wave(&input, &products, make_now(12, 30)).unwrap();
                            assert!(result.final_multiplier > 0.0);
                            assert!(result.final_multiplier <= 1.5);
                            assert!(result.wave_minutes > 0.0);
                            assert!(result.remaining_minutes >= 0.0);
                            assert!((0.0..=100.0).contains(&result.progress));
                            assert!(result.nutrients.glycemic_load >= 0.0);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_wave_capped_by_short_personal_baseline() {
        let products = ProductIndex::new(vec![Product {
            id: "bar_snack".to_string(),
            name: "Fried snack with vodka and coffee".to_string(),
            protein100: 2.0,
            simple100: 4.0,
            bad_fat100: 20.0,
            trans100: 2.0,
            gi: Some(100.0),
            harm: Some(10.0),
            form: Some(ProductForm::Processed),
            ..Default::default()
        }]);
        let profile = Profile {
            age: Some(25.0),
            sex: Some(Sex::Female),
            weight_kg: Some(45.0),
            height_cm: Some(180.0),
        };

        for grams in [50.0, 100.0, 200.0, 400.0, 1500.0] {
            let mut input = make_input(vec![make_meal("21:00", "bar_snack", grams)]);
            input.day.profile = profile.clone();
            input.day.stress = Some(10.0);
            input.day.sleep_hours = Some(3.0);
            input.day.water_ml = Some(0.0);
            input.day.cycle_day = Some(3);

            let result = compute_wave(&input, &products, make_now(21, 30)).unwrap();
            assert!(result.personal_base_hours < input.config.default_base_hours);
            let ceiling = result.personal_base_hours * input.config.max_multiplier * 60.0;
            assert!(
                result.wave_minutes <= ceiling + 0.06,
                "{} g: {} > {}",
                grams,
                result.wave_minutes,
                ceiling
            );
        }
    }

    #[test]
    fn test_lipolysis_transition() {
        let input = make_input(vec![make_meal("08:00", "candy", 100.0)]);
        let result = compute_wave(&input, &make_products(), make_now(18, 0)).unwrap();
        assert_eq!(result.status, WaveStatus::Lipolysis);
        assert_eq!(result.phase, WavePhase::Lipolysis);
        assert!(result.remaining_minutes.abs() < 0.001);
        assert!(result.lipolysis_minutes > 0.0);
        assert!(result.lipolysis_kcal > 0.0);
        assert!((result.progress - 100.0).abs() < 0.001);
        assert!(!result.history[0].is_active);
        let record = result.lipolysis_record.unwrap();
        assert!((record.minutes - result.lipolysis_minutes).abs() < 0.001);
    }

    #[test]
    fn test_midnight_rollover() {
        let input = make_input(vec![make_meal("23:30", "oats", 50.0)]);
        let now = NaiveDate::from_ymd_opt(2024, 3, 11)
            .unwrap()
            .and_hms_opt(0, 15, 0)
            .unwrap();
        let result = compute_wave(&input, &make_products(), now).unwrap();
        assert!((result.elapsed_minutes - 45.0).abs() < 0.001);
        assert!(result.is_night);
    }

    #[test]
    fn test_overlap_and_gaps() {
        let input = make_input(vec![
            make_meal("12:00", "candy", 100.0),
            make_meal("08:00", "oats", 80.0),
            make_meal("09:30", "candy", 50.0),
        ]);
        let result = compute_wave(&input, &make_products(), make_now(12, 10)).unwrap();
        assert_eq!(result.history.len(), 3);
        assert_eq!(result.history[0].time, "08:00");
        assert_eq!(result.last_meal_time, "12:00");
        // 08:00 -> 09:30 overlaps a wave of well over 90 minutes
        assert!(result.overlaps.iter().any(|o| o.from == "08:00" && o.to == "09:30"));
        assert!(result.worst_overlap.is_some());
        assert_eq!(result.gaps.avg_gap_today, 120);
        assert_eq!(result.gaps.recommended_gap, 180);
        assert!(result.gaps.history_changed);
        assert_eq!(result.gap_history.len(), 1);
        assert_eq!(result.gaps.personal_avg_gap, 120);
    }

    #[test]
    fn test_meal_stacking_factor() {
        let products = make_products();
        let alone = compute_wave(
            &make_input(vec![make_meal("09:30", "candy", 50.0)]),
            &products,
            make_now(9, 30),
        )
        .unwrap();
        let stacked = compute_wave(
            &make_input(vec![
                make_meal("08:00", "oats", 80.0),
                make_meal("09:30", "candy", 50.0),
            ]),
            &products,
            make_now(9, 30),
        )
        .unwrap();
        let stacking =
            crate::factors::factor_value(&stacked.breakdown.factors, FactorId::MealStacking);
        assert!(stacking.unwrap() < 0.0);
        let single = crate::factors::factor_value(&alone.breakdown.factors, FactorId::MealStacking);
        assert!(single.unwrap_or(0.0).abs() < 1e-9);
    }

    #[test]
    fn test_base_hours_override() {
        let mut input = make_input(vec![make_meal("12:00", "candy", 100.0)]);
        input.base_wave_hours = Some(4.0);
        let result = compute_wave(&input, &make_products(), make_now(12, 0)).unwrap();
        assert_eq!(result.gaps.recommended_gap, 240);
        assert!(result.base_hours > 3.9);
    }

    #[test]
    fn test_tracking_date_before_day_start() {
        let late = NaiveDate::from_ymd_opt(2024, 3, 11)
            .unwrap()
            .and_hms_opt(1, 0, 0)
            .unwrap();
        assert_eq!(tracking_date(late), NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
        assert_eq!(tracking_date(make_now(12, 0)), NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
    }

    fn make_day_record() -> DayRecord {
        DayRecord {
            meals: vec![
                make_meal("08:00", "oats", 80.0),
                make_meal("12:00", "candy", 100.0),
                make_meal("16:00", "oats", 60.0),
            ],
            context: DayContext {
                profile: make_profile(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_processor_persists_gap_history() {
        let mut processor =
            WaveProcessor::new(MemoryStore::new()).with_clock(FixedClock(make_now(17, 0)));
        let products = make_products();

        let first = processor.compute(&make_day_record(), &products).unwrap().unwrap();
        assert!(first.gaps.history_changed);
        let stored = processor.store().get(GAP_HISTORY_KEY).unwrap().unwrap();
        assert!(stored.contains("\"avg_gap\":240"));

        let second = processor.compute(&make_day_record(), &products).unwrap().unwrap();
        assert!(!second.gaps.history_changed);
        assert_eq!(second.gaps.personal_avg_gap, 240);
    }

    #[test]
    fn test_processor_state_roundtrip() {
        let mut processor =
            WaveProcessor::new(MemoryStore::new()).with_clock(FixedClock(make_now(23, 0)));
        processor.compute(&make_day_record(), &make_products()).unwrap();
        let saved = processor.save_state().unwrap();

        let mut restored = WaveProcessor::new(MemoryStore::new());
        restored.load_state(&saved).unwrap();
        assert_eq!(restored.save_state().unwrap(), saved);

        let state: ProcessorState = serde_json::from_str(&saved).unwrap();
        assert_eq!(state.gap_history.len(), 1);
        assert!(state.lipolysis_record.is_some());
    }

    #[test]
    fn test_processor_uses_previous_day_training() {
        let store = MemoryStore::new();
        let yesterday = DayRecord {
            meals: vec![],
            context: DayContext {
                profile: make_profile(),
                trainings: vec![Training {
                    time: Some("18:00".to_string()),
                    zones: Some([0.0, 30.0, 40.0, 30.0]),
                    ..Default::default()
                }],
                ..Default::default()
            },
        };
        crate::calibration::save_day(
            &store,
            NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
            &yesterday,
        )
        .unwrap();

        let mut processor = WaveProcessor::new(store).with_clock(FixedClock(make_now(9, 40)));
        let day = DayRecord {
            meals: vec![make_meal("09:00", "candy", 100.0)],
            context: DayContext {
                profile: make_profile(),
                ..Default::default()
            },
        };
        let result = processor.compute(&day, &make_products()).unwrap().unwrap();
        assert!(result.ndte.active);
        assert!(result.ndte.wave_multiplier < 1.0);
    }

    #[test]
    fn test_catalog_input_document() {
        let doc = r#"{
            "products": [{"id": "candy", "name": "Candy", "simple100": 60, "gi": 80}],
            "meals": [{"time": "12:00", "items": [{"product_id": "candy", "grams": 100}]}],
            "steps": 8000
        }"#;
        let input: CatalogInput<DayRecord> = serde_json::from_str(doc).unwrap();
        let (day, products) = input.into_parts();
        assert_eq!(products.len(), 1);
        assert_eq!(day.meals.len(), 1);
        assert_eq!(day.context.steps, Some(8000.0));
    }

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>, WaveError> {
            Err(WaveError::StoreError("store unavailable".to_string()))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), WaveError> {
            Err(WaveError::StoreError("store unavailable".to_string()))
        }
    }

    #[test]
    fn test_processor_failing_store_degrades() {
        let products = make_products();
        let mut failing =
            WaveProcessor::new(FailingStore).with_clock(FixedClock(make_now(17, 0)));
        let mut fresh =
            WaveProcessor::new(MemoryStore::new()).with_clock(FixedClock(make_now(17, 0)));

        let degraded = failing.compute(&make_day_record(), &products).unwrap().unwrap();
        let baseline = fresh.compute(&make_day_record(), &products).unwrap().unwrap();
        assert_eq!(degraded.status, WaveStatus::Active);
        assert!(degraded.gaps.history_changed);
        assert_eq!(
            serde_json::to_string(&degraded).unwrap(),
            serde_json::to_string(&baseline).unwrap()
        );

        // stored profile lookup fails too when the record has none
        let mut anonymous = make_day_record();
        anonymous.context.profile = Profile::default();
        assert!(failing.compute(&anonymous, &products).unwrap().is_some());

        assert!(failing.save_state().is_err());
    }

    #[test]
    fn test_processor_invalid_state() {
        let mut processor = WaveProcessor::new(MemoryStore::new());
        assert!(processor.load_state("not json").is_err());
    }
}
