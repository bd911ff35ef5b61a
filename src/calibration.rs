//! Personal calibration store
//!
//! Cross-day state (the rolling meal-gap log and the lipolysis personal best)
//! lives behind a string key-value store. Values are JSON documents so the
//! layout stays compatible with whatever persistence the host app provides.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::config::DEFAULT_GAP_HISTORY_DAYS;
use crate::error::WaveError;
use crate::types::{DayRecord, Profile};

/// Rolling meal-gap history
pub const GAP_HISTORY_KEY: &str = "heys_meal_gaps_history";

/// Longest lipolysis stretch on record
pub const LIPOLYSIS_RECORD_KEY: &str = "heys_lipolysis_record";

/// User profile
pub const PROFILE_KEY: &str = "heys_profile";

const DAY_KEY_PREFIX: &str = "heys_dayv2_";

/// Store key of a day record
pub fn day_key(date: NaiveDate) -> String {
    format!("{}{}", DAY_KEY_PREFIX, date.format("%Y-%m-%d"))
}

/// String key-value persistence
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, WaveError>;
    fn set(&self, key: &str, value: &str) -> Result<(), WaveError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn get(&self, key: &str) -> Result<Option<String>, WaveError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), WaveError> {
        (**self).set(key, value)
    }
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, WaveError> {
        let values = self
            .values
            .read()
            .map_err(|e| WaveError::StoreError(e.to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), WaveError> {
        let mut values = self
            .values
            .write()
            .map_err(|e| WaveError::StoreError(e.to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store backed by one JSON file holding a key → value map.
///
/// Every write rewrites the whole file; a missing file reads as empty.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>, WaveError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, WaveError> {
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), WaveError> {
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        fs::write(&self.path, serde_json::to_string_pretty(&map)?)?;
        Ok(())
    }
}

/// Average start-to-start meal gap of one day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapHistoryEntry {
    pub date: NaiveDate,
    /// Minutes
    #[serde(alias = "avgGap")]
    pub avg_gap: i64,
    /// Number of gaps the average was taken over
    pub count: usize,
}

/// Rolling per-day gap log, one entry per date, oldest evicted first
#[derive(Debug, Clone, PartialEq)]
pub struct GapHistory {
    entries: VecDeque<GapHistoryEntry>,
    max_days: usize,
}

impl Default for GapHistory {
    fn default() -> Self {
        Self::new(DEFAULT_GAP_HISTORY_DAYS)
    }
}

impl GapHistory {
    pub fn new(max_days: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_days),
            max_days: max_days.max(1),
        }
    }

    /// Build from stored entries, keeping the newest `max_days` dates
    pub fn from_entries(entries: Vec<GapHistoryEntry>, max_days: usize) -> Self {
        let mut history = Self::new(max_days);
        for entry in entries {
            history.insert(entry);
        }
        history
    }

    fn insert(&mut self, entry: GapHistoryEntry) {
        match self.entries.iter().position(|e| e.date >= entry.date) {
            Some(i) if self.entries[i].date == entry.date => self.entries[i] = entry,
            Some(i) => self.entries.insert(i, entry),
            None => self.entries.push_back(entry),
        }
        while self.entries.len() > self.max_days {
            self.entries.pop_front();
        }
    }

    /// Record today's average gap; returns whether the log changed.
    ///
    /// A zero average (fewer than two meals) is never recorded.
    pub fn upsert(&mut self, date: NaiveDate, avg_gap: i64, count: usize) -> bool {
        if avg_gap <= 0 {
            return false;
        }
        let entry = GapHistoryEntry {
            date,
            avg_gap,
            count,
        };
        if self.entries.iter().any(|e| *e == entry) {
            return false;
        }
        self.insert(entry);
        true
    }

    /// Rounded mean gap over the log (0 when empty)
    pub fn average(&self) -> i64 {
        if self.entries.is_empty() {
            return 0;
        }
        let sum: i64 = self.entries.iter().map(|e| e.avg_gap).sum();
        (sum as f64 / self.entries.len() as f64).round() as i64
    }

    /// The newest `n` entries, oldest first
    pub fn recent(&self, n: usize) -> Vec<GapHistoryEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn entries(&self) -> Vec<GapHistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse the stored JSON array
    pub fn from_json(json: &str, max_days: usize) -> Result<Self, serde_json::Error> {
        let entries: Vec<GapHistoryEntry> = serde_json::from_str(json)?;
        Ok(Self::from_entries(entries, max_days))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.entries)
    }
}

/// Longest lipolysis stretch observed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LipolysisRecord {
    pub minutes: f64,
    pub date: NaiveDate,
}

impl LipolysisRecord {
    /// The record after observing `minutes` on `date`, if it is a new best
    pub fn improved(current: Option<&Self>, minutes: f64, date: NaiveDate) -> Option<Self> {
        if !minutes.is_finite() || minutes <= 0.0 {
            return None;
        }
        match current {
            Some(record) if record.minutes >= minutes => None,
            _ => Some(Self { minutes, date }),
        }
    }
}

fn load_json<T, S>(store: &S, key: &str) -> Result<Option<T>, WaveError>
where
    T: for<'de> Deserialize<'de>,
    S: KeyValueStore + ?Sized,
{
    match store.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub fn load_gap_history<S: KeyValueStore + ?Sized>(
    store: &S,
    max_days: usize,
) -> Result<GapHistory, WaveError> {
    match store.get(GAP_HISTORY_KEY)? {
        Some(raw) => Ok(GapHistory::from_json(&raw, max_days)?),
        None => Ok(GapHistory::new(max_days)),
    }
}

pub fn save_gap_history<S: KeyValueStore + ?Sized>(
    store: &S,
    history: &GapHistory,
) -> Result<(), WaveError> {
    store.set(GAP_HISTORY_KEY, &history.to_json()?)
}

pub fn load_lipolysis_record<S: KeyValueStore + ?Sized>(
    store: &S,
) -> Result<Option<LipolysisRecord>, WaveError> {
    load_json(store, LIPOLYSIS_RECORD_KEY)
}

pub fn save_lipolysis_record<S: KeyValueStore + ?Sized>(
    store: &S,
    record: &LipolysisRecord,
) -> Result<(), WaveError> {
    store.set(LIPOLYSIS_RECORD_KEY, &serde_json::to_string(record)?)
}

pub fn load_day<S: KeyValueStore + ?Sized>(
    store: &S,
    date: NaiveDate,
) -> Result<Option<DayRecord>, WaveError> {
    load_json(store, &day_key(date))
}

pub fn save_day<S: KeyValueStore + ?Sized>(
    store: &S,
    date: NaiveDate,
    day: &DayRecord,
) -> Result<(), WaveError> {
    store.set(&day_key(date), &serde_json::to_string(day)?)
}

pub fn load_profile<S: KeyValueStore + ?Sized>(store: &S) -> Result<Option<Profile>, WaveError> {
    load_json(store, PROFILE_KEY)
}
