//! Insulin Wave - On-device post-meal insulin response simulator
//!
//! The engine estimates how long insulin stays elevated after a meal and what
//! that means for the next few hours: wave duration, physiological phases, a
//! synthetic insulin curve with a quality score, and meal-gap analytics. The
//! pipeline is deterministic: meal extraction → factor evaluation → composition
//! → wave model → curve and timeline.
//!
//! ## Modules
//!
//! - **Meal pipeline**: Resolve meal items into a nutrient snapshot and compose
//!   the wave multiplier from food, day-level and activity factors
//! - **Calibration**: Persist the rolling meal-gap history and lipolysis record

pub mod calibration;
pub mod clock;
pub mod compose;
pub mod config;
pub mod curve;
pub mod error;
pub mod extractor;
pub mod factors;
pub mod history;
pub mod lookup;
pub mod ndte;
pub mod pipeline;
pub mod types;
pub mod wave;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use calibration::{GapHistory, JsonFileStore, KeyValueStore, LipolysisRecord, MemoryStore};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::WaveConfig;
pub use error::WaveError;
pub use lookup::{NutrientLookup, ProductIndex};
pub use pipeline::{compute_wave, WaveInput, WaveProcessor};
pub use types::{DayContext, DayRecord, Meal, MealItem, Product, Profile, WaveResult};

/// Engine version embedded in CLI and FFI output
pub const WAVE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "insulin-wave";
