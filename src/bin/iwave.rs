//! iwave CLI - Command-line interface for the insulin wave engine
//!
//! Commands:
//! - compute: Compute the current wave for a day record
//! - validate: Check meal times and product references in a day record
//! - history: Show persisted calibration state (gap history, lipolysis record)
//! - config: Print the default engine configuration
//! - doctor: Diagnose configuration and store health

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{Local, NaiveDateTime};
use tracing_subscriber::EnvFilter;

use insulin_wave::calibration::{load_gap_history, load_lipolysis_record};
use insulin_wave::clock::{parse_datetime, parse_hhmm, FixedClock};
use insulin_wave::extractor::MealFeatureExtractor;
use insulin_wave::pipeline::{compute_wave, CatalogInput, WaveInput, WaveProcessor};
use insulin_wave::{
    DayRecord, JsonFileStore, ProductIndex, WaveConfig, WaveError, WaveResult, PRODUCER_NAME,
    WAVE_VERSION,
};

/// iwave - On-device post-meal insulin wave simulator
#[derive(Parser)]
#[command(name = "iwave")]
#[command(version = WAVE_VERSION)]
#[command(about = "Estimate post-meal insulin waves and meal-gap rhythm", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the current wave for a day record
    Compute {
        /// Day record with its product catalog (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Additional product catalog file (JSON array)
        #[arg(short, long)]
        products: Option<PathBuf>,

        /// Evaluation time, "YYYY-MM-DDTHH:MM[:SS]" (defaults to now)
        #[arg(long)]
        now: Option<String>,

        /// Calibration store file; enables gap history and lipolysis record
        #[arg(long)]
        store: Option<PathBuf>,

        /// Engine configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Base wave hours override
        #[arg(long)]
        base_hours: Option<f64>,

        /// Output format
        #[arg(long, default_value = "summary")]
        format: OutputFormat,
    },

    /// Check meal times and product references in a day record
    Validate {
        /// Day record with its product catalog (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Additional product catalog file (JSON array)
        #[arg(short, long)]
        products: Option<PathBuf>,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show persisted calibration state
    History {
        /// Calibration store file
        #[arg(long)]
        store: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default engine configuration
    Config,

    /// Diagnose configuration and store health
    Doctor {
        /// Check a calibration store file
        #[arg(long)]
        store: Option<PathBuf>,

        /// Check an engine configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
    /// Human-readable summary
    Summary,
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr; `IWAVE_LOG` wins over `RUST_LOG`, default is warnings only
fn init_logging() {
    let filter = EnvFilter::try_from_env("IWAVE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), WaveCliError> {
    match cli.command {
        Commands::Compute {
            input,
            products,
            now,
            store,
            config,
            base_hours,
            format,
        } => cmd_compute(
            &input,
            products.as_deref(),
            now.as_deref(),
            store.as_deref(),
            config.as_deref(),
            base_hours,
            format,
        ),

        Commands::Validate {
            input,
            products,
            json,
        } => cmd_validate(&input, products.as_deref(), json),

        Commands::History { store, json } => cmd_history(&store, json),

        Commands::Config => {
            println!("{}", WaveConfig::default().to_json()?);
            Ok(())
        }

        Commands::Doctor {
            store,
            config,
            json,
        } => cmd_doctor(store.as_deref(), config.as_deref(), json),
    }
}

fn read_input(path: &Path) -> Result<String, WaveCliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

/// Day record plus the catalog bundled with it and any extra catalog file
fn load_request(input: &Path, products: Option<&Path>) -> Result<(DayRecord, ProductIndex), WaveCliError> {
    let request: CatalogInput<DayRecord> = serde_json::from_str(&read_input(input)?)?;
    let (day, mut index) = request.into_parts();
    if let Some(path) = products {
        for product in ProductIndex::from_json(&fs::read_to_string(path)?)?.into_products() {
            index.insert(product);
        }
    }
    tracing::debug!(meals = day.meals.len(), products = index.len(), "loaded day record");
    Ok((day, index))
}

fn load_config(path: Option<&Path>) -> Result<WaveConfig, WaveCliError> {
    let config = match path {
        Some(p) => WaveConfig::from_json(&fs::read_to_string(p)?)?,
        None => WaveConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn cmd_compute(
    input: &Path,
    products: Option<&Path>,
    now: Option<&str>,
    store: Option<&Path>,
    config_path: Option<&Path>,
    base_hours: Option<f64>,
    format: OutputFormat,
) -> Result<(), WaveCliError> {
    let (day, products) = load_request(input, products)?;
    let now: NaiveDateTime = match now {
        Some(s) => parse_datetime(s)?,
        None => Local::now().naive_local(),
    };

    let mut config = load_config(config_path)?;
    if let Some(hours) = base_hours {
        config.default_base_hours = hours;
        config.validate()?;
    }

    let result = match store {
        Some(path) => {
            let mut processor = WaveProcessor::with_config(JsonFileStore::new(path), config)
                .with_clock(FixedClock(now));
            processor.compute(&day, &products)?
        }
        None => {
            let input = WaveInput {
                meals: day.meals,
                day: day.context,
                config,
                ..Default::default()
            };
            compute_wave(&input, &products, now)
        }
    };

    let result = result.ok_or(WaveCliError::NoMeals)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&result)?),
        OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Summary => print_summary(&result),
    }

    Ok(())
}

fn print_summary(result: &WaveResult) {
    println!("Insulin Wave");
    println!("============");
    println!("Last meal:   {}", result.last_meal_time);
    println!(
        "Wave:        {:.1} h ({:.0} min, x{:.2})",
        result.wave_hours, result.wave_minutes, result.final_multiplier
    );
    println!("Ends at:     {}", result.end_time);
    println!("Status:      {:?} / {:?}", result.status, result.phase);
    println!("Progress:    {:.0}%", result.progress);
    if result.remaining_minutes > 0.0 {
        println!("Remaining:   {:.0} min", result.remaining_minutes);
    } else {
        println!(
            "Lipolysis:   {:.0} min (~{:.0} kcal)",
            result.lipolysis_minutes, result.lipolysis_kcal
        );
    }
    println!(
        "Score:       {:.0} ({:?}, {:?} curve)",
        result.score.score, result.score.level, result.curve.shape
    );

    if let Some(activity) = &result.activity_context {
        println!("Activity:    {:?}", activity.kind);
    }

    if let Some(worst) = &result.worst_overlap {
        println!(
            "Overlap:     {} -> {} ({} min, {:?})",
            worst.from, worst.to, worst.overlap_minutes, worst.severity
        );
    }

    println!(
        "Meal gaps:   today {} min, personal {} min, recommended {} min ({:?})",
        result.gaps.avg_gap_today,
        result.gaps.personal_avg_gap,
        result.gaps.recommended_gap,
        result.gaps.quality
    );

    if result.hypoglycemia.warning {
        println!(
            "Warning:     reactive hypoglycemia risk {:.2}",
            result.hypoglycemia.score
        );
    }
}

fn cmd_validate(input: &Path, products: Option<&Path>, json: bool) -> Result<(), WaveCliError> {
    let (day, products) = load_request(input, products)?;

    let mut issues: Vec<ValidationIssue> = Vec::new();
    for (index, meal) in day.meals.iter().enumerate() {
        if let Err(e) = parse_hhmm(&meal.time) {
            issues.push(ValidationIssue {
                meal_index: index,
                time: meal.time.clone(),
                error: e.to_string(),
            });
        }
        let snapshot = MealFeatureExtractor::extract(meal, &products);
        if snapshot.unresolved_items > 0 {
            issues.push(ValidationIssue {
                meal_index: index,
                time: meal.time.clone(),
                error: format!("{} item(s) not found in catalog", snapshot.unresolved_items),
            });
        }
    }

    let report = ValidationReport {
        total_meals: day.meals.len(),
        issues,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Meals:  {}", report.total_meals);
        println!("Issues: {}", report.issues.len());
        for issue in &report.issues {
            println!("  [{}] {}: {}", issue.meal_index, issue.time, issue.error);
        }
    }

    if report.issues.is_empty() {
        Ok(())
    } else {
        Err(WaveCliError::ValidationFailed(report.issues.len()))
    }
}

fn cmd_history(store_path: &Path, json: bool) -> Result<(), WaveCliError> {
    let store = JsonFileStore::new(store_path);
    let history = load_gap_history(&store, WaveConfig::default().gap_history_days)?;
    let record = load_lipolysis_record(&store)?;

    if json {
        let report = serde_json::json!({
            "gap_history": history.entries(),
            "personal_avg_gap": history.average(),
            "lipolysis_record": record,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Calibration History");
    println!("===================");
    if history.is_empty() {
        println!("No meal-gap history yet");
    } else {
        for entry in history.entries() {
            println!(
                "  {}  avg gap {} min over {} gap(s)",
                entry.date, entry.avg_gap, entry.count
            );
        }
        println!("Personal average: {} min", history.average());
    }
    match record {
        Some(r) => println!("Lipolysis record: {:.0} min on {}", r.minutes, r.date),
        None => println!("Lipolysis record: none"),
    }

    Ok(())
}

fn cmd_doctor(store: Option<&Path>, config: Option<&Path>, json: bool) -> Result<(), WaveCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("insulin-wave version {}", WAVE_VERSION),
    });

    let config_check = match load_config(config) {
        Ok(c) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "Configuration valid (base {:.1} h, multiplier {:.2}-{:.2})",
                c.default_base_hours, c.min_multiplier, c.max_multiplier
            ),
        },
        Err(e) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Error,
            message: format!("Invalid configuration: {}", CliError::from(e).message),
        },
    };
    checks.push(config_check);

    if let Some(store_path) = store {
        if store_path.exists() {
            let file_store = JsonFileStore::new(store_path);
            match load_gap_history(&file_store, WaveConfig::default().gap_history_days) {
                Ok(history) => checks.push(DoctorCheck {
                    name: "store".to_string(),
                    status: CheckStatus::Ok,
                    message: format!("Store readable ({} days of gap history)", history.len()),
                }),
                Err(e) => checks.push(DoctorCheck {
                    name: "store".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot read store: {}", e),
                }),
            }
        } else {
            checks.push(DoctorCheck {
                name: "store".to_string(),
                status: CheckStatus::Warning,
                message: "Store file does not exist (created on first compute)".to_string(),
            });
        }
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (--input - ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: WAVE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("iwave Doctor Report");
        println!("===================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(WaveCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum WaveCliError {
    Io(io::Error),
    Engine(WaveError),
    Json(serde_json::Error),
    NoMeals,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for WaveCliError {
    fn from(e: io::Error) -> Self {
        WaveCliError::Io(e)
    }
}

impl From<WaveError> for WaveCliError {
    fn from(e: WaveError) -> Self {
        WaveCliError::Engine(e)
    }
}

impl From<serde_json::Error> for WaveCliError {
    fn from(e: serde_json::Error) -> Self {
        WaveCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<WaveCliError> for CliError {
    fn from(e: WaveCliError) -> Self {
        match e {
            WaveCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            WaveCliError::Engine(WaveError::ConfigError(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'iwave config' for a valid default".to_string()),
            },
            WaveCliError::Engine(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check the day record and store contents".to_string()),
            },
            WaveCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            WaveCliError::NoMeals => CliError {
                code: "NO_MEALS".to_string(),
                message: "No meal with a valid time found".to_string(),
                hint: Some("Meal times must be \"HH:MM\"".to_string()),
            },
            WaveCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} issue(s) found", count),
                hint: Some("Fix the reported meals and retry".to_string()),
            },
            WaveCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_meals: usize,
    issues: Vec<ValidationIssue>,
}

#[derive(serde::Serialize)]
struct ValidationIssue {
    meal_index: usize,
    time: String,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
