//! NutriScan CLI - Command-line interface for the bioavailability engine
//!
//! Commands:
//! - score: Score a nutrient profile at a consumption time
//! - analyze: Score a saved AI analysis payload into a meal report
//! - classify: Classify a list of nutrient interactions
//! - rules: Print the active rule set
//! - doctor: Check rule and catalog files

use chrono::{FixedOffset, Local, Utc};
use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use nutriscan::engine::BioavailabilityEngine;
use nutriscan::interactions::{classify, InteractionObservation};
use nutriscan::types::{NutrientProfile, ScoreBreakdown};
use nutriscan::{InteractionCatalog, NutriError, RuleSet, ScoringPipeline};
use nutriscan::{NUTRISCAN_VERSION, PRODUCER_NAME};

/// NutriScan - circadian nutrient bioavailability scoring
#[derive(Parser)]
#[command(name = "nutriscan")]
#[command(version = NUTRISCAN_VERSION)]
#[command(about = "Score how well a meal's nutrients absorb at the time it is eaten", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a nutrient profile
    Score {
        /// Profile JSON file (use - for stdin), e.g. {"vitaminC": 50, "iron": 10}
        #[arg(short, long)]
        profile: PathBuf,

        /// Consumption time as epoch milliseconds, or "now"
        #[arg(long, default_value = "now")]
        at: String,

        /// Rule set JSON file (defaults to the built-in rules)
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Resolve the hour at this UTC offset (e.g. "+10:00") instead of local time
        #[arg(long, allow_hyphen_values = true)]
        utc_offset: Option<String>,

        /// Print the per-rule breakdown
        #[arg(long)]
        explain: bool,
    },

    /// Score a saved AI analysis payload
    Analyze {
        /// Provider payload file (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Consumption time as epoch milliseconds, or "now"
        #[arg(long, default_value = "now")]
        at: String,

        /// Rule set JSON file (defaults to the built-in rules)
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Interaction catalog JSON file; enables the interaction-adjusted score
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Use the built-in catalog for the interaction-adjusted score
        #[arg(long, conflicts_with = "catalog")]
        interactions: bool,

        /// Resolve the hour at this UTC offset instead of local time
        #[arg(long, allow_hyphen_values = true)]
        utc_offset: Option<String>,

        /// Pretty-print the report
        #[arg(long)]
        pretty: bool,
    },

    /// Classify a JSON array of provider interactions
    Classify {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print the rule set
    Rules {
        /// Rule set JSON file to print instead of the built-in rules
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check rule and catalog files
    Doctor {
        #[arg(long)]
        rules: Option<PathBuf>,

        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable
fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nutriscan=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), NutriCliError> {
    match cli.command {
        Commands::Score {
            profile,
            at,
            rules,
            utc_offset,
            explain,
        } => cmd_score(&profile, &at, rules.as_deref(), utc_offset.as_deref(), explain),

        Commands::Analyze {
            input,
            at,
            rules,
            catalog,
            interactions,
            utc_offset,
            pretty,
        } => cmd_analyze(
            &input,
            &at,
            rules.as_deref(),
            catalog.as_deref(),
            interactions,
            utc_offset.as_deref(),
            pretty,
        ),

        Commands::Classify { input } => cmd_classify(&input),

        Commands::Rules { rules, json } => cmd_rules(rules.as_deref(), json),

        Commands::Doctor {
            rules,
            catalog,
            json,
        } => cmd_doctor(rules.as_deref(), catalog.as_deref(), json),
    }
}

fn cmd_score(
    profile_path: &Path,
    at: &str,
    rules_path: Option<&Path>,
    utc_offset: Option<&str>,
    explain: bool,
) -> Result<(), NutriCliError> {
    let profile: NutrientProfile = serde_json::from_str(&read_input(profile_path)?)?;
    let rules = load_rules(rules_path)?;
    let consumed_at = parse_timestamp(at)?;

    let breakdown = match utc_offset {
        Some(offset) => {
            let offset = parse_utc_offset(offset)?;
            BioavailabilityEngine::explain_in(&profile, consumed_at, &rules, &offset)?
        }
        None => BioavailabilityEngine::explain_in(&profile, consumed_at, &rules, &Local)?,
    };

    if explain {
        print_breakdown(&breakdown);
    } else {
        println!("{}", breakdown.score);
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_analyze(
    input: &Path,
    at: &str,
    rules_path: Option<&Path>,
    catalog_path: Option<&Path>,
    interactions: bool,
    utc_offset: Option<&str>,
    pretty: bool,
) -> Result<(), NutriCliError> {
    let raw = read_input(input)?;
    let consumed_at = parse_timestamp(at)?;

    let mut pipeline = ScoringPipeline::new(Arc::new(load_rules(rules_path)?));
    if let Some(path) = catalog_path {
        let catalog = InteractionCatalog::from_json(&fs::read_to_string(path)?)?;
        pipeline = pipeline.with_interactions(Arc::new(catalog));
    } else if interactions {
        pipeline = pipeline.with_interactions(Arc::new(InteractionCatalog::default()));
    }
    if let Some(offset) = utc_offset {
        pipeline = pipeline.with_utc_offset(parse_utc_offset(offset)?);
    }

    let report = pipeline.score_payload(&raw, consumed_at)?;

    if pretty {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", serde_json::to_string(&report)?);
    }

    Ok(())
}

fn cmd_classify(input: &Path) -> Result<(), NutriCliError> {
    let observations: Vec<InteractionObservation> = serde_json::from_str(&read_input(input)?)?;
    println!("{}", serde_json::to_string_pretty(&classify(&observations))?);
    Ok(())
}

fn cmd_rules(rules_path: Option<&Path>, json: bool) -> Result<(), NutriCliError> {
    let rules = load_rules(rules_path)?;

    if json {
        println!("{}", rules.to_json()?);
    } else {
        println!("Circadian Rules");
        println!("===============");
        for rule in rules.iter() {
            println!(
                "  {:<10} {:02}:00-{:02}:59  x{:<5} {}",
                rule.nutrient.as_str(),
                rule.window_start,
                rule.window_end,
                rule.efficiency_factor,
                rule.reason
            );
        }
        println!(
            "\nOutside its window a relevant rule applies x{}",
            nutriscan::OUT_OF_WINDOW_PENALTY
        );
    }

    Ok(())
}

fn cmd_doctor(
    rules_path: Option<&Path>,
    catalog_path: Option<&Path>,
    json: bool,
) -> Result<(), NutriCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("NutriScan version {}", NUTRISCAN_VERSION),
    });

    checks.push(file_check("rules", rules_path, |content| {
        RuleSet::from_json(content).map(|r| format!("Rule set valid ({} rules)", r.len()))
    }));

    checks.push(file_check("catalog", catalog_path, |content| {
        InteractionCatalog::from_json(content)
            .map(|c| format!("Catalog valid ({} entries)", c.entries().len()))
    }));

    let tz_message = format!(
        "Local time zone offset is {} (now {})",
        Local::now().offset(),
        Utc::now().format("%Y-%m-%dT%H:%MZ")
    );
    checks.push(DoctorCheck {
        name: "timezone".to_string(),
        status: CheckStatus::Ok,
        message: tz_message,
    });

    // Check stdin is available (for "-" inputs)
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
            message: "stdin is a pipe (ready for - inputs)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: NUTRISCAN_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("NutriScan Doctor Report");
        println!("=======================");
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

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(NutriCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn file_check<F>(name: &str, path: Option<&Path>, validate: F) -> DoctorCheck
where
    F: FnOnce(&str) -> Result<String, NutriError>,
{
    let Some(path) = path else {
        return DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: "Using built-in defaults".to_string(),
        };
    };

    if !path.exists() {
        return DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: format!("{} does not exist", path.display()),
        };
    }

    let (status, message) = match fs::read_to_string(path) {
        Ok(content) => match validate(&content) {
            Ok(message) => (CheckStatus::Ok, message),
            Err(e) => (CheckStatus::Error, e.to_string()),
        },
        Err(e) => (CheckStatus::Error, format!("Cannot read file: {}", e)),
    };

    DoctorCheck {
        name: name.to_string(),
        status,
        message,
    }
}

fn read_input(path: &Path) -> Result<String, NutriCliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn load_rules(path: Option<&Path>) -> Result<RuleSet, NutriCliError> {
    match path {
        Some(p) => Ok(RuleSet::from_json(&fs::read_to_string(p)?)?),
        None => Ok(RuleSet::default()),
    }
}

fn parse_timestamp(at: &str) -> Result<i64, NutriCliError> {
    if at.eq_ignore_ascii_case("now") {
        return Ok(Utc::now().timestamp_millis());
    }
    at.trim()
        .parse::<i64>()
        .map_err(|_| NutriCliError::Argument(format!("Invalid timestamp '{}'", at)))
}

/// Parse "+HH:MM", "-HH:MM", "+HH" or "Z"
fn parse_utc_offset(s: &str) -> Result<FixedOffset, NutriCliError> {
    let invalid = || NutriCliError::Argument(format!("Invalid UTC offset '{}'", s));
    let s = s.trim();

    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }

    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1, &s[1..]),
        Some(b'-') => (-1, &s[1..]),
        _ => return Err(invalid()),
    };

    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None => (rest, "0"),
    };
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if !(0..24).contains(&hours) || !(0..60).contains(&minutes) {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

fn print_breakdown(breakdown: &ScoreBreakdown) {
    println!("Bioavailability Score");
    println!("=====================");
    println!("Hour:  {:02}:00", breakdown.hour);
    println!("Score: {}", breakdown.score);

    if breakdown.outcomes.is_empty() {
        println!("\nNo rule applies to this profile.");
    } else {
        println!("\nRules:");
        for outcome in &breakdown.outcomes {
            let window = if outcome.in_window { "in window" } else { "outside" };
            println!(
                "  {:<10} {:<9} x{:<5} {}",
                outcome.nutrient.as_str(),
                window,
                outcome.factor,
                outcome.reason
            );
        }
    }

    if breakdown.skipped_rules > 0 {
        println!("\nSkipped {} rule(s) for absent nutrients", breakdown.skipped_rules);
    }
}

// Error types

#[derive(Debug)]
enum NutriCliError {
    Io(io::Error),
    Engine(NutriError),
    Json(serde_json::Error),
    Argument(String),
    DoctorFailed,
}

impl From<io::Error> for NutriCliError {
    fn from(e: io::Error) -> Self {
        NutriCliError::Io(e)
    }
}

impl From<NutriError> for NutriCliError {
    fn from(e: NutriError) -> Self {
        NutriCliError::Engine(e)
    }
}

impl From<serde_json::Error> for NutriCliError {
    fn from(e: serde_json::Error) -> Self {
        NutriCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<NutriCliError> for CliError {
    fn from(e: NutriCliError) -> Self {
        match e {
            NutriCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            NutriCliError::Engine(e @ NutriError::InvalidInput(_)) => CliError {
                code: "INVALID_INPUT".to_string(),
                message: e.to_string(),
                hint: Some("Quantities must be non-negative and rule windows within 0-23".to_string()),
            },
            NutriCliError::Engine(e @ NutriError::AnalysisUnavailable(_)) => CliError {
                code: "ANALYSIS_UNAVAILABLE".to_string(),
                message: e.to_string(),
                hint: Some("Re-run the analysis; the payload is missing required fields".to_string()),
            },
            NutriCliError::Engine(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            NutriCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            NutriCliError::Argument(message) => CliError {
                code: "ARGUMENT_ERROR".to_string(),
                message,
                hint: Some("See --help for accepted formats".to_string()),
            },
            NutriCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more checks failed".to_string(),
                hint: Some("Fix the files reported as [ERR]".to_string()),
            },
        }
    }
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
