//! CLI entry point for the trip risk annotator.
//!
//! Provides subcommands for annotating stops with default-risk predictions,
//! inspecting how two tables overlap, and generating sample input.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use trip_risk_annotator::annotator::overlap;
use trip_risk_annotator::annotator::schema::{ColumnMap, PredictionTable, StopTable};
use trip_risk_annotator::annotator::types::DuplicatePolicy;
use trip_risk_annotator::annotator::{annotate, annotate_tables};
use trip_risk_annotator::config::AnnotatorConfig;
use trip_risk_annotator::fetch::read_source;
use trip_risk_annotator::output::{
    ErrorReport, ResultPaths, discard_results, log_summary, print_pretty, write_error_report,
    write_results,
};
use trip_risk_annotator::parser::{Table, parse_table};
use trip_risk_annotator::sample::{SampleOptions, generate, write_sample};
use trip_risk_annotator::stats::RunRecord;

#[derive(Parser)]
#[command(name = "trip_risk_annotator")]
#[command(about = "Marks delivery stops at risk of default from per-trip predictions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Annotate every stop with its trip's prediction and at-risk flag
    Annotate(AnnotateArgs),
    /// Compare hubs and trip references of the two tables
    Inspect {
        /// Stops (nodes) CSV, optionally gzip compressed
        #[arg(short, long)]
        stops: PathBuf,

        /// Predictions CSV, optionally gzip compressed
        #[arg(short, long)]
        predictions: PathBuf,

        /// Policy for prediction rows sharing a trip key: reject or first-wins
        #[arg(long)]
        duplicates: Option<DuplicatePolicy>,

        /// Optional JSON config file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Generate a sample nodes/predictions pair
    Sample {
        /// Directory to write nodes.csv and predictions.csv into
        #[arg(short, long, default_value = "data")]
        out_dir: PathBuf,

        /// Random seed
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Number of hubs
        #[arg(long, default_value_t = 3)]
        hubs: usize,

        /// Trip reference numbers per hub
        #[arg(long, default_value_t = 5)]
        trip_refs: usize,

        /// Trip ids per trip reference
        #[arg(long, default_value_t = 2)]
        trip_ids: usize,
    },
}

#[derive(Args)]
struct AnnotateArgs {
    /// Stops (nodes) CSV, optionally gzip compressed
    #[arg(short, long)]
    stops: PathBuf,

    /// Predictions CSV, optionally gzip compressed
    #[arg(short, long)]
    predictions: PathBuf,

    /// Annotated CSV to write (gzip compressed if it ends in .gz)
    #[arg(short, long, default_value = "annotated_stops.csv")]
    output: PathBuf,

    /// Write the processing summary as JSON to this path
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Only write at-risk stops
    #[arg(long, default_value_t = false)]
    at_risk_only: bool,

    /// Policy for prediction rows sharing a trip key: reject or first-wins
    #[arg(long)]
    duplicates: Option<DuplicatePolicy>,

    /// CSV file to append a run record to
    #[arg(long)]
    history: Option<String>,

    /// Write an error report CSV here if the run fails
    #[arg(long)]
    error_report: Option<PathBuf>,

    /// Optional JSON config file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/trip_risk_annotator.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("trip_risk_annotator.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Annotate(args) => {
            let result = run_annotate(&args);
            if let Err(e) = &result {
                error!(error = %format!("{e:#}"), "Annotation failed");
                discard_results(&result_paths(&args));
                if let Some(path) = &args.error_report {
                    let report = ErrorReport::from_error(
                        e,
                        &args.stops.display().to_string(),
                        &args.predictions.display().to_string(),
                    );
                    write_error_report(path, &report)?;
                }
            }
            result?;
        }
        Commands::Inspect {
            stops,
            predictions,
            duplicates,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let columns = config.column_map();
            let stops = StopTable::from_table(&load_table(&stops)?, &columns)?;
            let predictions = PredictionTable::from_table(&load_table(&predictions)?, &columns)?;

            let report = overlap::analyze(&stops, &predictions);
            info!(
                stop_hubs = report.stop_hubs,
                prediction_hubs = report.prediction_hubs,
                common = report.common_hubs.len(),
                "Hub analysis"
            );
            info!(
                stop_trip_refs = report.stop_trip_refs,
                prediction_trip_refs = report.prediction_trip_refs,
                common = report.common_trip_refs.len(),
                "Trip reference analysis"
            );
            info!(
                with_defaults = report.predictions_with_defaults,
                "Predictions with defaults"
            );
            if report.is_disjoint() {
                warn!(
                    "No overlap between tables: check hub spelling and trip reference formats"
                );
            }
            info!("{}", serde_json::to_string_pretty(&report)?);

            let annotation = annotate(&stops, &predictions, &config.options_with(duplicates))?;
            log_summary(&annotation.summary);
        }
        Commands::Sample {
            out_dir,
            seed,
            hubs,
            trip_refs,
            trip_ids,
        } => {
            let options = SampleOptions {
                seed,
                hubs,
                trip_refs,
                trip_ids,
                ..SampleOptions::default()
            };
            let tables = generate(&options);
            let (stops_path, predictions_path) = write_sample(&out_dir, &tables)?;
            info!(
                stops = %stops_path.display(),
                predictions = %predictions_path.display(),
                "Sample ready"
            );
        }
    }

    Ok(())
}

/// Loads the config from `--config`, falling back to `TRIP_RISK_CONFIG`.
fn load_config(path: Option<&Path>) -> Result<AnnotatorConfig> {
    let from_env = std::env::var("TRIP_RISK_CONFIG").ok().map(PathBuf::from);
    match path.map(Path::to_path_buf).or(from_env) {
        Some(path) => {
            info!(path = %path.display(), "Loading config");
            AnnotatorConfig::load(&path)
        }
        None => Ok(AnnotatorConfig::default()),
    }
}

fn load_table(path: &Path) -> Result<Table> {
    let bytes = read_source(path)?;
    parse_table(&bytes).with_context(|| format!("failed to parse {}", path.display()))
}

/// Reads both tables, annotates them and writes every requested artifact.
#[tracing::instrument(skip_all, fields(stops = %args.stops.display(), predictions = %args.predictions.display()))]
fn run_annotate(args: &AnnotateArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let columns: ColumnMap = config.column_map();
    let options = config.options_with(args.duplicates);
    let at_risk_only = args.at_risk_only || config.at_risk_only;

    let stops = load_table(&args.stops)?;
    let predictions = load_table(&args.predictions)?;
    info!(
        stops = stops.len(),
        predictions = predictions.len(),
        duplicates = %options.duplicates,
        "Loaded input tables"
    );

    let annotation = annotate_tables(&stops, &predictions, &columns, &options)?;

    print_pretty(&annotation.summary);
    log_summary(&annotation.summary);

    let record = RunRecord::from_summary(
        &annotation.summary,
        &args.stops.display().to_string(),
        &args.predictions.display().to_string(),
        &args.output.display().to_string(),
    );
    write_results(&result_paths(args), &annotation, at_risk_only, &record)?;

    Ok(())
}

fn result_paths(args: &AnnotateArgs) -> ResultPaths {
    ResultPaths {
        output: args.output.clone(),
        summary: args.summary.clone(),
        history: args.history.clone(),
    }
}
