//! Output formatting and persistence for annotation results.
//!
//! Supports the annotated CSV, summary logging and JSON, run history append,
//! and the error report written in place of a result.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::annotator::types::Annotation;
use crate::error::AnnotateError;
use crate::fetch::write_sink;
use crate::stats::{ProcessingSummary, RunRecord};

/// Renders the annotated table as CSV bytes.
///
/// With `at_risk_only` only at-risk stops are kept.
pub fn render_annotation(annotation: &Annotation, at_risk_only: bool) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(&annotation.headers)?;

    for stop in &annotation.rows {
        if at_risk_only && !stop.is_at_risk {
            continue;
        }
        writer.write_record(stop.to_row())?;
    }

    Ok(writer.into_inner().map_err(|e| e.into_error())?)
}

/// Writes the annotated CSV to `path` and returns the number of data rows.
///
/// The file is rendered in memory first, so a failure never leaves a
/// partially written result behind.
pub fn write_annotation(path: &Path, annotation: &Annotation, at_risk_only: bool) -> Result<usize> {
    let bytes = render_annotation(annotation, at_risk_only)?;
    let rows = if at_risk_only {
        annotation.at_risk().count()
    } else {
        annotation.rows.len()
    };

    if at_risk_only && rows == 0 {
        warn!("No at-risk stops found, writing header only");
    }

    write_sink(path, &bytes)?;
    info!(path = %path.display(), rows, "Annotated stops written");
    Ok(rows)
}

/// Logs the summary using Rust's debug pretty-print format.
pub fn print_pretty(summary: &ProcessingSummary) {
    debug!("{:#?}", summary);
}

/// Logs the summary as pretty-printed JSON.
pub fn print_json(summary: &ProcessingSummary) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

pub fn write_summary_json(path: &Path, summary: &ProcessingSummary) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(summary)?;
    write_sink(path, &bytes)
}

/// Logs the headline counters, warnings and the per-trip breakdown.
pub fn log_summary(summary: &ProcessingSummary) {
    info!(
        stops = summary.stops,
        predictions = summary.predictions,
        trips = summary.trips_seen,
        matched = summary.trips_matched,
        unmatched = summary.trips_unmatched,
        match_pct = summary.match_pct(),
        "Matching statistics"
    );
    info!(
        at_risk = summary.stops_at_risk,
        at_risk_pct = summary.at_risk_pct(),
        clamped = summary.trips_clamped,
        "At-risk statistics"
    );

    for warning in &summary.warnings {
        warn!("{warning}");
    }

    for trip in summary.trips.iter().filter(|t| t.marked > 0) {
        debug!(
            hub = %trip.hub,
            trip_ref = %trip.trip_ref,
            trip_id = trip.trip_id.as_deref().unwrap_or(""),
            stops = trip.stops,
            predicted = trip.predicted_defaults.unwrap_or_default(),
            marked = trip.marked,
            clamped = trip.clamped,
            "Trip breakdown"
        );
    }
}

/// Appends a [`RunRecord`] as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist. Missing parent
/// directories are created.
pub fn append_record(path: &str, record: &RunRecord) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }

    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("failed to open history {path}"))?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer
        .serialize(record)
        .with_context(|| format!("failed to append to history {path}"))?;
    writer.flush()?;

    Ok(())
}

/// Files produced by one annotate run.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultPaths {
    pub output: PathBuf,
    pub summary: Option<PathBuf>,
    pub history: Option<String>,
}

impl ResultPaths {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        ResultPaths {
            output: output.into(),
            summary: None,
            history: None,
        }
    }
}

/// Writes the summary, the annotated CSV and the history row, in that order.
///
/// If any step fails the annotated CSV and summary are removed again, so only
/// a complete run leaves result files behind. Returns the number of rows
/// written to the annotated CSV.
pub fn write_results(
    paths: &ResultPaths,
    annotation: &Annotation,
    at_risk_only: bool,
    record: &RunRecord,
) -> Result<usize> {
    let written = write_result_files(paths, annotation, at_risk_only, record);
    if written.is_err() {
        discard_results(paths);
    }
    written
}

fn write_result_files(
    paths: &ResultPaths,
    annotation: &Annotation,
    at_risk_only: bool,
    record: &RunRecord,
) -> Result<usize> {
    if let Some(path) = &paths.summary {
        write_summary_json(path, &annotation.summary)?;
        info!(path = %path.display(), "Summary written");
    }

    let rows = write_annotation(&paths.output, annotation, at_risk_only)?;

    if let Some(path) = &paths.history {
        append_record(path, record)?;
    }

    Ok(rows)
}

/// Removes the annotated CSV and summary, whether from this run or an
/// earlier one. The history file is left alone.
pub fn discard_results(paths: &ResultPaths) {
    for path in std::iter::once(&paths.output).chain(paths.summary.as_ref()) {
        match fs::remove_file(path) {
            Ok(()) => warn!(path = %path.display(), "Removed result file of failed run"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Could not remove result file"),
        }
    }
}

/// Diagnostic row written instead of a result when a run fails.
#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub table: Option<String>,
    pub row: Option<usize>,
    pub column: Option<String>,
    pub message: String,
    pub stops_input: String,
    pub predictions_input: String,
}

impl ErrorReport {
    /// Builds a report, recovering the typed details of an [`AnnotateError`].
    pub fn from_error(error: &anyhow::Error, stops_input: &str, predictions_input: &str) -> Self {
        let typed = error.downcast_ref::<AnnotateError>();
        ErrorReport {
            timestamp: Utc::now(),
            kind: typed.map_or("io_error", |e| e.kind()).to_string(),
            table: typed.map(|e| e.table().as_str().to_string()),
            row: typed.and_then(AnnotateError::row),
            column: typed.and_then(AnnotateError::column),
            message: format!("{error:#}"),
            stops_input: stops_input.to_string(),
            predictions_input: predictions_input.to_string(),
        }
    }
}

pub fn write_error_report(path: &Path, report: &ErrorReport) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.serialize(report)?;
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    write_sink(path, &bytes)?;
    warn!(path = %path.display(), kind = %report.kind, "Error report written");
    Ok(())
}
