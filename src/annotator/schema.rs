//! Typed stop and prediction tables built from raw [`Table`]s.
//!
//! Construction checks required columns once per table and parses every
//! required cell, so the annotator only ever sees well-formed records.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::annotator::types::ANNOTATION_COLUMNS;
use crate::annotator::utility::{canonical_id, parse_float, parse_integer};
use crate::error::{AnnotateError, TableKind};
use crate::parser::Table;

pub const HUB: &str = "hub";
pub const TRIP_REF: &str = "trip_ref";
pub const TRIP_ID: &str = "trip_id";
pub const VISIT_SEQUENCE: &str = "visit_sequence";
pub const DEFAULTS: &str = "defaults";
pub const AVG_DRR: &str = "avg_drr";
pub const MAX_DRR: &str = "max_drr";
pub const TIME: &str = "time";

const IS_AT_RISK: &str = "is_at_risk";

const STOP_REQUIRED: [&str; 3] = [HUB, TRIP_REF, VISIT_SEQUENCE];
const PREDICTION_REQUIRED: [&str; 6] = [HUB, TRIP_REF, DEFAULTS, AVG_DRR, MAX_DRR, TIME];

static BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("trip_trip_ref_number", TRIP_REF),
    ("trip_ref_number", TRIP_REF),
    ("trip_reference", TRIP_REF),
    ("trip_trip_id", TRIP_ID),
    ("prediction_time", TIME),
];

/// Lowercases a header and folds spaces and hyphens into `_`.
///
/// `"avg DRR"` and `"Avg-DRR"` both become `"avg_drr"`.
pub fn normalize_column(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.trim().chars() {
        if c.is_whitespace() || c == '-' || c == '_' {
            pending_sep = true;
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push('_');
        }
        pending_sep = false;
        out.extend(c.to_lowercase());
    }
    out
}

/// Maps input headers onto the canonical field names used by the annotator.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    aliases: HashMap<String, String>,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            aliases: BUILTIN_ALIASES
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        }
    }
}

impl ColumnMap {
    /// Adds `header -> field` aliases on top of the built-in ones. Both sides
    /// are normalized, so `"Trip Number" -> "trip_ref"` works as written.
    pub fn with_aliases<'a>(mut self, extra: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        for (from, to) in extra {
            self.aliases
                .insert(normalize_column(from), normalize_column(to));
        }
        self
    }

    pub fn canonical(&self, header: &str) -> String {
        let normalized = normalize_column(header);
        match self.aliases.get(&normalized) {
            Some(field) => field.clone(),
            None => normalized,
        }
    }

    /// Positions of each canonical field. The first matching header wins.
    fn locate(&self, headers: &[String], warnings: &mut Vec<String>) -> HashMap<String, usize> {
        let mut positions = HashMap::new();
        for (index, header) in headers.iter().enumerate() {
            let field = self.canonical(header);
            if let Some(first) = positions.get(&field) {
                warnings.push(format!(
                    "column '{header}' duplicates field '{field}' already read from column {first}; ignored"
                ));
                continue;
            }
            positions.insert(field, index);
        }
        positions
    }
}

fn require(
    table: TableKind,
    positions: &HashMap<String, usize>,
    required: &[&str],
) -> Result<(), AnnotateError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|field| !positions.contains_key(**field))
        .map(|field| field.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AnnotateError::Schema {
            table,
            columns: missing,
        })
    }
}

fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map(String::as_str).unwrap_or("")
}

fn required_text<'a>(
    table: TableKind,
    row_index: usize,
    row: &'a [String],
    position: usize,
    field: &str,
) -> Result<&'a str, AnnotateError> {
    let value = cell(row, position);
    if value.trim().is_empty() {
        Err(AnnotateError::malformed(table, row_index, field, "missing value"))
    } else {
        Ok(value)
    }
}

fn optional_id(row: &[String], position: Option<usize>) -> Option<String> {
    let value = canonical_id(cell(row, position?));
    if value.is_empty() { None } else { Some(value) }
}

/// One row of the stops table.
#[derive(Debug, Clone, PartialEq)]
pub struct StopRecord {
    pub row: usize,
    pub hub: String,
    pub trip_ref: String,
    pub trip_id: Option<String>,
    pub visit_sequence: i64,
    /// Raw passthrough cells, aligned with [`StopTable::headers`].
    pub values: Vec<String>,
}

/// One row of the predictions table.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    pub row: usize,
    pub hub: String,
    pub trip_ref: String,
    pub trip_id: Option<String>,
    pub defaults: i64,
    pub avg_drr: f64,
    pub max_drr: f64,
    /// Prediction timestamp, carried verbatim.
    pub time: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StopTable {
    headers: Vec<String>,
    records: Vec<StopRecord>,
    has_trip_id: bool,
    warnings: Vec<String>,
}

impl StopTable {
    /// Validates the stops table and converts every row.
    ///
    /// A table carrying an `is_at_risk` column is treated as a previous run's
    /// output: every column named like an annotation column is left out of the
    /// passthrough set. Otherwise such columns are kept verbatim with a warning.
    pub fn from_table(table: &Table, columns: &ColumnMap) -> Result<Self, AnnotateError> {
        let kind = TableKind::Stops;
        let mut warnings = Vec::new();
        let positions = columns.locate(&table.headers, &mut warnings);
        require(kind, &positions, &STOP_REQUIRED)?;

        let hub_at = positions[HUB];
        let trip_ref_at = positions[TRIP_REF];
        let visit_at = positions[VISIT_SEQUENCE];
        let trip_id_at = positions.get(TRIP_ID).copied();

        let annotated = table
            .headers
            .iter()
            .any(|header| normalize_column(header) == IS_AT_RISK);

        let mut passthrough = Vec::with_capacity(table.headers.len());
        for (index, header) in table.headers.iter().enumerate() {
            if !ANNOTATION_COLUMNS.contains(&normalize_column(header).as_str()) {
                passthrough.push(index);
            } else if annotated {
                warn!(column = %header, "Dropping annotation column from annotated stops input");
                warnings.push(format!(
                    "stops column '{header}' is an annotation column of a previous run and was dropped"
                ));
            } else {
                warn!(column = %header, "Stops column shares a name with an annotation column");
                warnings.push(format!(
                    "stops column '{header}' shares a name with an annotation column and was kept"
                ));
                passthrough.push(index);
            }
        }

        let mut records = Vec::with_capacity(table.rows.len());
        for (row_index, row) in table.rows.iter().enumerate() {
            let row = row.as_slice();
            let hub = required_text(kind, row_index, row, hub_at, HUB)?;
            let trip_ref = required_text(kind, row_index, row, trip_ref_at, TRIP_REF)?;
            let visit_sequence = parse_integer(cell(row, visit_at))
                .map_err(|reason| AnnotateError::malformed(kind, row_index, VISIT_SEQUENCE, reason))?;

            records.push(StopRecord {
                row: row_index,
                hub: hub.to_string(),
                trip_ref: canonical_id(trip_ref),
                trip_id: optional_id(row, trip_id_at),
                visit_sequence,
                values: passthrough.iter().map(|&i| cell(row, i).to_string()).collect(),
            });
        }

        debug!(rows = records.len(), has_trip_id = trip_id_at.is_some(), "Stops table validated");

        Ok(Self {
            headers: passthrough.iter().map(|&i| table.headers[i].clone()).collect(),
            records,
            has_trip_id: trip_id_at.is_some(),
            warnings,
        })
    }

    /// Passthrough headers, verbatim from the input.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records(&self) -> &[StopRecord] {
        &self.records
    }

    pub fn has_trip_id(&self) -> bool {
        self.has_trip_id
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionTable {
    records: Vec<PredictionRecord>,
    has_trip_id: bool,
    warnings: Vec<String>,
}

impl PredictionTable {
    pub fn from_table(table: &Table, columns: &ColumnMap) -> Result<Self, AnnotateError> {
        let kind = TableKind::Predictions;
        let mut warnings = Vec::new();
        let positions = columns.locate(&table.headers, &mut warnings);
        require(kind, &positions, &PREDICTION_REQUIRED)?;

        let trip_id_at = positions.get(TRIP_ID).copied();
        let integer = |row_index: usize, row: &[String], field: &str| {
            parse_integer(cell(row, positions[field]))
                .map_err(|reason| AnnotateError::malformed(kind, row_index, field, reason))
        };
        let float = |row_index: usize, row: &[String], field: &str| {
            parse_float(cell(row, positions[field]))
                .map_err(|reason| AnnotateError::malformed(kind, row_index, field, reason))
        };

        let mut records = Vec::with_capacity(table.rows.len());
        for (row_index, row) in table.rows.iter().enumerate() {
            let row = row.as_slice();
            let hub = required_text(kind, row_index, row, positions[HUB], HUB)?;
            let trip_ref = required_text(kind, row_index, row, positions[TRIP_REF], TRIP_REF)?;
            let time = required_text(kind, row_index, row, positions[TIME], TIME)?;

            records.push(PredictionRecord {
                row: row_index,
                hub: hub.to_string(),
                trip_ref: canonical_id(trip_ref),
                trip_id: optional_id(row, trip_id_at),
                defaults: integer(row_index, row, DEFAULTS)?,
                avg_drr: float(row_index, row, AVG_DRR)?,
                max_drr: float(row_index, row, MAX_DRR)?,
                time: time.to_string(),
            });
        }

        debug!(rows = records.len(), has_trip_id = trip_id_at.is_some(), "Predictions table validated");

        Ok(Self {
            records,
            has_trip_id: trip_id_at.is_some(),
            warnings,
        })
    }

    /// Builds a table directly from records.
    pub fn from_records(records: Vec<PredictionRecord>, has_trip_id: bool) -> Self {
        Self {
            records,
            has_trip_id,
            warnings: Vec::new(),
        }
    }

    pub fn records(&self) -> &[PredictionRecord] {
        &self.records
    }

    pub fn has_trip_id(&self) -> bool {
        self.has_trip_id
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
