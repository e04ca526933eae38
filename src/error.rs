//! Typed failures raised while validating and annotating trip tables.
//!
//! Every variant aborts the whole annotation call. Row indices are 0-based
//! positions among the data rows of a table (the header row is not counted).

use std::fmt;

use serde::Serialize;

/// Which input table an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Stops,
    Predictions,
}

impl TableKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TableKind::Stops => "stops",
            TableKind::Predictions => "predictions",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnnotateError {
    /// One or more required columns are absent from a table.
    #[error("{table} table is missing required column(s): {}", .columns.join(", "))]
    Schema {
        table: TableKind,
        columns: Vec<String>,
    },

    /// A required cell is empty or cannot be parsed.
    #[error("{table} row {row}, column '{column}': {reason}")]
    MalformedRecord {
        table: TableKind,
        row: usize,
        column: String,
        reason: String,
    },

    /// Two prediction rows share a trip key under the `reject` policy.
    #[error("predictions rows {first_row} and {row} share trip key {key}")]
    AmbiguousKey {
        key: String,
        first_row: usize,
        row: usize,
    },
}

impl AnnotateError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AnnotateError::Schema { .. } => "schema_error",
            AnnotateError::MalformedRecord { .. } => "malformed_record_error",
            AnnotateError::AmbiguousKey { .. } => "ambiguous_key_error",
        }
    }

    pub fn table(&self) -> TableKind {
        match self {
            AnnotateError::Schema { table, .. } | AnnotateError::MalformedRecord { table, .. } => {
                *table
            }
            AnnotateError::AmbiguousKey { .. } => TableKind::Predictions,
        }
    }

    /// The offending row, when the error is tied to a single row.
    pub fn row(&self) -> Option<usize> {
        match self {
            AnnotateError::Schema { .. } => None,
            AnnotateError::MalformedRecord { row, .. } | AnnotateError::AmbiguousKey { row, .. } => {
                Some(*row)
            }
        }
    }

    pub fn column(&self) -> Option<String> {
        match self {
            AnnotateError::Schema { columns, .. } => Some(columns.join(",")),
            AnnotateError::MalformedRecord { column, .. } => Some(column.clone()),
            AnnotateError::AmbiguousKey { .. } => None,
        }
    }

    pub(crate) fn malformed(
        table: TableKind,
        row: usize,
        column: &str,
        reason: impl Into<String>,
    ) -> Self {
        AnnotateError::MalformedRecord {
            table,
            row,
            column: column.to_string(),
            reason: reason.into(),
        }
    }
}
