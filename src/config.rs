use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::annotator::schema::ColumnMap;
use crate::annotator::types::{AnnotateOptions, DuplicatePolicy};

/// Run settings read from an optional JSON file.
///
/// ```json
/// {
///   "duplicates": "first-wins",
///   "at_risk_only": true,
///   "column_aliases": { "Trip Number": "trip_ref" }
/// }
/// ```
///
/// Every key is optional; command-line flags take precedence.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnnotatorConfig {
    pub duplicates: DuplicatePolicy,
    pub at_risk_only: bool,
    pub column_aliases: HashMap<String, String>,
}

impl AnnotatorConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn column_map(&self) -> ColumnMap {
        ColumnMap::default().with_aliases(
            self.column_aliases
                .iter()
                .map(|(from, to)| (from.as_str(), to.as_str())),
        )
    }

    pub fn options(&self) -> AnnotateOptions {
        self.options_with(None)
    }

    /// Options with a command-line duplicate policy taking precedence.
    pub fn options_with(&self, duplicates: Option<DuplicatePolicy>) -> AnnotateOptions {
        AnnotateOptions {
            duplicates: duplicates.unwrap_or(self.duplicates),
        }
    }
}
