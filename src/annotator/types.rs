//! Options and output types of the annotation pass.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::stats::ProcessingSummary;

/// Columns appended to every annotated stop, in output order.
pub const ANNOTATION_COLUMNS: [&str; 6] = [
    "predicted_defaults",
    "actual_defaults_marked",
    "is_at_risk",
    "avg_drr",
    "max_drr",
    "prediction_time",
];

/// What to do when several prediction rows share a trip key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Fail with an ambiguous key error.
    #[default]
    Reject,
    /// Keep the first row seen and ignore the rest.
    FirstWins,
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reject" => Ok(DuplicatePolicy::Reject),
            "first-wins" => Ok(DuplicatePolicy::FirstWins),
            other => Err(format!(
                "unknown duplicate policy '{other}', expected 'reject' or 'first-wins'"
            )),
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DuplicatePolicy::Reject => "reject",
            DuplicatePolicy::FirstWins => "first-wins",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnotateOptions {
    pub duplicates: DuplicatePolicy,
}

/// Prediction fields merged onto every stop of a matched trip.
#[derive(Debug, Clone, PartialEq)]
pub struct TripPrediction {
    pub predicted_defaults: i64,
    pub actual_defaults_marked: usize,
    pub avg_drr: f64,
    pub max_drr: f64,
    pub prediction_time: String,
}

/// A stop with its annotation. `prediction` is `None` for unmatched trips.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedStop {
    pub row: usize,
    pub values: Vec<String>,
    pub is_at_risk: bool,
    pub prediction: Option<TripPrediction>,
}

impl AnnotatedStop {
    pub fn predicted_defaults(&self) -> Option<i64> {
        self.prediction.as_ref().map(|p| p.predicted_defaults)
    }

    /// Passthrough cells followed by the annotation cells. Absent values
    /// render as empty cells.
    pub fn to_row(&self) -> Vec<String> {
        let mut row = self.values.clone();
        match &self.prediction {
            Some(p) => {
                row.push(p.predicted_defaults.to_string());
                row.push(p.actual_defaults_marked.to_string());
                row.push(self.is_at_risk.to_string());
                row.push(p.avg_drr.to_string());
                row.push(p.max_drr.to_string());
                row.push(p.prediction_time.clone());
            }
            None => {
                row.push(String::new());
                row.push(String::new());
                row.push(self.is_at_risk.to_string());
                row.push(String::new());
                row.push(String::new());
                row.push(String::new());
            }
        }
        row
    }
}

/// Result of one annotation call.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub headers: Vec<String>,
    pub rows: Vec<AnnotatedStop>,
    pub summary: ProcessingSummary,
}

impl Annotation {
    pub fn at_risk(&self) -> impl Iterator<Item = &AnnotatedStop> {
        self.rows.iter().filter(|r| r.is_at_risk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_policy_parse() {
        assert_eq!("reject".parse::<DuplicatePolicy>(), Ok(DuplicatePolicy::Reject));
        assert_eq!("first-wins".parse::<DuplicatePolicy>(), Ok(DuplicatePolicy::FirstWins));
        assert!("last-wins".parse::<DuplicatePolicy>().is_err());
        assert_eq!(DuplicatePolicy::FirstWins.to_string(), "first-wins");
    }

    #[test]
    fn test_duplicate_policy_json() {
        let policy: DuplicatePolicy = serde_json::from_str("\"first-wins\"").unwrap();
        assert_eq!(policy, DuplicatePolicy::FirstWins);
    }

    #[test]
    fn test_to_row_unmatched_has_empty_cells() {
        let stop = AnnotatedStop {
            row: 0,
            values: vec!["H1".into(), "T1".into()],
            is_at_risk: false,
            prediction: None,
        };
        assert_eq!(stop.to_row(), vec!["H1", "T1", "", "", "false", "", "", ""]);
        assert_eq!(stop.predicted_defaults(), None);
    }

    #[test]
    fn test_to_row_matched() {
        let stop = AnnotatedStop {
            row: 0,
            values: vec!["H1".into()],
            is_at_risk: true,
            prediction: Some(TripPrediction {
                predicted_defaults: 5,
                actual_defaults_marked: 3,
                avg_drr: 0.25,
                max_drr: 0.5,
                prediction_time: "2024-01-05 10:00:00".into(),
            }),
        };
        assert_eq!(
            stop.to_row(),
            vec!["H1", "5", "3", "true", "0.25", "0.5", "2024-01-05 10:00:00"]
        );
    }
}
