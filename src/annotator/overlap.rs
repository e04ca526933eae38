//! Diagnostics on how well the two tables line up before annotating.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::annotator::schema::{PredictionTable, StopTable};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlapReport {
    pub stop_hubs: usize,
    pub prediction_hubs: usize,
    pub common_hubs: Vec<String>,
    pub stop_trip_refs: usize,
    pub prediction_trip_refs: usize,
    pub common_trip_refs: Vec<String>,
    pub predictions_with_defaults: usize,
}

impl OverlapReport {
    /// An empty intersection usually means mismatched hub spelling or
    /// reference formats rather than a genuine lack of predictions.
    pub fn is_disjoint(&self) -> bool {
        self.common_hubs.is_empty() || self.common_trip_refs.is_empty()
    }
}

/// Compares the distinct hubs and trip references of both tables.
pub fn analyze(stops: &StopTable, predictions: &PredictionTable) -> OverlapReport {
    let stop_hubs: BTreeSet<&str> = stops.records().iter().map(|r| r.hub.as_str()).collect();
    let prediction_hubs: BTreeSet<&str> =
        predictions.records().iter().map(|r| r.hub.as_str()).collect();

    let stop_refs: BTreeSet<&str> = stops.records().iter().map(|r| r.trip_ref.as_str()).collect();
    let prediction_refs: BTreeSet<&str> =
        predictions.records().iter().map(|r| r.trip_ref.as_str()).collect();

    OverlapReport {
        stop_hubs: stop_hubs.len(),
        prediction_hubs: prediction_hubs.len(),
        common_hubs: stop_hubs
            .intersection(&prediction_hubs)
            .map(|h| h.to_string())
            .collect(),
        stop_trip_refs: stop_refs.len(),
        prediction_trip_refs: prediction_refs.len(),
        common_trip_refs: stop_refs
            .intersection(&prediction_refs)
            .map(|r| r.to_string())
            .collect(),
        predictions_with_defaults: predictions
            .records()
            .iter()
            .filter(|r| r.defaults > 0)
            .count(),
    }
}
