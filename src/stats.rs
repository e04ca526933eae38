use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::annotator::key::{KeyMode, TripKey};

/// Per-trip line of the processing breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripOutcome {
    pub hub: String,
    pub trip_ref: String,
    pub trip_id: Option<String>,
    pub stops: usize,
    pub predicted_defaults: Option<i64>,
    pub marked: usize,
    pub clamped: bool,
}

impl TripOutcome {
    pub fn new(key: &TripKey, stops: usize) -> Self {
        TripOutcome {
            hub: key.hub.clone(),
            trip_ref: key.trip_ref.clone(),
            trip_id: key.trip_id.clone(),
            stops,
            predicted_defaults: None,
            marked: 0,
            clamped: false,
        }
    }
}

/// Counters accumulated during one annotation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingSummary {
    pub key_mode: KeyMode,
    pub stops: usize,
    pub predictions: usize,

    // trips
    pub trips_seen: usize,
    pub trips_matched: usize,
    pub trips_unmatched: usize,
    pub trips_clamped: usize,

    // stops
    pub stops_at_risk: usize,

    // predictions
    pub predictions_unused: usize,
    pub duplicate_predictions: usize,

    pub warnings: Vec<String>,
    pub trips: Vec<TripOutcome>,
}

impl ProcessingSummary {
    pub fn new(key_mode: KeyMode, stops: usize, predictions: usize) -> Self {
        ProcessingSummary {
            key_mode,
            stops,
            predictions,
            trips_seen: 0,
            trips_matched: 0,
            trips_unmatched: 0,
            trips_clamped: 0,
            stops_at_risk: 0,
            predictions_unused: 0,
            duplicate_predictions: 0,
            warnings: Vec::new(),
            trips: Vec::new(),
        }
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    pub fn match_pct(&self) -> f64 {
        Self::pct(self.trips_matched, self.trips_seen)
    }

    pub fn at_risk_pct(&self) -> f64 {
        Self::pct(self.stops_at_risk, self.stops)
    }

    /// Records the outcome of one trip and updates the trip counters.
    pub fn record_trip(&mut self, outcome: TripOutcome) {
        self.trips_seen += 1;
        if outcome.predicted_defaults.is_some() {
            self.trips_matched += 1;
        } else {
            self.trips_unmatched += 1;
        }
        if outcome.clamped {
            self.trips_clamped += 1;
        }
        self.stops_at_risk += outcome.marked;
        self.trips.push(outcome);
    }
}

/// One line of the run history CSV.
#[derive(Debug, Serialize)]
pub struct RunRecord {
    pub timestamp: DateTime<Utc>,
    pub stops_input: String,
    pub predictions_input: String,
    pub output: String,
    pub key_mode: String,
    pub stops: usize,
    pub predictions: usize,
    pub trips_seen: usize,
    pub trips_matched: usize,
    pub trips_unmatched: usize,
    pub trips_clamped: usize,
    pub stops_at_risk: usize,
    pub predictions_unused: usize,
    pub duplicate_predictions: usize,
    pub warnings: usize,
}

impl RunRecord {
    pub fn from_summary(
        summary: &ProcessingSummary,
        stops_input: &str,
        predictions_input: &str,
        output: &str,
    ) -> Self {
        RunRecord {
            timestamp: Utc::now(),
            stops_input: stops_input.to_string(),
            predictions_input: predictions_input.to_string(),
            output: output.to_string(),
            key_mode: summary.key_mode.as_str().to_string(),
            stops: summary.stops,
            predictions: summary.predictions,
            trips_seen: summary.trips_seen,
            trips_matched: summary.trips_matched,
            trips_unmatched: summary.trips_unmatched,
            trips_clamped: summary.trips_clamped,
            stops_at_risk: summary.stops_at_risk,
            predictions_unused: summary.predictions_unused,
            duplicate_predictions: summary.duplicate_predictions,
            warnings: summary.warnings.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(trip_ref: &str) -> TripKey {
        TripKey::new(KeyMode::HubTripRef, "H1", trip_ref, None)
    }

    #[test]
    fn test_pct_with_zero_total() {
        assert_eq!(ProcessingSummary::pct(10, 0), 0.0);
    }

    #[test]
    fn test_pct_normal_values() {
        assert_eq!(ProcessingSummary::pct(50, 100), 50.0);
        assert_eq!(ProcessingSummary::pct(1, 4), 25.0);
    }

    #[test]
    fn test_record_trip_counters() {
        let mut summary = ProcessingSummary::new(KeyMode::HubTripRef, 10, 2);

        let mut matched = TripOutcome::new(&key("T1"), 4);
        matched.predicted_defaults = Some(6);
        matched.marked = 4;
        matched.clamped = true;
        summary.record_trip(matched);
        summary.record_trip(TripOutcome::new(&key("T2"), 6));

        assert_eq!(summary.trips_seen, 2);
        assert_eq!(summary.trips_matched, 1);
        assert_eq!(summary.trips_unmatched, 1);
        assert_eq!(summary.trips_clamped, 1);
        assert_eq!(summary.stops_at_risk, 4);
        assert_eq!(summary.match_pct(), 50.0);
        assert_eq!(summary.at_risk_pct(), 40.0);
    }

    #[test]
    fn test_run_record_copies_counters() {
        let mut summary = ProcessingSummary::new(KeyMode::HubTripRef, 3, 1);
        summary.warnings.push("w".into());
        let mut outcome = TripOutcome::new(&key("T1"), 3);
        outcome.predicted_defaults = Some(1);
        outcome.marked = 1;
        summary.record_trip(outcome);

        let record = RunRecord::from_summary(&summary, "nodes.csv", "predictions.csv", "out.csv");
        assert_eq!(record.key_mode, "hub_trip_ref");
        assert_eq!(record.trips_matched, 1);
        assert_eq!(record.stops_at_risk, 1);
        assert_eq!(record.warnings, 1);
        assert_eq!(record.output, "out.csv");
    }

    #[test]
    fn test_summary_serializes_to_json() {
        let summary = ProcessingSummary::new(KeyMode::HubTripRefTripId, 0, 0);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["key_mode"], "hub_trip_ref_trip_id");
        assert_eq!(json["trips"], serde_json::json!([]));
    }
}
