//! Trip key lookup over the predictions table.

use std::collections::HashMap;

use tracing::warn;

use crate::annotator::key::{KeyMode, TripKey};
use crate::annotator::schema::{PredictionRecord, PredictionTable};
use crate::annotator::types::DuplicatePolicy;
use crate::error::AnnotateError;

pub struct PredictionIndex<'a> {
    by_key: HashMap<TripKey, usize>,
    records: &'a [PredictionRecord],
    pub duplicates: usize,
    pub warnings: Vec<String>,
}

impl<'a> PredictionIndex<'a> {
    pub fn build(
        predictions: &'a PredictionTable,
        mode: KeyMode,
        policy: DuplicatePolicy,
    ) -> Result<Self, AnnotateError> {
        let records = predictions.records();
        let mut by_key: HashMap<TripKey, usize> = HashMap::with_capacity(records.len());
        let mut duplicates = 0;
        let mut warnings = Vec::new();

        for (position, record) in records.iter().enumerate() {
            let key = TripKey::new(mode, &record.hub, &record.trip_ref, record.trip_id.as_deref());
            if let Some(&first) = by_key.get(&key) {
                let first_row = records[first].row;
                match policy {
                    DuplicatePolicy::Reject => {
                        return Err(AnnotateError::AmbiguousKey {
                            key: key.to_string(),
                            first_row,
                            row: record.row,
                        });
                    }
                    DuplicatePolicy::FirstWins => {
                        warn!(%key, first_row, row = record.row, "Ignoring duplicate prediction");
                        duplicates += 1;
                        warnings.push(format!(
                            "predictions row {} duplicates trip key {key} from row {first_row}; ignored",
                            record.row
                        ));
                    }
                }
                continue;
            }
            by_key.insert(key, position);
        }

        Ok(Self {
            by_key,
            records,
            duplicates,
            warnings,
        })
    }

    /// Position of the prediction for `key` within the predictions table.
    pub fn position(&self, key: &TripKey) -> Option<usize> {
        self.by_key.get(key).copied()
    }

    pub fn record(&self, position: usize) -> &'a PredictionRecord {
        &self.records[position]
    }

    /// Positions of the predictions that are used for lookup, in table order.
    pub fn positions(&self) -> Vec<usize> {
        let mut positions: Vec<usize> = self.by_key.values().copied().collect();
        positions.sort_unstable();
        positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(row: usize, hub: &str, trip_ref: &str, trip_id: Option<&str>, defaults: i64) -> PredictionRecord {
        PredictionRecord {
            row,
            hub: hub.into(),
            trip_ref: trip_ref.into(),
            trip_id: trip_id.map(str::to_string),
            defaults,
            avg_drr: 0.1,
            max_drr: 0.2,
            time: "2024-01-05 10:00:00".into(),
        }
    }

    #[test]
    fn test_lookup_by_key() {
        let table = PredictionTable::from_records(
            vec![prediction(0, "H1", "T1", None, 2), prediction(1, "H1", "T2", None, 0)],
            false,
        );
        let index = PredictionIndex::build(&table, KeyMode::HubTripRef, DuplicatePolicy::Reject).unwrap();
        let key = TripKey::new(KeyMode::HubTripRef, "H1", "T2", None);
        let position = index.position(&key).unwrap();
        assert_eq!(index.record(position).row, 1);
        assert_eq!(index.positions(), vec![0, 1]);
    }

    #[test]
    fn test_reject_duplicates() {
        let table = PredictionTable::from_records(
            vec![prediction(0, "H1", "T1", None, 2), prediction(1, "H1", "T1", None, 3)],
            false,
        );
        let err = PredictionIndex::build(&table, KeyMode::HubTripRef, DuplicatePolicy::Reject)
            .err()
            .unwrap();
        assert_eq!(
            err,
            AnnotateError::AmbiguousKey {
                key: "hub=H1 trip_ref=T1".into(),
                first_row: 0,
                row: 1,
            }
        );
    }

    #[test]
    fn test_first_wins_keeps_first() {
        let table = PredictionTable::from_records(
            vec![prediction(0, "H1", "T1", None, 2), prediction(1, "H1", "T1", None, 3)],
            false,
        );
        let index = PredictionIndex::build(&table, KeyMode::HubTripRef, DuplicatePolicy::FirstWins).unwrap();
        let key = TripKey::new(KeyMode::HubTripRef, "H1", "T1", None);
        assert_eq!(index.record(index.position(&key).unwrap()).defaults, 2);
        assert_eq!(index.duplicates, 1);
        assert_eq!(index.warnings.len(), 1);
    }

    #[test]
    fn test_trip_id_separates_keys() {
        let table = PredictionTable::from_records(
            vec![
                prediction(0, "H1", "T1", Some("A"), 2),
                prediction(1, "H1", "T1", Some("B"), 3),
            ],
            true,
        );
        let index =
            PredictionIndex::build(&table, KeyMode::HubTripRefTripId, DuplicatePolicy::Reject).unwrap();
        assert_eq!(index.duplicates, 0);

        // Without trip ids in the key the same rows collide.
        let result = PredictionIndex::build(&table, KeyMode::HubTripRef, DuplicatePolicy::Reject);
        assert!(result.is_err());
    }
}
