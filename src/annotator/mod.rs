//! Default-risk annotation of delivery stops.
//!
//! Stops are grouped by trip key, ordered by visit sequence, and the last
//! `defaults` stops of each predicted trip are marked at-risk. Prediction
//! metadata is merged onto every stop of a matched trip. The output keeps
//! one row per input stop in input order.

pub mod index;
pub mod key;
pub mod overlap;
pub mod schema;
pub mod selection;
pub mod types;
pub mod utility;

use std::collections::HashMap;

use tracing::{debug, info};

use crate::annotator::index::PredictionIndex;
use crate::annotator::key::{KeyMode, TripKey};
use crate::annotator::schema::{ColumnMap, PredictionTable, StopRecord, StopTable};
use crate::annotator::selection::{at_risk_members, order_by_visit_sequence, select_at_risk};
use crate::annotator::types::{
    ANNOTATION_COLUMNS, AnnotateOptions, AnnotatedStop, Annotation, TripPrediction,
};
use crate::error::{AnnotateError, TableKind};
use crate::parser::Table;
use crate::stats::{ProcessingSummary, TripOutcome};

struct TripGroup {
    key: TripKey,
    /// Indices into the stop records, in input order.
    members: Vec<usize>,
}

/// Groups stops by trip key in order of first appearance.
fn group_by_trip(records: &[StopRecord], mode: KeyMode) -> Vec<TripGroup> {
    let mut groups: Vec<TripGroup> = Vec::new();
    let mut by_key: HashMap<TripKey, usize> = HashMap::new();

    for (index, record) in records.iter().enumerate() {
        let key = TripKey::new(mode, &record.hub, &record.trip_ref, record.trip_id.as_deref());
        match by_key.get(&key) {
            Some(&group) => groups[group].members.push(index),
            None => {
                by_key.insert(key.clone(), groups.len());
                groups.push(TripGroup {
                    key,
                    members: vec![index],
                });
            }
        }
    }

    groups
}

/// Annotates every stop with its trip's prediction and at-risk flag.
///
/// # Errors
///
/// Returns [`AnnotateError::AmbiguousKey`] when duplicate prediction keys are
/// rejected by `options.duplicates`. Trips without a prediction and trips
/// whose defaults exceed their stop count are reported in the summary, not as
/// errors.
#[tracing::instrument(skip_all, fields(stops = stops.len(), predictions = predictions.len()))]
pub fn annotate(
    stops: &StopTable,
    predictions: &PredictionTable,
    options: &AnnotateOptions,
) -> Result<Annotation, AnnotateError> {
    let mode = KeyMode::resolve(stops.has_trip_id(), predictions.has_trip_id());
    let mut summary = ProcessingSummary::new(mode, stops.len(), predictions.len());
    summary.warnings.extend(stops.warnings().iter().cloned());
    summary.warnings.extend(predictions.warnings().iter().cloned());

    if stops.has_trip_id() != predictions.has_trip_id() {
        let table = if stops.has_trip_id() {
            TableKind::Stops
        } else {
            TableKind::Predictions
        };
        summary.warnings.push(format!(
            "trip_id is only present in the {table} table; matching on hub and trip_ref"
        ));
    }

    let index = PredictionIndex::build(predictions, mode, options.duplicates)?;
    summary.duplicate_predictions = index.duplicates;
    summary.warnings.extend(index.warnings.iter().cloned());

    let records = stops.records();
    let mut at_risk = vec![false; records.len()];
    let mut group_of = vec![0usize; records.len()];
    let mut used = vec![false; predictions.len()];
    let mut group_predictions: Vec<Option<TripPrediction>> = Vec::new();

    for (group_index, group) in group_by_trip(records, mode).into_iter().enumerate() {
        let TripGroup { key, mut members } = group;
        for &member in &members {
            group_of[member] = group_index;
        }

        let mut outcome = TripOutcome::new(&key, members.len());
        let prediction = match index.position(&key) {
            Some(position) => {
                used[position] = true;
                let record = index.record(position);

                order_by_visit_sequence(&mut members, records);
                let selection = select_at_risk(members.len(), record.defaults);
                for &member in at_risk_members(&members, selection) {
                    at_risk[member] = true;
                }

                if selection.clamped {
                    debug!(
                        %key,
                        defaults = record.defaults,
                        stops = members.len(),
                        "Predicted defaults cover every stop, marking all"
                    );
                }

                outcome.predicted_defaults = Some(record.defaults);
                outcome.marked = selection.marked;
                outcome.clamped = selection.clamped;

                Some(TripPrediction {
                    predicted_defaults: record.defaults,
                    actual_defaults_marked: selection.marked,
                    avg_drr: record.avg_drr,
                    max_drr: record.max_drr,
                    prediction_time: record.time.clone(),
                })
            }
            None => {
                debug!(%key, stops = members.len(), "No prediction for trip");
                None
            }
        };

        summary.record_trip(outcome);
        group_predictions.push(prediction);
    }

    for position in index.positions() {
        if !used[position] {
            let record = index.record(position);
            summary.predictions_unused += 1;
            summary.warnings.push(format!(
                "predictions row {} matched no stops (hub={} trip_ref={})",
                record.row, record.hub, record.trip_ref
            ));
        }
    }

    let rows = records
        .iter()
        .enumerate()
        .map(|(index, record)| AnnotatedStop {
            row: record.row,
            values: record.values.clone(),
            is_at_risk: at_risk[index],
            prediction: group_predictions[group_of[index]].clone(),
        })
        .collect();

    let mut headers = stops.headers().to_vec();
    headers.extend(ANNOTATION_COLUMNS.iter().map(|c| c.to_string()));

    info!(
        key_mode = mode.as_str(),
        trips = summary.trips_seen,
        matched = summary.trips_matched,
        unmatched = summary.trips_unmatched,
        clamped = summary.trips_clamped,
        at_risk = summary.stops_at_risk,
        "Annotation complete"
    );

    Ok(Annotation {
        headers,
        rows,
        summary,
    })
}

/// Validates both raw tables and annotates them in one all-or-nothing call.
pub fn annotate_tables(
    stops: &Table,
    predictions: &Table,
    columns: &ColumnMap,
    options: &AnnotateOptions,
) -> Result<Annotation, AnnotateError> {
    let stops = StopTable::from_table(stops, columns)?;
    let predictions = PredictionTable::from_table(predictions, columns)?;
    annotate(&stops, &predictions, options)
}
