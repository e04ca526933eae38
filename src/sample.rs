//! Seeded generator for demo stop and prediction tables.
//!
//! Column names follow the spreadsheets the tool is usually fed (`Hub`,
//! `trip_trip_ref_number`, `avg DRR`, ...), so generated files go through the
//! same header normalization as real inputs.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use csv::WriterBuilder;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::fetch::write_sink;
use crate::parser::Table;

const STOP_HEADERS: [&str; 9] = [
    "hub",
    "trip_trip_ref_number",
    "trip_trip_id",
    "visit_sequence",
    "customer_name",
    "order_id",
    "delivery_date",
    "slots_start_time",
    "slots_end_time",
];

const PREDICTION_HEADERS: [&str; 7] = [
    "Hub",
    "trip_trip_ref_number",
    "trip_trip_id",
    "Defaults",
    "avg DRR",
    "Max DRR",
    "Time",
];

#[derive(Debug, Clone)]
pub struct SampleOptions {
    pub seed: u64,
    pub hubs: usize,
    pub trip_refs: usize,
    pub trip_ids: usize,
    /// Timestamp every generated date is based on, so output depends only on
    /// the options.
    pub base_time: NaiveDateTime,
}

impl Default for SampleOptions {
    fn default() -> Self {
        let base_time = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default();
        Self {
            seed: 42,
            hubs: 3,
            trip_refs: 5,
            trip_ids: 2,
            base_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleTables {
    pub stops: Table,
    pub predictions: Table,
}

/// Generates 5 to 14 stops per trip. About 80% of trips get a prediction
/// and about 30% of those predict at least one default.
pub fn generate(options: &SampleOptions) -> SampleTables {
    let mut rng = StdRng::seed_from_u64(options.seed);

    let mut stop_rows = Vec::new();
    let mut prediction_rows = Vec::new();

    for h in 1..=options.hubs {
        let hub = format!("HUB{h:03}");
        for r in 1..=options.trip_refs {
            let trip_ref = format!("TR{r:03}");
            for t in 1..=options.trip_ids {
                let trip_id = format!("TID{t:04}");
                let stop_count: usize = rng.random_range(5..15);

                for sequence in 1..=stop_count {
                    let delivery = options.base_time + Duration::days(rng.random_range(1..10));
                    let start = options.base_time + Duration::hours(rng.random_range(1..24));
                    let end = start + Duration::hours(rng.random_range(1..4));
                    stop_rows.push(vec![
                        hub.clone(),
                        trip_ref.clone(),
                        trip_id.clone(),
                        sequence.to_string(),
                        format!("Customer_{}", rng.random_range(1..100)),
                        format!("ORD{}", rng.random_range(10000..100000)),
                        delivery.format("%Y-%m-%d").to_string(),
                        start.format("%H:%M:%S").to_string(),
                        end.format("%H:%M:%S").to_string(),
                    ]);
                }

                if !rng.random_bool(0.8) {
                    continue;
                }

                let defaults = if rng.random_bool(0.3) {
                    rng.random_range(1..stop_count.max(2))
                } else {
                    0
                };
                let avg_drr: f64 = rng.random_range(0.01..0.2);
                let max_drr: f64 = rng.random_range(0.05..0.4);
                prediction_rows.push(vec![
                    hub.clone(),
                    trip_ref.clone(),
                    trip_id,
                    defaults.to_string(),
                    format!("{avg_drr:.4}"),
                    format!("{max_drr:.4}"),
                    options.base_time.format("%Y-%m-%d %H:%M:%S").to_string(),
                ]);
            }
        }
    }

    SampleTables {
        stops: Table::new(STOP_HEADERS.iter().map(|h| h.to_string()).collect(), stop_rows),
        predictions: Table::new(
            PREDICTION_HEADERS.iter().map(|h| h.to_string()).collect(),
            prediction_rows,
        ),
    }
}

pub fn render_table(table: &Table) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    Ok(writer.into_inner().map_err(|e| e.into_error())?)
}

/// Writes `nodes.csv` and `predictions.csv` into `dir` and returns their paths.
pub fn write_sample(dir: &Path, tables: &SampleTables) -> Result<(PathBuf, PathBuf)> {
    let stops_path = dir.join("nodes.csv");
    let predictions_path = dir.join("predictions.csv");

    write_sink(&stops_path, &render_table(&tables.stops)?)?;
    write_sink(&predictions_path, &render_table(&tables.predictions)?)?;

    let with_defaults = tables
        .predictions
        .rows
        .iter()
        .filter(|row| row.get(3).is_some_and(|d| d != "0"))
        .count();
    info!(
        stops = tables.stops.len(),
        predictions = tables.predictions.len(),
        with_defaults,
        dir = %dir.display(),
        "Sample input written"
    );

    Ok((stops_path, predictions_path))
}
