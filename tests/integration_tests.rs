use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use trip_risk_annotator::annotator::annotate_tables;
use trip_risk_annotator::annotator::key::KeyMode;
use trip_risk_annotator::annotator::schema::ColumnMap;
use trip_risk_annotator::annotator::types::{AnnotateOptions, Annotation, DuplicatePolicy};
use trip_risk_annotator::error::{AnnotateError, TableKind};
use trip_risk_annotator::fetch::{read_source, write_sink};
use trip_risk_annotator::output::{ResultPaths, discard_results, write_annotation, write_results};
use trip_risk_annotator::parser::{Table, parse_table};
use trip_risk_annotator::stats::RunRecord;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn load(name: &str) -> Table {
    let bytes = read_source(&fixture(name)).expect("Failed to read fixture");
    parse_table(&bytes).expect("Failed to parse fixture")
}

fn run(stops: &Table, predictions: &Table) -> Result<Annotation, AnnotateError> {
    annotate_tables(
        stops,
        predictions,
        &ColumnMap::default(),
        &AnnotateOptions::default(),
    )
}

#[test]
fn test_full_pipeline_flags() {
    let annotation = run(&load("nodes.csv"), &load("predictions.csv")).unwrap();
    let flags: Vec<bool> = annotation.rows.iter().map(|r| r.is_at_risk).collect();

    // T1: sequences 3,1,4,2 with 2 defaults -> 3 and 4
    // T2: 3 stops with 5 defaults -> all, clamped
    // T3: no prediction
    // T4: 0 defaults
    assert_eq!(
        flags,
        vec![true, false, true, true, false, true, true, false, false, false, false]
    );
}

#[test]
fn test_full_pipeline_summary() {
    let annotation = run(&load("nodes.csv"), &load("predictions.csv")).unwrap();
    let summary = &annotation.summary;

    assert_eq!(summary.key_mode, KeyMode::HubTripRefTripId);
    assert_eq!(summary.stops, 11);
    assert_eq!(summary.predictions, 4);
    assert_eq!(summary.trips_seen, 4);
    assert_eq!(summary.trips_matched, 3);
    assert_eq!(summary.trips_unmatched, 1);
    assert_eq!(summary.trips_clamped, 1);
    assert_eq!(summary.stops_at_risk, 5);
    assert_eq!(summary.predictions_unused, 1);
}

#[test]
fn test_unmatched_trip_has_no_prediction_fields() {
    let annotation = run(&load("nodes.csv"), &load("predictions.csv")).unwrap();
    for row in &annotation.rows[7..9] {
        assert!(!row.is_at_risk);
        assert!(row.prediction.is_none());
    }

    let t2 = annotation.rows[2].prediction.as_ref().unwrap();
    assert_eq!(t2.predicted_defaults, 5);
    assert_eq!(t2.actual_defaults_marked, 3);
    assert_eq!(t2.avg_drr, 0.2);
    assert_eq!(t2.max_drr, 0.4);
    assert_eq!(t2.prediction_time, "2024-03-01 08:30:00");
}

#[test]
fn test_written_output_preserves_input_columns() {
    let stops = load("nodes.csv");
    let annotation = run(&stops, &load("predictions.csv")).unwrap();

    let path = env::temp_dir().join("trip_risk_integration_output.csv");
    write_annotation(&path, &annotation, false).unwrap();
    let written = parse_table(&fs::read(&path).unwrap()).unwrap();

    assert_eq!(written.len(), stops.len());
    assert_eq!(&written.headers[..stops.headers.len()], stops.headers.as_slice());
    for (out, input) in written.rows.iter().zip(&stops.rows) {
        assert_eq!(&out[..input.len()], input.as_slice());
    }
    assert_eq!(written.rows[0][4], "Smith, \"Jr\"");
    assert_eq!(written.rows[4][4], "  Cust E  ");

    fs::remove_file(&path).unwrap();
}

#[test]
fn test_rerun_on_output_is_idempotent() {
    let first = run(&load("nodes.csv"), &load("predictions.csv")).unwrap();

    let path = env::temp_dir().join("trip_risk_integration_rerun.csv.gz");
    write_annotation(&path, &first, false).unwrap();
    let annotated = parse_table(&read_source(&path).unwrap()).unwrap();
    let second = run(&annotated, &load("predictions.csv")).unwrap();

    assert_eq!(second.headers, first.headers);
    assert_eq!(second.rows, first.rows);
    // only the dropped-column warnings differ
    assert_eq!(second.summary.trips, first.summary.trips);

    fs::remove_file(&path).unwrap();
}

#[test]
fn test_malformed_sequence_aborts_with_row() {
    let err = run(&load("nodes_malformed.csv"), &load("predictions.csv")).unwrap_err();
    match err {
        AnnotateError::MalformedRecord {
            table, row, column, ..
        } => {
            assert_eq!(table, TableKind::Stops);
            assert_eq!(row, 2);
            assert_eq!(column, "visit_sequence");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_duplicate_predictions_policy() {
    let stops = load("nodes.csv");
    let predictions = load("predictions_duplicate.csv");

    let err = run(&stops, &predictions).unwrap_err();
    assert_eq!(err.kind(), "ambiguous_key_error");

    let options = AnnotateOptions {
        duplicates: DuplicatePolicy::FirstWins,
    };
    let annotation =
        annotate_tables(&stops, &predictions, &ColumnMap::default(), &options).unwrap();
    assert_eq!(annotation.summary.duplicate_predictions, 1);
    assert_eq!(annotation.rows[0].predicted_defaults(), Some(2));
}

#[test]
fn test_missing_prediction_columns() {
    let predictions = parse_table(b"Hub,trip_trip_ref_number,Defaults\nH1,T1,2\n").unwrap();
    let err = run(&load("nodes.csv"), &predictions).unwrap_err();
    assert_eq!(
        err,
        AnnotateError::Schema {
            table: TableKind::Predictions,
            columns: vec![
                "avg_drr".to_string(),
                "max_drr".to_string(),
                "time".to_string()
            ],
        }
    );
}

#[test]
fn test_gzip_inputs() {
    let dir = env::temp_dir().join("trip_risk_integration_gzip");
    let _ = fs::remove_dir_all(&dir);
    let stops_path = dir.join("nodes.csv.gz");
    write_sink(&stops_path, &fs::read(fixture("nodes.csv")).unwrap()).unwrap();

    let stops = parse_table(&read_source(&stops_path).unwrap()).unwrap();
    assert_eq!(stops, load("nodes.csv"));

    fs::remove_dir_all(&dir).unwrap();
}

fn run_record(annotation: &Annotation, output: &Path) -> RunRecord {
    RunRecord::from_summary(
        &annotation.summary,
        "nodes.csv",
        "predictions.csv",
        &output.display().to_string(),
    )
}

#[test]
fn test_write_results_writes_every_artifact() {
    let dir = env::temp_dir().join("trip_risk_integration_results");
    let _ = fs::remove_dir_all(&dir);
    let annotation = run(&load("nodes.csv"), &load("predictions.csv")).unwrap();

    let paths = ResultPaths {
        output: dir.join("out.csv"),
        summary: Some(dir.join("summary.json")),
        history: Some(dir.join("logs").join("history.csv").display().to_string()),
    };
    let rows = write_results(&paths, &annotation, true, &run_record(&annotation, &paths.output))
        .unwrap();

    assert_eq!(rows, 5);
    assert_eq!(parse_table(&fs::read(&paths.output).unwrap()).unwrap().len(), 5);
    assert!(dir.join("summary.json").exists());
    assert!(dir.join("logs").join("history.csv").exists());

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_failed_history_leaves_no_result_files() {
    let dir = env::temp_dir().join("trip_risk_integration_failed_history");
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    let blocker = dir.join("blocker");
    fs::write(&blocker, "a file, not a directory").unwrap();

    let annotation = run(&load("nodes.csv"), &load("predictions.csv")).unwrap();
    let paths = ResultPaths {
        output: dir.join("out.csv"),
        summary: Some(dir.join("summary.json")),
        history: Some(blocker.join("history.csv").display().to_string()),
    };
    let err = write_results(&paths, &annotation, false, &run_record(&annotation, &paths.output))
        .unwrap_err();

    assert!(format!("{err:#}").contains("blocker"));
    assert!(!paths.output.exists());
    assert!(!dir.join("summary.json").exists());

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_failed_run_removes_previous_output() {
    let dir = env::temp_dir().join("trip_risk_integration_stale_output");
    let _ = fs::remove_dir_all(&dir);
    let annotation = run(&load("nodes.csv"), &load("predictions.csv")).unwrap();
    let paths = ResultPaths::new(dir.join("out.csv"));
    write_results(&paths, &annotation, false, &run_record(&annotation, &paths.output)).unwrap();
    assert!(paths.output.exists());

    // a later run on malformed input fails before writing anything
    assert!(run(&load("nodes_malformed.csv"), &load("predictions.csv")).is_err());
    discard_results(&paths);
    assert!(!paths.output.exists());

    // nothing left to remove is fine
    discard_results(&paths);

    fs::remove_dir_all(&dir).unwrap();
}
