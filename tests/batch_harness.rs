use std::fs;

use flow_soc::io::annotate_csv;
use flow_soc::{EstimatorParams, ModelWeights, SocError, SocEstimator};

fn estimator() -> SocEstimator {
    SocEstimator::new(ModelWeights::seeded(12), EstimatorParams::default()).unwrap()
}

#[test]
fn annotates_rows_with_prediction_column() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("log.csv");
    let output = dir.path().join("log_pred.csv");

    let mut body = String::from("time_s,current_A,voltage_V,SOC\n");
    let mut samples = Vec::new();
    for k in 0..30 {
        let t = 0.5 * k as f32;
        let current = if k < 20 { -40.0 } else { 25.0 };
        let voltage = 1.85 - 0.001 * k as f32;
        body.push_str(&format!("{t},{current},{voltage},0.{k:02}\n"));
        samples.push((t, current, voltage));
    }
    fs::write(&input, body).unwrap();

    let mut est = estimator();
    est.seed_initial_soc(0.75);
    let summary = annotate_csv(&input, &output, &mut est).unwrap();
    assert_eq!(summary.rows, 30);

    // reference run with dt = 0 on the first row
    let mut reference = estimator();
    reference.seed_initial_soc(0.75);
    let mut prev_t = None;
    let mut expected = Vec::new();
    for &(t, current, voltage) in &samples {
        let dt = prev_t.map_or(0.0, |p| t - p);
        prev_t = Some(t);
        expected.push(reference.update(current, voltage, dt));
    }
    assert_eq!(summary.final_soc, expected.last().copied());

    let mut rdr = csv::Reader::from_path(&output).unwrap();
    let header: Vec<String> = rdr.headers().unwrap().iter().map(str::to_string).collect();
    assert_eq!(header, ["time_s", "current_A", "voltage_V", "SOC", "pred"]);

    let records: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 30);
    for (k, record) in records.iter().enumerate() {
        assert_eq!(&record[3], format!("0.{k:02}"));
        let pred: f32 = record[4].parse().unwrap();
        assert!((pred - expected[k]).abs() < 1e-6);
    }
    assert_eq!(&records[0][0], "0.000000");

    let truth: Vec<f32> = (0..30).map(|k| k as f32 / 100.0).collect();
    let errors: Vec<f32> = expected.iter().zip(&truth).map(|(p, t)| p - t).collect();
    assert_eq!(summary.scored_rows, 30);
    let rms = summary.rms_error.unwrap();
    assert!((rms - flow_soc::sim::rms_error(&errors)).abs() < 1e-6);
    let max = summary.max_abs_error.unwrap();
    assert!((max - flow_soc::sim::max_abs_error(&errors)).abs() < 1e-6);
}

#[test]
fn skips_empty_ground_truth_and_reports_none_without_it() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("partial.csv");
    let output = dir.path().join("partial_pred.csv");
    fs::write(&input, "t,I,V,gt\n0,0,1.8,0.5\n1,0,1.8,\n2,0,1.8,0.4\n").unwrap();

    let mut est = estimator();
    est.seed_initial_soc(0.5);
    let summary = annotate_csv(&input, &output, &mut est).unwrap();
    // zero current keeps the prediction at the seed
    assert_eq!(summary.rows, 3);
    assert_eq!(summary.scored_rows, 2);
    assert!((summary.max_abs_error.unwrap() - 0.1).abs() < 1e-6);
    let expected_rms = (0.1f32 * 0.1 / 2.0).sqrt();
    assert!((summary.rms_error.unwrap() - expected_rms).abs() < 1e-6);

    let bare = dir.path().join("bare.csv");
    fs::write(&bare, "t,I,V\n0,-1,1.8\n").unwrap();
    let summary = annotate_csv(&bare, &output, &mut estimator()).unwrap();
    assert_eq!(summary.scored_rows, 0);
    assert_eq!(summary.rms_error, None);
    assert_eq!(summary.max_abs_error, None);
}

#[test]
fn rejects_unparseable_ground_truth() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bad_gt.csv");
    let output = dir.path().join("bad_gt_pred.csv");
    fs::write(&input, "t,I,V,SOC\n0,-1,1.8,full\n").unwrap();

    assert!(matches!(
        annotate_csv(&input, &output, &mut estimator()),
        Err(SocError::ParseField { row: 1, column: 3, .. })
    ));
}

#[test]
fn rejects_unparseable_current() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bad.csv");
    let output = dir.path().join("bad_pred.csv");
    fs::write(&input, "t,I,V\n0,-1,1.8\n1,oops,1.8\n").unwrap();

    let err = annotate_csv(&input, &output, &mut estimator()).unwrap_err();
    match err {
        SocError::ParseField { row, column, value } => {
            assert_eq!(row, 2);
            assert_eq!(column, 1);
            assert_eq!(value, "oops");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn reports_missing_columns() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("short.csv");
    let output = dir.path().join("short_pred.csv");
    fs::write(&input, "t,I,V\n0,-1\n").unwrap();

    assert!(matches!(
        annotate_csv(&input, &output, &mut estimator()),
        Err(SocError::MissingColumn { row: 1, column: 2 })
    ));
}
