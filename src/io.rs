//! Host-side CSV tooling
//!
//! Batch annotation of recorded logs and trajectory export for simulations.
//! Nothing here is needed on the embedded target.

use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, WriterBuilder};

use crate::observer::SocEstimator;
use crate::sim::{max_abs_error, rms_error, SimStep};
use crate::SocError;

/// Header names recognized as a ground-truth SOC column
const GROUND_TRUTH_HEADERS: [&str; 2] = ["SOC", "gt"];

/// Result of annotating one CSV file
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub rows: usize,
    pub final_soc: Option<f32>,
    /// Rows where the learned correction was applied
    pub corrected_rows: usize,
    /// Rows with a non-empty ground-truth value
    pub scored_rows: usize,
    /// `pred - truth` statistics, when the log carries a ground-truth column
    pub rms_error: Option<f32>,
    pub max_abs_error: Option<f32>,
}

fn fmt_f32(v: f32) -> String {
    format!("{v:.6}")
}

fn fmt_opt(v: Option<f32>) -> String {
    match v {
        Some(x) => fmt_f32(x),
        None => "NA".to_string(),
    }
}

/// `data.csv` -> `data_pred.csv`; no extension -> `data_pred.csv`
pub fn default_output_path(input: &Path) -> PathBuf {
    match (input.file_stem(), input.extension()) {
        (Some(stem), Some(ext)) => {
            let name = format!("{}_pred.{}", stem.to_string_lossy(), ext.to_string_lossy());
            input.with_file_name(name)
        }
        _ => {
            let mut name = input.as_os_str().to_owned();
            name.push("_pred.csv");
            PathBuf::from(name)
        }
    }
}

fn parse_field(record: &StringRecord, row: usize, column: usize) -> Result<f32, SocError> {
    let raw = record
        .get(column)
        .ok_or(SocError::MissingColumn { row, column })?;
    raw.trim().parse::<f32>().map_err(|_| SocError::ParseField {
        row,
        column,
        value: raw.to_string(),
    })
}

/// Index of the first extra column named `SOC` or `gt` (any case)
fn ground_truth_column(headers: &StringRecord) -> Option<usize> {
    headers.iter().enumerate().skip(3).find_map(|(i, name)| {
        let name = name.trim();
        GROUND_TRUTH_HEADERS
            .iter()
            .any(|gt| name.eq_ignore_ascii_case(gt))
            .then_some(i)
    })
}

/// Run every row of `input` through `estimator` and write `output` with an
/// extra `pred` column
///
/// Columns 0, 1, 2 are time [s], current [A] and voltage [V]; any further
/// columns are copied through unchanged. `dt` is zero on the first row.
/// A ground-truth column is scored against `pred`; empty cells in it are
/// ignored.
pub fn annotate_csv(
    input: &Path,
    output: &Path,
    estimator: &mut SocEstimator,
) -> Result<BatchSummary, SocError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(input)?;
    let mut wtr = WriterBuilder::new().flexible(true).from_path(output)?;

    let headers = rdr.headers()?.clone();
    let truth_col = ground_truth_column(&headers);
    let mut header: Vec<String> = headers.iter().map(str::to_string).collect();
    header.push("pred".to_string());
    wtr.write_record(&header)?;

    let mut prev_t: Option<f32> = None;
    let mut errors = Vec::new();
    let mut summary = BatchSummary {
        rows: 0,
        final_soc: None,
        corrected_rows: 0,
        scored_rows: 0,
        rms_error: None,
        max_abs_error: None,
    };

    for (idx, result) in rdr.records().enumerate() {
        let record = result?;
        let row = idx + 1;
        let t = parse_field(&record, row, 0)?;
        let current = parse_field(&record, row, 1)?;
        let voltage = parse_field(&record, row, 2)?;

        let dt = prev_t.map_or(0.0, |p| t - p);
        prev_t = Some(t);

        let step = estimator.step(current, voltage, dt);
        if step.gate.is_accepted() {
            summary.corrected_rows += 1;
        }
        if let Some(col) = truth_col {
            if record.get(col).is_some_and(|v| !v.trim().is_empty()) {
                let truth = parse_field(&record, row, col)?;
                errors.push(step.soc - truth);
            }
        }

        let mut out = vec![fmt_f32(t), fmt_f32(current), fmt_f32(voltage)];
        out.extend(record.iter().skip(3).map(str::to_string));
        out.push(fmt_f32(step.soc));
        wtr.write_record(&out)?;

        summary.rows += 1;
        summary.final_soc = Some(step.soc);
    }

    wtr.flush()?;
    if !errors.is_empty() {
        summary.scored_rows = errors.len();
        summary.rms_error = Some(rms_error(&errors));
        summary.max_abs_error = Some(max_abs_error(&errors));
    }
    Ok(summary)
}

/// Write a simulation trajectory
pub fn write_trajectory_csv(path: &Path, rows: &[SimStep]) -> Result<(), SocError> {
    let mut wtr = WriterBuilder::new().from_path(path)?;

    wtr.write_record([
        "t",
        "current",
        "voltage",
        "soc_true",
        "soc_est",
        "covariance",
        "score",
        "gate",
    ])?;

    for row in rows {
        wtr.write_record([
            fmt_f32(row.t),
            fmt_f32(row.current),
            fmt_f32(row.voltage),
            fmt_f32(row.soc_true),
            fmt_f32(row.soc_est),
            format!("{:.6e}", row.covariance),
            fmt_opt(row.score),
            row.gate.label().to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
