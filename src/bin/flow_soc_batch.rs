use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;

use flow_soc::io::{annotate_csv, default_output_path};
use flow_soc::{EstimatorParams, ModelWeights, SocEstimator};

#[derive(Debug, Parser)]
#[command(name = "flow-soc-batch")]
#[command(about = "Annotate a recorded (time, current, voltage, ...) CSV log with SOC estimates")]
struct Cli {
    /// Input CSV with a header row
    input: PathBuf,

    /// Output CSV (default: input name with a `_pred` suffix)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Exported model weights (JSON)
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Estimator parameters (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Starting SOC in [0, 1]
    #[arg(long)]
    initial_soc: Option<f32>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let params = match &cli.config {
        Some(path) => EstimatorParams::from_toml_file(path)
            .with_context(|| format!("failed to load parameters: {}", path.display()))?,
        None => EstimatorParams::default(),
    };

    let weights = match &cli.weights {
        Some(path) => ModelWeights::from_json_file(path)
            .with_context(|| format!("failed to load weights: {}", path.display()))?,
        None => {
            warn!("no --weights given; running with a neutral zero model");
            ModelWeights::zeros()
        }
    };

    let mut estimator =
        SocEstimator::new(weights, params).context("failed to construct estimator")?;
    if let Some(soc) = cli.initial_soc {
        let applied = estimator.seed_initial_soc(soc);
        info!("initial SOC {applied:.4}");
    }

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input));
    let summary = annotate_csv(&cli.input, &output, &mut estimator).with_context(|| {
        format!(
            "failed to annotate {} -> {}",
            cli.input.display(),
            output.display()
        )
    })?;

    info!(
        "{} rows, {} corrected, final SOC {}",
        summary.rows,
        summary.corrected_rows,
        summary
            .final_soc
            .map_or_else(|| "NA".to_string(), |s| format!("{s:.4}"))
    );
    if let (Some(rms), Some(max)) = (summary.rms_error, summary.max_abs_error) {
        info!(
            "ground truth on {} rows: rms error {rms:.4}, max abs error {max:.4}",
            summary.scored_rows
        );
    }
    println!("wrote {}", output.display());
    Ok(())
}
