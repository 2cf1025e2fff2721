use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::fs;
use std::path::PathBuf;

use flow_soc::io::write_trajectory_csv;
use flow_soc::sim::{max_abs_error, rms_error, run_simulation, SimConfig};
use flow_soc::{EstimatorParams, ModelWeights, SocEstimator};

#[derive(Debug, Parser)]
#[command(name = "flow-soc-sim")]
#[command(about = "Run a synthetic discharge/charge cycle through the hybrid SOC estimator")]
struct Cli {
    #[arg(long, default_value = "output-flow-soc-sim")]
    outdir: PathBuf,

    /// Estimator parameters (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Seed for the pseudo-random model weights
    #[arg(long, default_value_t = 1)]
    weight_seed: u64,

    #[arg(long, default_value_t = 2000)]
    steps: usize,

    #[arg(long, default_value_t = 0.8)]
    initial_soc: f32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let params = match &cli.config {
        Some(path) => EstimatorParams::from_toml_file(path)
            .with_context(|| format!("failed to load parameters: {}", path.display()))?,
        None => EstimatorParams::default(),
    };

    let config = SimConfig {
        steps: cli.steps,
        initial_soc: cli.initial_soc,
        seed: cli.seed,
        capacity_ah: params.capacity_ah,
        ..Default::default()
    };

    let mut estimator = SocEstimator::new(ModelWeights::seeded(cli.weight_seed), params)
        .context("failed to construct estimator")?;
    let results = run_simulation(&config, &mut estimator);

    let errors: Vec<f32> = results.iter().map(|s| s.error()).collect();
    let corrected = results.iter().filter(|s| s.gate.is_accepted()).count();
    info!(
        "rms error {:.5}, max error {:.5}, {corrected}/{} samples corrected",
        rms_error(&errors),
        max_abs_error(&errors),
        results.len()
    );

    fs::create_dir_all(&cli.outdir).with_context(|| {
        format!(
            "failed to create output directory: {}",
            cli.outdir.display()
        )
    })?;
    let path = cli.outdir.join("trajectory.csv");
    write_trajectory_csv(&path, &results)
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!("wrote {}", path.display());
    Ok(())
}
