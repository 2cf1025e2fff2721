//! Synthetic cycling harness
//!
//! Generates a deterministic discharge/charge profile for a single cell and
//! runs it through an estimator, for demos and end-to-end tests.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::clip01;
use crate::observer::SocEstimator;
use crate::trust::GateDecision;

/// Simulation configuration
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Sample period [s]
    pub dt: f32,
    pub steps: usize,
    /// True cell capacity [Ah]
    pub capacity_ah: f32,
    /// Discharge current magnitude [A]
    pub discharge_current: f32,
    /// Charge current magnitude [A]
    pub charge_current: f32,
    /// Steps spent in each discharge or charge phase
    pub half_period: usize,
    /// Ohmic resistance [Ohm]
    pub internal_resistance: f32,
    pub sigma_current: f32,
    pub sigma_voltage: f32,
    pub initial_soc: f32,
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            dt: 1.0,
            steps: 2000,
            capacity_ah: 640.0,
            discharge_current: 80.0,
            charge_current: 60.0,
            half_period: 500,
            internal_resistance: 0.002,
            sigma_current: 0.2,
            sigma_voltage: 0.002,
            initial_soc: 0.8,
            seed: 42,
        }
    }
}

/// One simulated sample and the estimator's answer
#[derive(Debug, Clone)]
pub struct SimStep {
    pub t: f32,
    pub current: f32,
    pub voltage: f32,
    pub soc_true: f32,
    pub soc_est: f32,
    pub covariance: f32,
    pub score: Option<f32>,
    pub gate: GateDecision,
}

impl SimStep {
    pub fn error(&self) -> f32 {
        self.soc_est - self.soc_true
    }
}

/// Monotone open-circuit voltage of a zinc-bromine cell [V]
pub fn open_circuit_voltage(soc: f32) -> f32 {
    let s = soc.clamp(0.01, 0.99);
    1.72 + 0.16 * s + 0.02 * (s / (1.0 - s)).ln()
}

/// Signed current of step `k`: discharge first, then charge, repeating
fn profile_current(config: &SimConfig, k: usize) -> f32 {
    if config.half_period == 0 || (k / config.half_period) % 2 == 0 {
        -config.discharge_current
    } else {
        config.charge_current
    }
}

/// Run the cycling profile through `estimator`
///
/// The estimator is re-initialized and seeded with `config.initial_soc`.
pub fn run_simulation(config: &SimConfig, estimator: &mut SocEstimator) -> Vec<SimStep> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut noise = move |sigma: f32| -> f32 {
        let z: f32 = StandardNormal.sample(&mut rng);
        z * sigma
    };

    estimator.initialize();
    estimator.seed_initial_soc(config.initial_soc);

    let mut soc_true = clip01(config.initial_soc);
    let mut results = Vec::with_capacity(config.steps);

    for k in 0..config.steps {
        let t = k as f32 * config.dt;
        let current_true = profile_current(config, k);

        soc_true = clip01(soc_true + current_true * config.dt / 3600.0 / config.capacity_ah);

        let current = current_true + noise(config.sigma_current);
        let voltage = open_circuit_voltage(soc_true)
            + current_true * config.internal_resistance
            + noise(config.sigma_voltage);

        let dt = if k == 0 { 0.0 } else { config.dt };
        let out = estimator.step(current, voltage, dt);

        results.push(SimStep {
            t,
            current,
            voltage,
            soc_true,
            soc_est: out.soc,
            covariance: out.covariance,
            score: out.score,
            gate: out.gate,
        });
    }

    results
}

/// Calculate RMS error
pub fn rms_error(errors: &[f32]) -> f32 {
    if errors.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = errors.iter().map(|&e| e * e).sum();
    (sum_sq / errors.len() as f32).sqrt()
}

pub fn max_abs_error(errors: &[f32]) -> f32 {
    errors.iter().map(|e| e.abs()).fold(0.0f32, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::EstimatorParams;
    use crate::weights::ModelWeights;

    fn estimator() -> SocEstimator {
        SocEstimator::new(ModelWeights::seeded(1), EstimatorParams::default()).unwrap()
    }

    #[test]
    fn test_simulation_runs() {
        let config = SimConfig {
            steps: 100,
            ..Default::default()
        };
        let results = run_simulation(&config, &mut estimator());
        assert_eq!(results.len(), 100);
        assert!(results
            .iter()
            .all(|s| (0.0..=1.0).contains(&s.soc_est) && (0.0..=1.0).contains(&s.soc_true)));
    }

    #[test]
    fn test_simulation_is_reproducible() {
        let config = SimConfig {
            steps: 300,
            ..Default::default()
        };
        let a = run_simulation(&config, &mut estimator());
        let b = run_simulation(&config, &mut estimator());
        let ea: Vec<f32> = a.iter().map(|s| s.soc_est).collect();
        let eb: Vec<f32> = b.iter().map(|s| s.soc_est).collect();
        assert_eq!(ea, eb);
    }

    #[test]
    fn test_charge_phase_never_corrects() {
        let config = SimConfig {
            steps: 60,
            half_period: 30,
            ..Default::default()
        };
        let results = run_simulation(&config, &mut estimator());
        for step in &results[30..] {
            assert!(step.score.is_none());
        }
    }

    #[test]
    fn test_ocv_is_monotone() {
        let mut prev = open_circuit_voltage(0.0);
        for k in 1..=100 {
            let v = open_circuit_voltage(k as f32 / 100.0);
            assert!(v >= prev);
            prev = v;
        }
    }

    #[test]
    fn test_rms_error() {
        let errors = vec![0.1, 0.2, 0.3];
        let rms = rms_error(&errors);
        let expected = ((0.01_f32 + 0.04 + 0.09) / 3.0).sqrt();
        assert!((rms - expected).abs() < 1e-6);
        assert_eq!(max_abs_error(&[-0.4, 0.1]), 0.4);
        assert_eq!(rms_error(&[]), 0.0);
    }
}
