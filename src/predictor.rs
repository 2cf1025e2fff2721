//! Coulomb-counting state predictor

use crate::clip01;
use crate::params::EstimatorParams;

/// Prior SOC and covariance before any learned correction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prior {
    pub soc: f32,
    pub covariance: f32,
}

/// Integrates current over time with asymmetric charge/discharge efficiency
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoulombCounter {
    capacity_ah: f32,
    charge_efficiency: f32,
    discharge_efficiency: f32,
    process_noise: f32,
}

impl CoulombCounter {
    pub fn new(params: &EstimatorParams) -> Self {
        Self {
            capacity_ah: params.capacity_ah,
            charge_efficiency: params.charge_efficiency,
            discharge_efficiency: params.discharge_efficiency,
            process_noise: params.process_noise,
        }
    }

    /// SOC change for `current` [A] (positive charges) over `dt_h` hours
    pub fn delta(&self, current: f32, dt_h: f32) -> f32 {
        if current >= 0.0 {
            current * dt_h / (self.capacity_ah * self.charge_efficiency)
        } else {
            -current.abs() * dt_h / (self.capacity_ah * self.discharge_efficiency)
        }
    }

    /// Propagate the previous estimate; SOC is hard-clamped to `[0, 1]`
    pub fn predict(&self, current: f32, dt_h: f32, soc: f32, covariance: f32) -> Prior {
        Prior {
            soc: clip01(soc + self.delta(current, dt_h)),
            covariance: covariance + self.process_noise,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> CoulombCounter {
        CoulombCounter::new(&EstimatorParams::default())
    }

    #[test]
    fn test_charge_uses_charge_efficiency() {
        // 64 A for 1 h into 640 Ah at eta 1.0
        let d = counter().delta(64.0, 1.0);
        assert!((d - 0.1).abs() < 1e-7);
    }

    #[test]
    fn test_discharge_uses_discharge_efficiency() {
        // 64 A for 1 h out of 640 Ah at eta 0.8
        let d = counter().delta(-64.0, 1.0);
        assert!((d + 0.125).abs() < 1e-7);
    }

    #[test]
    fn test_zero_current_is_neutral() {
        let prior = counter().predict(0.0, 1.0, 0.7, 0.01);
        assert_eq!(prior.soc, 0.7);
    }

    #[test]
    fn test_prior_is_clamped() {
        let c = counter();
        assert_eq!(c.predict(-640.0, 1.0, 0.05, 0.0).soc, 0.0);
        assert_eq!(c.predict(640.0, 1.0, 0.95, 0.0).soc, 1.0);
    }

    #[test]
    fn test_covariance_grows_by_process_noise() {
        let params = EstimatorParams {
            process_noise: 0.5,
            ..Default::default()
        };
        let prior = CoulombCounter::new(&params).predict(-1.0, 0.1, 0.5, 0.25);
        assert_eq!(prior.covariance, 0.75);
    }
}
