//! Estimator parameters
//!
//! Physical and filter tuning constants for the hybrid estimator

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::SocError;

/// Tuning constants for the coulomb counter, the EKF and the residual gate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorParams {
    /// Nominal capacity [Ah]
    pub capacity_ah: f32,
    /// Coulombic efficiency while charging
    pub charge_efficiency: f32,
    /// Coulombic efficiency while discharging
    pub discharge_efficiency: f32,
    /// Process noise variance Q
    pub process_noise: f32,
    /// Base measurement noise variance R0
    pub measurement_noise_base: f32,
    /// Residuals at or above this are rejected outright
    pub outlier_threshold: f32,
    /// Residual scale of the quartic noise growth
    pub gate_scale: f32,
    /// Covariance after initialization or seeding
    pub seed_covariance: f32,
    /// Smallest dt [s] for which dV/dt is computed
    pub dt_epsilon: f32,
    /// Cumulative charge right after initialization [Ah]
    pub cum_ah_offset: f32,
}

impl EstimatorParams {
    /// Parameters the shipped model was tuned with
    pub fn default_params() -> Self {
        Self {
            capacity_ah: 640.0,
            charge_efficiency: 1.0,
            discharge_efficiency: 0.8,
            process_noise: 1e-10,
            measurement_noise_base: 0.15 * 0.15 * 0.15 * 0.15,
            outlier_threshold: 0.08,
            gate_scale: 0.001,
            seed_covariance: 0.01,
            dt_epsilon: 1e-6,
            cum_ah_offset: 0.0,
        }
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, SocError> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, SocError> {
        let params: EstimatorParams = toml::from_str(raw)?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), SocError> {
        let fields = [
            ("capacity_ah", self.capacity_ah),
            ("charge_efficiency", self.charge_efficiency),
            ("discharge_efficiency", self.discharge_efficiency),
            ("process_noise", self.process_noise),
            ("measurement_noise_base", self.measurement_noise_base),
            ("outlier_threshold", self.outlier_threshold),
            ("gate_scale", self.gate_scale),
            ("seed_covariance", self.seed_covariance),
            ("dt_epsilon", self.dt_epsilon),
            ("cum_ah_offset", self.cum_ah_offset),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(invalid(format!("{name} must be finite")));
        }

        if self.capacity_ah <= 0.0 {
            return Err(invalid("capacity_ah must be > 0"));
        }
        if !(self.charge_efficiency > 0.0 && self.charge_efficiency <= 1.0) {
            return Err(invalid("charge_efficiency must be in (0, 1]"));
        }
        if !(self.discharge_efficiency > 0.0 && self.discharge_efficiency <= 1.0) {
            return Err(invalid("discharge_efficiency must be in (0, 1]"));
        }
        if self.process_noise < 0.0 {
            return Err(invalid("process_noise must be >= 0"));
        }
        if self.measurement_noise_base <= 0.0 {
            return Err(invalid("measurement_noise_base must be > 0"));
        }
        if self.outlier_threshold <= 0.0 {
            return Err(invalid("outlier_threshold must be > 0"));
        }
        if self.gate_scale <= 0.0 {
            return Err(invalid("gate_scale must be > 0"));
        }
        if self.seed_covariance < 0.0 {
            return Err(invalid("seed_covariance must be >= 0"));
        }
        if self.dt_epsilon < 0.0 {
            return Err(invalid("dt_epsilon must be >= 0"));
        }
        Ok(())
    }
}

impl Default for EstimatorParams {
    fn default() -> Self {
        Self::default_params()
    }
}

fn invalid(msg: impl Into<String>) -> SocError {
    SocError::InvalidConfig(msg.into())
}
