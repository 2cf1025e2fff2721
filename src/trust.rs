//! Residual gating for the learned correction
//!
//! Decides whether a sequence-model score may correct the coulomb-counting
//! prior and, if so, with which measurement noise. Inside the outlier band
//! the noise grows with the fourth power of the residual, so large residuals
//! are down-weighted steeply; beyond the band they are discarded.

use crate::params::EstimatorParams;

/// Why the correction branch did not run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Current is zero or positive
    NotDischarging,
    /// Fewer than a full window of samples since initialization
    WindowFilling,
    /// Current, voltage or `dt` was NaN or infinite; the sample was dropped
    NonFiniteInput,
}

/// Outcome of the correction gate for one sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateDecision {
    Skipped(SkipReason),
    Rejected {
        residual: f32,
    },
    Accepted {
        residual: f32,
        measurement_noise: f32,
        gain: f32,
    },
}

impl GateDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, GateDecision::Accepted { .. })
    }

    pub fn residual(&self) -> Option<f32> {
        match self {
            GateDecision::Skipped(_) => None,
            GateDecision::Rejected { residual } | GateDecision::Accepted { residual, .. } => {
                Some(*residual)
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GateDecision::Skipped(SkipReason::NotDischarging) => "skip_charge",
            GateDecision::Skipped(SkipReason::WindowFilling) => "skip_window",
            GateDecision::Skipped(SkipReason::NonFiniteInput) => "skip_nonfinite",
            GateDecision::Rejected { .. } => "rejected",
            GateDecision::Accepted { .. } => "accepted",
        }
    }
}

/// Outlier threshold plus quartic measurement-noise schedule
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResidualGate {
    outlier_threshold: f32,
    gate_scale: f32,
    noise_base: f32,
}

impl ResidualGate {
    pub fn new(params: &EstimatorParams) -> Self {
        Self {
            outlier_threshold: params.outlier_threshold,
            gate_scale: params.gate_scale,
            noise_base: params.measurement_noise_base,
        }
    }

    /// Correction only runs on discharge with a full window
    pub fn precheck(&self, current: f32, window_full: bool) -> Option<SkipReason> {
        if current < 0.0 {
            if window_full {
                None
            } else {
                Some(SkipReason::WindowFilling)
            }
        } else {
            Some(SkipReason::NotDischarging)
        }
    }

    pub fn admits(&self, residual: f32) -> bool {
        residual < self.outlier_threshold
    }

    /// `R0 * (1 + (residual / gate_scale)^4)`
    pub fn measurement_noise(&self, residual: f32) -> f32 {
        self.noise_base * (1.0 + (residual / self.gate_scale).powf(4.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> ResidualGate {
        ResidualGate::new(&EstimatorParams::default())
    }

    #[test]
    fn test_precheck_strict_discharge_sign() {
        let g = gate();
        assert_eq!(g.precheck(0.0, true), Some(SkipReason::NotDischarging));
        assert_eq!(g.precheck(5.0, true), Some(SkipReason::NotDischarging));
        assert_eq!(g.precheck(-1e-6, false), Some(SkipReason::WindowFilling));
        assert_eq!(g.precheck(-1e-6, true), None);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let g = gate();
        assert!(g.admits(0.079));
        assert!(!g.admits(0.08));
        assert!(!g.admits(0.5));
    }

    #[test]
    fn test_noise_at_zero_residual_is_base() {
        let base = EstimatorParams::default().measurement_noise_base;
        assert_eq!(gate().measurement_noise(0.0), base);
    }

    #[test]
    fn test_noise_grows_quartically() {
        let g = gate();
        let base = EstimatorParams::default().measurement_noise_base;
        // residual == gate_scale doubles the base variance
        assert!((g.measurement_noise(0.001) / base - 2.0).abs() < 1e-4);
        // 10x the gate scale adds 10^4
        assert!((g.measurement_noise(0.01) / base - 10_001.0).abs() < 1.0);
    }

    #[test]
    fn test_decision_labels() {
        let accepted = GateDecision::Accepted {
            residual: 0.01,
            measurement_noise: 1.0,
            gain: 0.1,
        };
        assert!(accepted.is_accepted());
        assert_eq!(accepted.residual(), Some(0.01));
        assert_eq!(GateDecision::Rejected { residual: 0.2 }.label(), "rejected");
        assert_eq!(
            GateDecision::Skipped(SkipReason::NonFiniteInput).label(),
            "skip_nonfinite"
        );
        assert_eq!(
            GateDecision::Skipped(SkipReason::WindowFilling).residual(),
            None
        );
    }
}
