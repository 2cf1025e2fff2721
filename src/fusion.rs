//! Scalar EKF update
//!
//! The measurement model is identity, so the EKF collapses to a scalar
//! Kalman correction of the coulomb-counting prior.

use crate::predictor::Prior;

/// Corrected SOC and covariance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Posterior {
    pub soc: f32,
    pub covariance: f32,
    /// Kalman gain that was applied
    pub gain: f32,
}

impl Posterior {
    /// Posterior equal to the prior (no correction applied)
    pub fn from_prior(prior: Prior) -> Self {
        Self {
            soc: prior.soc,
            covariance: prior.covariance,
            gain: 0.0,
        }
    }
}

/// Fuse `prior` with `measurement` of variance `measurement_noise`
///
/// The corrected covariance is re-inflated by `process_noise`.
pub fn ekf_update(
    prior: Prior,
    measurement: f32,
    measurement_noise: f32,
    process_noise: f32,
) -> Posterior {
    let s = prior.covariance + measurement_noise;
    let gain = prior.covariance / s;

    Posterior {
        soc: prior.soc + gain * (measurement - prior.soc),
        covariance: (1.0 - gain) * prior.covariance + process_noise,
        gain,
    }
}
