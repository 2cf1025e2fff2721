//! flow-soc - hybrid state-of-charge estimation for flow batteries
//!
//! Fuses a coulomb-counting predictor with a stacked LSTM sequence model
//! through a scalar Extended Kalman Filter. The learned correction is only
//! trusted while discharging, once the feature window is full, and when its
//! residual against the physics prior is inside the outlier band.
//!
//! The per-sample path (`SocEstimator::update`) is total, allocation-free and
//! runs in fixed time. Fallible operations are limited to construction,
//! configuration loading and the host-side CSV tooling.

pub mod ffi;
pub mod fusion;
pub mod io;
pub mod lstm;
pub mod normalizer;
pub mod observer;
pub mod params;
pub mod predictor;
pub mod sim;
pub mod state;
pub mod trust;
pub mod weights;
pub mod window;

use static_assertions::const_assert;
use thiserror::Error;

/// Number of input features: current, voltage, dV/dt, cumulative Ah.
pub const FEATURE_DIM: usize = 4;
/// Hidden width of every LSTM layer.
pub const HIDDEN_SIZE: usize = 64;
/// Number of stacked LSTM layers.
pub const NUM_LAYERS: usize = 2;
/// Time steps held in the sliding window.
pub const SEQ_LEN: usize = 10;
/// Concatenated gate width (input, forget, candidate, output).
pub const GATE_WIDTH: usize = 4 * HIDDEN_SIZE;

const_assert!(FEATURE_DIM == 4);
const_assert!(NUM_LAYERS >= 1);
const_assert!(SEQ_LEN > 0);
const_assert!(GATE_WIDTH == HIDDEN_SIZE * 4);

/// One feature vector.
pub type Feature = [f32; FEATURE_DIM];

// Re-export main types
pub use fusion::{ekf_update, Posterior};
pub use normalizer::FeatureScaler;
pub use observer::{SocEstimator, SocStep};
pub use params::EstimatorParams;
pub use predictor::{CoulombCounter, Prior};
pub use state::{EstimatorPhase, EstimatorState};
pub use trust::{GateDecision, ResidualGate, SkipReason};
pub use weights::{LayerWeights, ModelWeights};
pub use window::SlidingWindow;

#[derive(Debug, Error)]
pub enum SocError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("{context} shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch {
        context: String,
        expected: usize,
        got: usize,
    },
    #[error("row {row}: missing column {column}")]
    MissingColumn { row: usize, column: usize },
    #[error("row {row}, column {column}: cannot parse {value:?} as a number")]
    ParseField {
        row: usize,
        column: usize,
        value: String,
    },
}

/// Clamp a state of charge into `[0, 1]`.
#[inline]
pub fn clip01(x: f32) -> f32 {
    if x < 0.0 {
        0.0
    } else if x > 1.0 {
        1.0
    } else {
        x
    }
}

#[inline]
pub(crate) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip01_bounds() {
        assert_eq!(clip01(-0.3), 0.0);
        assert_eq!(clip01(1.4), 1.0);
        assert_eq!(clip01(0.42), 0.42);
    }

    #[test]
    fn test_clip01_nan_passes_through() {
        // NaN is neither below 0 nor above 1
        assert!(clip01(f32::NAN).is_nan());
    }

    #[test]
    fn test_sigmoid_midpoint() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(20.0) > 0.999);
        assert!(sigmoid(-20.0) < 0.001);
    }
}
