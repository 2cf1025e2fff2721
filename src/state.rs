//! Volatile estimator state
//!
//! Everything here is reset by `SocEstimator::initialize` and is never
//! persisted across power cycles.

/// Lifecycle of an estimator handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimatorPhase {
    /// Weights bound, volatile state zeroed
    Initialized,
    /// Initial SOC set explicitly
    Seeded,
    /// At least one `update` has run
    Running,
}

/// Snapshot of the filter state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorState {
    /// SOC estimate in `[0, 1]`
    pub soc: f32,
    /// Error covariance
    pub covariance: f32,
    /// Cumulative charge [Ah], discharge counts positive
    pub cum_ah: f32,
    /// Voltage of the previous sample, if any
    pub prev_voltage: Option<f32>,
}

impl EstimatorState {
    pub fn new(covariance: f32, cum_ah: f32) -> Self {
        Self {
            soc: 0.0,
            covariance,
            cum_ah,
            prev_voltage: None,
        }
    }

    /// Voltage rate of change, zero without history or for a degenerate `dt`
    pub fn voltage_rate(&self, voltage: f32, dt_sec: f32, dt_epsilon: f32) -> f32 {
        match self.prev_voltage {
            Some(prev) if dt_sec > dt_epsilon => (voltage - prev) / dt_sec,
            _ => 0.0,
        }
    }
}
