//! Hybrid SOC estimator
//!
//! Drives feature derivation, the sliding window, the coulomb-counting
//! predictor, the LSTM score and the gated EKF correction once per sample.

use log::{debug, info, warn};

use crate::fusion::{ekf_update, Posterior};
use crate::lstm::SequenceModel;
use crate::normalizer::FeatureScaler;
use crate::params::EstimatorParams;
use crate::predictor::{CoulombCounter, Prior};
use crate::state::{EstimatorPhase, EstimatorState};
use crate::trust::{GateDecision, ResidualGate, SkipReason};
use crate::weights::ModelWeights;
use crate::window::SlidingWindow;
use crate::{clip01, Feature, SocError, FEATURE_DIM};

const SECONDS_PER_HOUR: f32 = 3600.0;

/// Full report of one `step`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SocStep {
    /// Posterior SOC, also returned by `update`
    pub soc: f32,
    /// Posterior covariance
    pub covariance: f32,
    /// Coulomb-counting prior
    pub prior: Prior,
    /// Normalized feature vector pushed into the window, `None` when the
    /// sample was discarded
    pub features: Option<Feature>,
    /// Sequence-model score, when the correction branch ran
    pub score: Option<f32>,
    pub gate: GateDecision,
}

/// Hybrid estimator handle
///
/// Every method takes `&mut self`; sharing one handle between execution
/// contexts needs external locking.
#[derive(Debug, Clone)]
pub struct SocEstimator {
    params: EstimatorParams,
    scaler: FeatureScaler,
    model: SequenceModel,
    counter: CoulombCounter,
    gate: ResidualGate,
    window: SlidingWindow,
    state: EstimatorState,
    phase: EstimatorPhase,
}

impl SocEstimator {
    /// Validate and bind weights and parameters; the handle starts Initialized
    pub fn new(weights: ModelWeights, params: EstimatorParams) -> Result<Self, SocError> {
        params.validate()?;
        weights.validate()?;

        let mut mean = [0.0; FEATURE_DIM];
        let mut scale = [0.0; FEATURE_DIM];
        mean.copy_from_slice(&weights.scaler_mean);
        scale.copy_from_slice(&weights.scaler_scale);

        info!(
            "binding SOC estimator: capacity {} Ah, outlier threshold {}",
            params.capacity_ah, params.outlier_threshold
        );

        Ok(Self {
            params,
            scaler: FeatureScaler::new(mean, scale),
            model: SequenceModel::from_weights(weights),
            counter: CoulombCounter::new(&params),
            gate: ResidualGate::new(&params),
            window: SlidingWindow::new(),
            state: EstimatorState::new(params.seed_covariance, params.cum_ah_offset),
            phase: EstimatorPhase::Initialized,
        })
    }

    /// Zero all volatile state and empty the window
    pub fn initialize(&mut self) {
        self.state = EstimatorState::new(self.params.seed_covariance, self.params.cum_ah_offset);
        self.window.reset();
        self.phase = EstimatorPhase::Initialized;
        debug!("estimator state reset");
    }

    /// Set the starting SOC (clamped) and reset the covariance
    pub fn seed_initial_soc(&mut self, soc: f32) -> f32 {
        if self.phase == EstimatorPhase::Running {
            warn!("initial SOC seeded after updates have already run");
        }
        self.state.soc = clip01(soc);
        self.state.covariance = self.params.seed_covariance;
        self.phase = EstimatorPhase::Seeded;
        self.state.soc
    }

    /// Process one sample and return the SOC estimate
    pub fn update(&mut self, current: f32, voltage: f32, dt_sec: f32) -> f32 {
        self.step(current, voltage, dt_sec).soc
    }

    /// Process one sample and report every intermediate quantity
    ///
    /// A sample with a non-finite input, or whose charge increment overflows,
    /// is discarded: nothing is integrated or pushed and the previous
    /// estimate is returned unchanged.
    pub fn step(&mut self, current: f32, voltage: f32, dt_sec: f32) -> SocStep {
        // Discharge accumulates positive Ah
        let delta_ah = -current * dt_sec / SECONDS_PER_HOUR;
        if !(current.is_finite() && voltage.is_finite() && dt_sec.is_finite())
            || !delta_ah.is_finite()
        {
            warn!("discarding non-finite sample: I={current} V={voltage} dt={dt_sec}");
            return self.discard();
        }

        let dv_dt = self
            .state
            .voltage_rate(voltage, dt_sec, self.params.dt_epsilon);
        self.state.prev_voltage = Some(voltage);

        self.state.cum_ah += delta_ah;

        let raw = [current, voltage, dv_dt, self.state.cum_ah];
        let features = self.scaler.transform(&raw);
        self.window.push(features);

        let dt_h = dt_sec / SECONDS_PER_HOUR;
        let prior = self
            .counter
            .predict(current, dt_h, self.state.soc, self.state.covariance);

        let (posterior, score, gate) = match self.gate.precheck(current, self.window.is_full()) {
            Some(reason) => (Posterior::from_prior(prior), None, GateDecision::Skipped(reason)),
            None => self.correct(prior),
        };

        self.state.soc = posterior.soc;
        self.state.covariance = posterior.covariance;
        self.phase = EstimatorPhase::Running;

        SocStep {
            soc: posterior.soc,
            covariance: posterior.covariance,
            prior,
            features: Some(features),
            score,
            gate,
        }
    }

    fn discard(&self) -> SocStep {
        let prior = Prior {
            soc: self.state.soc,
            covariance: self.state.covariance,
        };
        SocStep {
            soc: prior.soc,
            covariance: prior.covariance,
            prior,
            features: None,
            score: None,
            gate: GateDecision::Skipped(SkipReason::NonFiniteInput),
        }
    }

    fn correct(&self, prior: Prior) -> (Posterior, Option<f32>, GateDecision) {
        let seq = self.window.export();
        let score = self.model.forward(&seq);
        let residual = (score - prior.soc).abs();

        if !self.gate.admits(residual) {
            debug!(
                "rejecting sequence score {score:.4}: residual {residual:.4} vs prior {:.4}",
                prior.soc
            );
            return (
                Posterior::from_prior(prior),
                Some(score),
                GateDecision::Rejected { residual },
            );
        }

        let measurement_noise = self.gate.measurement_noise(residual);
        let posterior = ekf_update(prior, score, measurement_noise, self.params.process_noise);
        (
            posterior,
            Some(score),
            GateDecision::Accepted {
                residual,
                measurement_noise,
                gain: posterior.gain,
            },
        )
    }

    pub fn phase(&self) -> EstimatorPhase {
        self.phase
    }

    pub fn soc(&self) -> f32 {
        self.state.soc
    }

    pub fn covariance(&self) -> f32 {
        self.state.covariance
    }

    pub fn state(&self) -> EstimatorState {
        self.state
    }

    pub fn window_full(&self) -> bool {
        self.window.is_full()
    }

    pub fn params(&self) -> &EstimatorParams {
        &self.params
    }
}
