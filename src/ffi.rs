//! C ABI for firmware integration
//!
//! Mirrors the native call surface (init, seed, update) on an explicit
//! handle. Weight tables are passed as pointers to the fixed-size arrays the
//! offline exporter emits and are copied once at creation. A NULL handle
//! turns every call into a no-op returning 0.0. Declarations for C callers
//! live in `include/flow_soc.h`.

use std::ptr;
use std::slice;

use log::error;
use static_assertions::const_assert_eq;

use crate::observer::SocEstimator;
use crate::params::EstimatorParams;
use crate::weights::{LayerWeights, ModelWeights};
use crate::{FEATURE_DIM, GATE_WIDTH, HIDDEN_SIZE, NUM_LAYERS, SEQ_LEN};

const_assert_eq!(NUM_LAYERS, 2);

/// Pointers to the exported weight arrays
///
/// Lengths: scaler tables `FEATURE_DIM`, `lstm0_w_ih` `GATE_WIDTH * FEATURE_DIM`,
/// every other `w_ih`/`w_hh` `GATE_WIDTH * HIDDEN_SIZE`, biases `GATE_WIDTH`,
/// `fc_weight` `HIDDEN_SIZE`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FlowSocWeights {
    pub scaler_mean: *const f32,
    pub scaler_scale: *const f32,
    pub lstm0_w_ih: *const f32,
    pub lstm0_w_hh: *const f32,
    pub lstm0_b_ih: *const f32,
    pub lstm0_b_hh: *const f32,
    pub lstm1_w_ih: *const f32,
    pub lstm1_w_hh: *const f32,
    pub lstm1_b_ih: *const f32,
    pub lstm1_b_hh: *const f32,
    pub fc_weight: *const f32,
    pub fc_bias: f32,
}

impl FlowSocWeights {
    /// Copy the referenced arrays; `None` if any pointer is NULL
    ///
    /// # Safety
    /// Every non-NULL pointer must reference at least the documented number
    /// of readable `f32` values.
    pub unsafe fn to_model_weights(&self) -> Option<ModelWeights> {
        let layer0 = LayerWeights {
            w_ih: copy_table(self.lstm0_w_ih, GATE_WIDTH * FEATURE_DIM)?,
            w_hh: copy_table(self.lstm0_w_hh, GATE_WIDTH * HIDDEN_SIZE)?,
            b_ih: copy_table(self.lstm0_b_ih, GATE_WIDTH)?,
            b_hh: copy_table(self.lstm0_b_hh, GATE_WIDTH)?,
        };
        let layer1 = LayerWeights {
            w_ih: copy_table(self.lstm1_w_ih, GATE_WIDTH * HIDDEN_SIZE)?,
            w_hh: copy_table(self.lstm1_w_hh, GATE_WIDTH * HIDDEN_SIZE)?,
            b_ih: copy_table(self.lstm1_b_ih, GATE_WIDTH)?,
            b_hh: copy_table(self.lstm1_b_hh, GATE_WIDTH)?,
        };

        Some(ModelWeights {
            input_size: FEATURE_DIM,
            hidden_size: HIDDEN_SIZE,
            num_layers: NUM_LAYERS,
            seq_len: SEQ_LEN,
            scaler_mean: copy_table(self.scaler_mean, FEATURE_DIM)?,
            scaler_scale: copy_table(self.scaler_scale, FEATURE_DIM)?,
            layers: vec![layer0, layer1],
            fc_weight: copy_table(self.fc_weight, HIDDEN_SIZE)?,
            fc_bias: self.fc_bias,
        })
    }
}

unsafe fn copy_table(ptr: *const f32, len: usize) -> Option<Vec<f32>> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: caller guarantees `len` readable values behind a non-NULL `ptr`
    Some(unsafe { slice::from_raw_parts(ptr, len) }.to_vec())
}

/// Create an estimator with default parameters; NULL on bad input
///
/// # Safety
/// `weights` must be NULL or point to a valid `FlowSocWeights`.
#[no_mangle]
pub unsafe extern "C" fn flow_soc_create(weights: *const FlowSocWeights) -> *mut SocEstimator {
    // SAFETY: NULL-checked by `as_ref`; validity is the caller's contract
    let Some(raw) = (unsafe { weights.as_ref() }) else {
        error!("flow_soc_create: NULL weight table");
        return ptr::null_mut();
    };
    // SAFETY: forwarded caller contract
    let Some(tables) = (unsafe { raw.to_model_weights() }) else {
        error!("flow_soc_create: weight table contains a NULL array");
        return ptr::null_mut();
    };

    match SocEstimator::new(tables, EstimatorParams::default()) {
        Ok(est) => Box::into_raw(Box::new(est)),
        Err(e) => {
            error!("flow_soc_create: {e}");
            ptr::null_mut()
        }
    }
}

/// Reset all volatile state
///
/// # Safety
/// `handle` must be NULL or come from `flow_soc_create` and not be destroyed.
#[no_mangle]
pub unsafe extern "C" fn flow_soc_init(handle: *mut SocEstimator) {
    // SAFETY: see function contract
    if let Some(est) = unsafe { handle.as_mut() } {
        est.initialize();
    }
}

/// Seed the starting SOC; returns the clamped value actually applied
///
/// # Safety
/// Same as [`flow_soc_init`].
#[no_mangle]
pub unsafe extern "C" fn flow_soc_set_initial_soc(handle: *mut SocEstimator, init_soc: f32) -> f32 {
    // SAFETY: see function contract
    match unsafe { handle.as_mut() } {
        Some(est) => est.seed_initial_soc(init_soc),
        None => 0.0,
    }
}

/// Process one sample (current positive while charging)
///
/// # Safety
/// Same as [`flow_soc_init`].
#[no_mangle]
pub unsafe extern "C" fn flow_soc_update(
    handle: *mut SocEstimator,
    current_a: f32,
    voltage_v: f32,
    dt_sec: f32,
) -> f32 {
    // SAFETY: see function contract
    match unsafe { handle.as_mut() } {
        Some(est) => est.update(current_a, voltage_v, dt_sec),
        None => 0.0,
    }
}

/// Release a handle; NULL is ignored
///
/// # Safety
/// `handle` must be NULL or come from `flow_soc_create`, and must not be used
/// afterwards.
#[no_mangle]
pub unsafe extern "C" fn flow_soc_destroy(handle: *mut SocEstimator) {
    if !handle.is_null() {
        // SAFETY: pointer was produced by `Box::into_raw` in `flow_soc_create`
        drop(unsafe { Box::from_raw(handle) });
    }
}
