//! Per-feature standardization with fixed mean/scale constants

use crate::{Feature, FEATURE_DIM};

/// Affine standardizer `(x - mean) / scale`
///
/// A zero `scale` entry yields a non-finite feature; keeping scales non-zero
/// is the responsibility of whoever exports the weight tables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureScaler {
    mean: Feature,
    scale: Feature,
}

impl FeatureScaler {
    pub fn new(mean: Feature, scale: Feature) -> Self {
        Self { mean, scale }
    }

    pub fn transform(&self, raw: &Feature) -> Feature {
        let mut out = [0.0; FEATURE_DIM];
        for i in 0..FEATURE_DIM {
            out[i] = (raw[i] - self.mean[i]) / self.scale[i];
        }
        out
    }
}
