//! Trained weight tables
//!
//! The tables are produced offline and handed to the estimator once. Shapes
//! are checked against the compiled dimensions before anything is bound, so
//! a mismatched export fails at construction instead of producing silently
//! wrong SOC values.

use std::fs;
use std::path::Path;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

use crate::{SocError, FEATURE_DIM, GATE_WIDTH, HIDDEN_SIZE, NUM_LAYERS, SEQ_LEN};

/// Weights of one LSTM layer, row-major with gate blocks `i, f, g, o`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerWeights {
    /// `[GATE_WIDTH, in_size]`
    pub w_ih: Vec<f32>,
    /// `[GATE_WIDTH, HIDDEN_SIZE]`
    pub w_hh: Vec<f32>,
    /// `[GATE_WIDTH]`
    pub b_ih: Vec<f32>,
    /// `[GATE_WIDTH]`
    pub b_hh: Vec<f32>,
}

impl LayerWeights {
    pub fn zeros(in_size: usize) -> Self {
        Self {
            w_ih: vec![0.0; GATE_WIDTH * in_size],
            w_hh: vec![0.0; GATE_WIDTH * HIDDEN_SIZE],
            b_ih: vec![0.0; GATE_WIDTH],
            b_hh: vec![0.0; GATE_WIDTH],
        }
    }

    fn validate(&self, layer: usize, in_size: usize) -> Result<(), SocError> {
        check_len(&format!("layer {layer} w_ih"), GATE_WIDTH * in_size, self.w_ih.len())?;
        check_len(
            &format!("layer {layer} w_hh"),
            GATE_WIDTH * HIDDEN_SIZE,
            self.w_hh.len(),
        )?;
        check_len(&format!("layer {layer} b_ih"), GATE_WIDTH, self.b_ih.len())?;
        check_len(&format!("layer {layer} b_hh"), GATE_WIDTH, self.b_hh.len())?;
        Ok(())
    }
}

/// Complete table set for the scaler, the LSTM stack and the output head
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelWeights {
    pub input_size: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub seq_len: usize,
    pub scaler_mean: Vec<f32>,
    pub scaler_scale: Vec<f32>,
    pub layers: Vec<LayerWeights>,
    pub fc_weight: Vec<f32>,
    pub fc_bias: f32,
}

impl ModelWeights {
    /// Correctly shaped all-zero tables with unit scaler scale
    ///
    /// With a zero head the sequence model outputs `sigmoid(fc_bias)` for any
    /// window.
    pub fn zeros() -> Self {
        Self {
            input_size: FEATURE_DIM,
            hidden_size: HIDDEN_SIZE,
            num_layers: NUM_LAYERS,
            seq_len: SEQ_LEN,
            scaler_mean: vec![0.0; FEATURE_DIM],
            scaler_scale: vec![1.0; FEATURE_DIM],
            layers: (0..NUM_LAYERS)
                .map(|l| LayerWeights::zeros(layer_input_size(l)))
                .collect(),
            fc_weight: vec![0.0; HIDDEN_SIZE],
            fc_bias: 0.0,
        }
    }

    /// Deterministic pseudo-random tables for demos and tests
    pub fn seeded(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let spread = 1.0 / (HIDDEN_SIZE as f32).sqrt();
        let mut draw = |n: usize| -> Vec<f32> {
            (0..n)
                .map(|_| {
                    let z: f32 = StandardNormal.sample(&mut rng);
                    z * spread
                })
                .collect()
        };

        let mut weights = Self::zeros();
        for (l, layer) in weights.layers.iter_mut().enumerate() {
            layer.w_ih = draw(GATE_WIDTH * layer_input_size(l));
            layer.w_hh = draw(GATE_WIDTH * HIDDEN_SIZE);
            layer.b_ih = draw(GATE_WIDTH);
            layer.b_hh = draw(GATE_WIDTH);
        }
        weights.fc_weight = draw(HIDDEN_SIZE);
        // Typical flow-cell operating point: ~1.8 V, tens of amps
        weights.scaler_mean = vec![-20.0, 1.8, 0.0, 100.0];
        weights.scaler_scale = vec![40.0, 0.2, 0.01, 150.0];
        weights
    }

    pub fn from_json_file(path: &Path) -> Result<Self, SocError> {
        let raw = fs::read_to_string(path)?;
        let weights: ModelWeights = serde_json::from_str(&raw)?;
        weights.validate()?;
        Ok(weights)
    }

    /// Check every shape field and table length against the compiled dimensions
    pub fn validate(&self) -> Result<(), SocError> {
        check_len("input_size", FEATURE_DIM, self.input_size)?;
        check_len("hidden_size", HIDDEN_SIZE, self.hidden_size)?;
        check_len("num_layers", NUM_LAYERS, self.num_layers)?;
        check_len("seq_len", SEQ_LEN, self.seq_len)?;
        check_len("scaler_mean", FEATURE_DIM, self.scaler_mean.len())?;
        check_len("scaler_scale", FEATURE_DIM, self.scaler_scale.len())?;
        check_len("layers", NUM_LAYERS, self.layers.len())?;
        for (l, layer) in self.layers.iter().enumerate() {
            layer.validate(l, layer_input_size(l))?;
        }
        check_len("fc_weight", HIDDEN_SIZE, self.fc_weight.len())?;
        Ok(())
    }
}

/// Input width of layer `l`: features for the first layer, hidden width above
pub fn layer_input_size(l: usize) -> usize {
    if l == 0 {
        FEATURE_DIM
    } else {
        HIDDEN_SIZE
    }
}

fn check_len(context: &str, expected: usize, got: usize) -> Result<(), SocError> {
    if expected != got {
        return Err(SocError::ShapeMismatch {
            context: context.to_string(),
            expected,
            got,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros_are_valid() {
        assert!(ModelWeights::zeros().validate().is_ok());
    }

    #[test]
    fn test_seeded_is_deterministic() {
        let a = ModelWeights::seeded(7);
        let b = ModelWeights::seeded(7);
        let c = ModelWeights::seeded(8);
        assert!(a.validate().is_ok());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_layer_shapes() {
        let w = ModelWeights::zeros();
        assert_eq!(w.layers[0].w_ih.len(), GATE_WIDTH * FEATURE_DIM);
        assert_eq!(w.layers[1].w_ih.len(), GATE_WIDTH * HIDDEN_SIZE);
    }

    #[test]
    fn test_truncated_table_is_rejected() {
        let mut w = ModelWeights::zeros();
        w.layers[1].w_hh.pop();
        match w.validate() {
            Err(SocError::ShapeMismatch {
                context,
                expected,
                got,
            }) => {
                assert_eq!(context, "layer 1 w_hh");
                assert_eq!(expected, GATE_WIDTH * HIDDEN_SIZE);
                assert_eq!(got, expected - 1);
            }
            other => panic!("expected shape mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_wrong_declared_dimension_is_rejected() {
        let w = ModelWeights {
            hidden_size: 32,
            ..ModelWeights::zeros()
        };
        assert!(matches!(w.validate(), Err(SocError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_json_file_loads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.json");
        let w = ModelWeights {
            fc_bias: 0.25,
            ..ModelWeights::zeros()
        };
        fs::write(&path, serde_json::to_string(&w).unwrap()).unwrap();
        assert_eq!(ModelWeights::from_json_file(&path).unwrap(), w);

        let mut short = w.clone();
        short.fc_weight.truncate(10);
        fs::write(&path, serde_json::to_string(&short).unwrap()).unwrap();
        assert!(matches!(
            ModelWeights::from_json_file(&path),
            Err(SocError::ShapeMismatch { .. })
        ));
    }
}
