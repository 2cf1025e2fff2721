//! Stacked LSTM sequence model
//!
//! Each call to [`SequenceModel::forward`] starts from zero hidden and cell
//! state and unrolls every layer across the window, so the only state
//! carried between samples is the window itself.

use crate::weights::{layer_input_size, LayerWeights, ModelWeights};
use crate::{sigmoid, Feature, GATE_WIDTH, HIDDEN_SIZE, NUM_LAYERS, SEQ_LEN};

/// One LSTM layer
#[derive(Debug, Clone)]
pub struct LstmCell {
    in_size: usize,
    /// `[GATE_WIDTH, in_size]`
    w_ih: Box<[f32]>,
    /// `[GATE_WIDTH, HIDDEN_SIZE]`
    w_hh: Box<[f32]>,
    b_ih: Box<[f32]>,
    b_hh: Box<[f32]>,
}

impl LstmCell {
    /// Bind a layer; lengths must already have been validated
    pub fn new(in_size: usize, weights: LayerWeights) -> Self {
        Self {
            in_size,
            w_ih: weights.w_ih.into_boxed_slice(),
            w_hh: weights.w_hh.into_boxed_slice(),
            b_ih: weights.b_ih.into_boxed_slice(),
            b_hh: weights.b_hh.into_boxed_slice(),
        }
    }

    /// Advance `h` and `c` by one time step with input `x`
    pub fn step(&self, x: &[f32], h: &mut [f32; HIDDEN_SIZE], c: &mut [f32; HIDDEN_SIZE]) {
        let mut gates = [0.0f32; GATE_WIDTH];

        for (g, gate) in gates.iter_mut().enumerate() {
            let w = &self.w_ih[g * self.in_size..(g + 1) * self.in_size];
            let mut sum = self.b_ih[g];
            for (wj, xj) in w.iter().zip(x) {
                sum += wj * xj;
            }
            *gate = sum;
        }

        for (g, gate) in gates.iter_mut().enumerate() {
            let w = &self.w_hh[g * HIDDEN_SIZE..(g + 1) * HIDDEN_SIZE];
            let mut sum = self.b_hh[g];
            for (wj, hj) in w.iter().zip(h.iter()) {
                sum += wj * hj;
            }
            *gate += sum;
        }

        let (i_gate, rest) = gates.split_at(HIDDEN_SIZE);
        let (f_gate, rest) = rest.split_at(HIDDEN_SIZE);
        let (g_gate, o_gate) = rest.split_at(HIDDEN_SIZE);

        for k in 0..HIDDEN_SIZE {
            let i_t = sigmoid(i_gate[k]);
            let f_t = sigmoid(f_gate[k]);
            let g_t = g_gate[k].tanh();
            let o_t = sigmoid(o_gate[k]);

            c[k] = f_t * c[k] + i_t * g_t;
            h[k] = o_t * c[k].tanh();
        }
    }
}

/// LSTM stack plus a linear + sigmoid head
#[derive(Debug, Clone)]
pub struct SequenceModel {
    layers: Vec<LstmCell>,
    fc_weight: [f32; HIDDEN_SIZE],
    fc_bias: f32,
}

impl SequenceModel {
    /// Bind validated weight tables
    pub fn from_weights(weights: ModelWeights) -> Self {
        let layers = weights
            .layers
            .into_iter()
            .enumerate()
            .map(|(l, w)| LstmCell::new(layer_input_size(l), w))
            .collect();

        let mut fc_weight = [0.0; HIDDEN_SIZE];
        fc_weight.copy_from_slice(&weights.fc_weight);

        Self {
            layers,
            fc_weight,
            fc_bias: weights.fc_bias,
        }
    }

    /// Score a chronologically ordered window; result lies in (0, 1)
    pub fn forward(&self, seq: &[Feature; SEQ_LEN]) -> f32 {
        let mut h = [[0.0f32; HIDDEN_SIZE]; NUM_LAYERS];
        let mut c = [[0.0f32; HIDDEN_SIZE]; NUM_LAYERS];

        for x in seq.iter() {
            for (l, cell) in self.layers.iter().enumerate() {
                if l == 0 {
                    cell.step(x, &mut h[0], &mut c[0]);
                } else {
                    let (below, above) = h.split_at_mut(l);
                    cell.step(&below[l - 1], &mut above[0], &mut c[l]);
                }
            }
        }

        let top = &h[NUM_LAYERS - 1];
        let mut sum = self.fc_bias;
        for (w, hj) in self.fc_weight.iter().zip(top) {
            sum += w * hj;
        }
        sigmoid(sum)
    }
}
