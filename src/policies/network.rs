//! Minimal forward-only network blocks.
//!
//! Evaluation never trains, so these carry no gradients: just weights,
//! biases and a forward pass. Parameters are serialized as JSON and shape
//! checked against the configured dimensions at load time, which turns a
//! mismatched checkpoint into a clear error instead of garbage values.

use serde::{Deserialize, Serialize};

/// Fully connected layer. Weights are stored row-major, one row per
/// output unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Linear {
    pub weight: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

impl Linear {
    pub fn zeros(in_dim: usize, out_dim: usize) -> Self {
        Linear {
            weight: vec![vec![0.0; in_dim]; out_dim],
            bias: vec![0.0; out_dim],
        }
    }

    pub fn out_dim(&self) -> usize {
        self.weight.len()
    }

    pub fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weight
            .iter()
            .zip(&self.bias)
            .map(|(row, bias)| {
                row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + bias
            })
            .collect()
    }

    /// Confirms the layer maps `expected_in` inputs; returns its width.
    pub fn check(&self, expected_in: usize) -> Result<usize, String> {
        if self.weight.is_empty() {
            return Err("layer has no output units".into());
        }
        for (index, row) in self.weight.iter().enumerate() {
            if row.len() != expected_in {
                return Err(format!(
                    "row {index} expects {} inputs, layer was given {expected_in}",
                    row.len()
                ));
            }
        }
        if self.bias.len() != self.weight.len() {
            return Err(format!(
                "bias has {} entries for {} output units",
                self.bias.len(),
                self.weight.len()
            ));
        }
        Ok(self.out_dim())
    }
}

/// Stack of linear layers with ReLU between them. The final layer stays
/// linear so the stack can be used as a value head.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mlp {
    pub layers: Vec<Linear>,
}

impl Mlp {
    /// Builds a zeroed network mapping `in_dim` through each width in
    /// `dims`.
    pub fn zeros(in_dim: usize, dims: &[usize]) -> Self {
        let mut layers = Vec::with_capacity(dims.len());
        let mut prev = in_dim;
        for &width in dims {
            layers.push(Linear::zeros(prev, width));
            prev = width;
        }
        Mlp { layers }
    }

    pub fn out_dim(&self) -> usize {
        self.layers.last().map_or(0, Linear::out_dim)
    }

    pub fn forward(&self, input: &[f64]) -> Vec<f64> {
        let mut activations = input.to_vec();
        let last = self.layers.len().saturating_sub(1);
        for (index, layer) in self.layers.iter().enumerate() {
            activations = layer.forward(&activations);
            if index != last {
                relu(&mut activations);
            }
        }
        activations
    }

    /// Scalar head: the first output of the forward pass.
    pub fn value(&self, input: &[f64]) -> f64 {
        self.forward(input).first().copied().unwrap_or(0.0)
    }

    /// Confirms the stack maps `expected_in` inputs through exactly the
    /// widths in `dims`.
    pub fn check(&self, expected_in: usize, dims: &[usize]) -> Result<(), String> {
        if self.layers.len() != dims.len() {
            return Err(format!(
                "network has {} layers, config lists {}",
                self.layers.len(),
                dims.len()
            ));
        }
        let mut prev = expected_in;
        for (index, (layer, &width)) in self.layers.iter().zip(dims).enumerate() {
            let out = layer
                .check(prev)
                .map_err(|reason| format!("layer {index}: {reason}"))?;
            if out != width {
                return Err(format!(
                    "layer {index} is {out} wide, config says {width}"
                ));
            }
            prev = out;
        }
        Ok(())
    }
}

/// Single LSTM cell with gates in input, forget, cell, output order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstmCell {
    pub w_ih: Vec<Vec<f64>>,
    pub w_hh: Vec<Vec<f64>>,
    pub b_ih: Vec<f64>,
    pub b_hh: Vec<f64>,
}

impl LstmCell {
    pub fn zeros(in_dim: usize, hidden_dim: usize) -> Self {
        LstmCell {
            w_ih: vec![vec![0.0; in_dim]; 4 * hidden_dim],
            w_hh: vec![vec![0.0; hidden_dim]; 4 * hidden_dim],
            b_ih: vec![0.0; 4 * hidden_dim],
            b_hh: vec![0.0; 4 * hidden_dim],
        }
    }

    pub fn hidden_dim(&self) -> usize {
        self.w_hh.len() / 4
    }

    /// One recurrence step; returns the next hidden and cell states.
    pub fn step(&self, input: &[f64], hidden: &[f64], cell: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let hidden_dim = self.hidden_dim();
        let mut gates = vec![0.0; 4 * hidden_dim];
        for (g, gate) in gates.iter_mut().enumerate() {
            let from_input: f64 = self.w_ih[g].iter().zip(input).map(|(w, x)| w * x).sum();
            let from_hidden: f64 = self.w_hh[g].iter().zip(hidden).map(|(w, h)| w * h).sum();
            *gate = from_input + from_hidden + self.b_ih[g] + self.b_hh[g];
        }

        let mut next_hidden = vec![0.0; hidden_dim];
        let mut next_cell = vec![0.0; hidden_dim];
        for unit in 0..hidden_dim {
            let input_gate = sigmoid(gates[unit]);
            let forget_gate = sigmoid(gates[hidden_dim + unit]);
            let candidate = gates[2 * hidden_dim + unit].tanh();
            let output_gate = sigmoid(gates[3 * hidden_dim + unit]);
            next_cell[unit] = forget_gate * cell[unit] + input_gate * candidate;
            next_hidden[unit] = output_gate * next_cell[unit].tanh();
        }
        (next_hidden, next_cell)
    }

    pub fn check(&self, expected_in: usize, hidden_dim: usize) -> Result<(), String> {
        let rows = 4 * hidden_dim;
        if self.w_ih.len() != rows || self.w_hh.len() != rows {
            return Err(format!(
                "gate matrices have {}/{} rows, expected {rows}",
                self.w_ih.len(),
                self.w_hh.len()
            ));
        }
        if self.w_ih.iter().any(|row| row.len() != expected_in) {
            return Err(format!("input weights do not match {expected_in} inputs"));
        }
        if self.w_hh.iter().any(|row| row.len() != hidden_dim) {
            return Err(format!("hidden weights do not match width {hidden_dim}"));
        }
        if self.b_ih.len() != rows || self.b_hh.len() != rows {
            return Err("gate biases have the wrong length".into());
        }
        Ok(())
    }
}

pub fn relu(values: &mut [f64]) {
    for v in values {
        if *v < 0.0 {
            *v = 0.0;
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Numerically stable softmax.
pub fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    if total <= 0.0 {
        return vec![1.0 / scores.len().max(1) as f64; scores.len()];
    }
    exps.into_iter().map(|e| e / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_forward_matches_hand_computation() {
        let layer = Linear {
            weight: vec![vec![1.0, 2.0], vec![-1.0, 0.5]],
            bias: vec![0.5, 0.0],
        };
        let out = layer.forward(&[3.0, 1.0]);
        assert!((out[0] - 5.5).abs() < 1e-12);
        assert!((out[1] - -2.5).abs() < 1e-12);
    }

    #[test]
    fn mlp_applies_relu_between_layers_only() {
        let mlp = Mlp {
            layers: vec![
                Linear {
                    weight: vec![vec![1.0]],
                    bias: vec![-2.0],
                },
                Linear {
                    weight: vec![vec![1.0]],
                    bias: vec![-3.0],
                },
            ],
        };
        // First layer outputs -1, clipped to 0; final layer stays linear.
        assert!((mlp.value(&[1.0]) - -3.0).abs() < 1e-12);
    }

    #[test]
    fn zeroed_mlp_has_the_requested_shape() {
        let mlp = Mlp::zeros(13, &[150, 100, 100, 1]);
        assert!(mlp.check(13, &[150, 100, 100, 1]).is_ok());
        assert_eq!(mlp.out_dim(), 1);
        assert_eq!(mlp.value(&vec![1.0; 13]), 0.0);
    }

    #[test]
    fn shape_checks_reject_mismatches() {
        let mlp = Mlp::zeros(13, &[150, 100, 100, 1]);
        assert!(mlp.check(12, &[150, 100, 100, 1]).is_err());
        assert!(mlp.check(13, &[150, 100, 1]).is_err());
        assert!(mlp.check(13, &[150, 100, 50, 1]).is_err());

        let cell = LstmCell::zeros(7, 50);
        assert!(cell.check(7, 50).is_ok());
        assert!(cell.check(8, 50).is_err());
        assert!(cell.check(7, 40).is_err());
    }

    #[test]
    fn zeroed_lstm_stays_at_rest() {
        let cell = LstmCell::zeros(7, 4);
        let (h, c) = cell.step(&vec![1.0; 7], &vec![0.0; 4], &vec![0.0; 4]);
        assert!(h.iter().all(|v| v.abs() < 1e-12));
        assert!(c.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn weights_round_trip_through_json() {
        let mlp = Mlp::zeros(6, &[4, 1]);
        let json = serde_json::to_string(&mlp).unwrap();
        let back: Mlp = serde_json::from_str(&json).unwrap();
        assert!(back.check(6, &[4, 1]).is_ok());
    }

    #[test]
    fn softmax_is_a_distribution() {
        let weights = softmax(&[1.0, 2.0, 3.0]);
        let total: f64 = weights.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(weights[2] > weights[1] && weights[1] > weights[0]);
    }
}
