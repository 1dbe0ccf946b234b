//! Feed-forward interaction classifier.
//!
//! A fully connected `ReLU` network over concatenated fingerprint pairs,
//! with inverted dropout during training and a softmax head. Forward,
//! loss, and gradients are written out explicitly against [`Matrix`]; no
//! tape or graph is involved, which keeps checkpointed state to plain
//! weight buffers.

use crate::error::{FarmacoError, Result};
use crate::nn::init::kaiming_uniform;
use crate::primitives::Matrix;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Network shape and regularization settings.
///
/// The default matches the shipped classifier: two 2048-bit fingerprints
/// concatenated into 4096 inputs, three hidden layers, three severity
/// classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetConfig {
    /// Width of the concatenated input row.
    pub input_dim: usize,
    /// Hidden layer widths, in order.
    pub hidden_dims: Vec<usize>,
    /// Number of output classes.
    pub n_classes: usize,
    /// Dropout probability applied after each hidden activation.
    pub dropout: f32,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            input_dim: 4096,
            hidden_dims: vec![512, 256, 128],
            n_classes: 3,
            dropout: 0.3,
        }
    }
}

impl NetConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FarmacoError::InvalidHyperparameter`] for zero dimensions
    /// or a dropout outside `[0, 1)`.
    pub fn validate(&self) -> Result<()> {
        if self.input_dim == 0 {
            return Err(FarmacoError::InvalidHyperparameter {
                param: "input_dim".to_string(),
                value: "0".to_string(),
                constraint: "must be positive".to_string(),
            });
        }
        if self.n_classes < 2 {
            return Err(FarmacoError::InvalidHyperparameter {
                param: "n_classes".to_string(),
                value: self.n_classes.to_string(),
                constraint: "must be at least 2".to_string(),
            });
        }
        if self.hidden_dims.iter().any(|&d| d == 0) {
            return Err(FarmacoError::InvalidHyperparameter {
                param: "hidden_dims".to_string(),
                value: format!("{:?}", self.hidden_dims),
                constraint: "widths must be positive".to_string(),
            });
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(FarmacoError::InvalidHyperparameter {
                param: "dropout".to_string(),
                value: self.dropout.to_string(),
                constraint: "must be in [0, 1)".to_string(),
            });
        }
        Ok(())
    }

    /// Full layer width sequence: input, hidden layers, output.
    #[must_use]
    pub fn dims(&self) -> Vec<usize> {
        let mut dims = Vec::with_capacity(self.hidden_dims.len() + 2);
        dims.push(self.input_dim);
        dims.extend_from_slice(&self.hidden_dims);
        dims.push(self.n_classes);
        dims
    }
}

/// One fully connected layer: weights are `[out, in]` row-major, one bias
/// per output unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dense {
    weights: Matrix,
    bias: Vec<f32>,
}

impl Dense {
    fn new(in_dim: usize, out_dim: usize, seed: Option<u64>) -> Self {
        Self {
            weights: kaiming_uniform(out_dim, in_dim, in_dim, seed),
            bias: vec![0.0; out_dim],
        }
    }

    fn in_dim(&self) -> usize {
        self.weights.n_cols()
    }

    fn out_dim(&self) -> usize {
        self.weights.n_rows()
    }

    /// y = x · Wᵀ + b for a batch `x` of shape `[n, in]`.
    fn affine(&self, x: &Matrix) -> Result<Matrix> {
        let (n, in_dim) = x.shape();
        if in_dim != self.in_dim() {
            return Err(FarmacoError::DimensionMismatch {
                expected: format!("{} input features", self.in_dim()),
                actual: format!("{in_dim} columns"),
            });
        }
        let mut out = Matrix::zeros(n, self.out_dim());
        for i in 0..n {
            let x_row = x.row(i);
            let out_row = out.row_mut(i);
            for (j, out_val) in out_row.iter_mut().enumerate() {
                let w_row = self.weights.row(j);
                let mut acc = self.bias[j];
                for (xv, wv) in x_row.iter().zip(w_row) {
                    acc += xv * wv;
                }
                *out_val = acc;
            }
        }
        Ok(out)
    }
}

/// Per-layer gradients, in the same order as [`InteractionNet::params_mut`].
#[derive(Debug, Clone)]
pub struct LayerGrad {
    pub weights: Matrix,
    pub bias: Vec<f32>,
}

/// Intermediate state kept by a training forward pass for backprop.
#[derive(Debug)]
pub struct ForwardCache {
    /// Input to each layer.
    inputs: Vec<Matrix>,
    /// d(activation)/d(pre-activation) for each hidden layer: the dropout
    /// scale where the unit fired, zero elsewhere.
    masks: Vec<Matrix>,
    /// Raw output of the final layer.
    logits: Matrix,
}

impl ForwardCache {
    /// Raw output of the final layer.
    #[must_use]
    pub fn logits(&self) -> &Matrix {
        &self.logits
    }
}

/// Multi-layer perceptron scoring drug-pair severity.
///
/// # Examples
///
/// ```
/// use farmaco::nn::{InteractionNet, NetConfig};
/// use farmaco::primitives::Matrix;
///
/// let config = NetConfig {
///     input_dim: 8,
///     hidden_dims: vec![4],
///     n_classes: 3,
///     dropout: 0.0,
/// };
/// let net = InteractionNet::new(&config, Some(42)).expect("valid config");
/// let x = Matrix::zeros(2, 8);
/// let probs = net.predict_proba(&x).expect("matching width");
/// assert_eq!(probs.shape(), (2, 3));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionNet {
    layers: Vec<Dense>,
    dropout: f32,
}

impl InteractionNet {
    /// Builds a freshly initialized network.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &NetConfig, seed: Option<u64>) -> Result<Self> {
        config.validate()?;
        let dims = config.dims();
        let layers = dims
            .windows(2)
            .enumerate()
            .map(|(i, pair)| {
                // Distinct stream per layer so widths do not alias draws.
                let layer_seed = seed.map(|s| s.wrapping_add(i as u64));
                Dense::new(pair[0], pair[1], layer_seed)
            })
            .collect();
        Ok(Self {
            layers,
            dropout: config.dropout,
        })
    }

    /// Layer width sequence, input first.
    #[must_use]
    pub fn dims(&self) -> Vec<usize> {
        let mut dims = Vec::with_capacity(self.layers.len() + 1);
        dims.push(self.layers[0].in_dim());
        for layer in &self.layers {
            dims.push(layer.out_dim());
        }
        dims
    }

    /// Width of one input row.
    #[must_use]
    pub fn input_dim(&self) -> usize {
        self.layers[0].in_dim()
    }

    /// Number of output classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.layers[self.layers.len() - 1].out_dim()
    }

    /// Dropout probability used during training passes.
    #[must_use]
    pub fn dropout(&self) -> f32 {
        self.dropout
    }

    /// Mutable views over every parameter buffer, layer by layer, weights
    /// before bias. Gradient order from [`backward`](Self::backward)
    /// matches.
    pub fn params_mut(&mut self) -> Vec<&mut [f32]> {
        self.layers
            .iter_mut()
            .flat_map(|layer| [layer.weights.as_mut_slice(), layer.bias.as_mut_slice()])
            .collect()
    }

    /// All parameters flattened into one buffer, in
    /// [`params_mut`](Self::params_mut) order.
    #[must_use]
    pub fn to_flat(&self) -> Vec<f32> {
        let mut flat = Vec::new();
        for layer in &self.layers {
            flat.extend_from_slice(layer.weights.as_slice());
            flat.extend_from_slice(&layer.bias);
        }
        flat
    }

    /// Rebuilds a network from a width sequence and a flat parameter
    /// buffer produced by [`to_flat`](Self::to_flat).
    ///
    /// # Errors
    ///
    /// Returns an error if the sequence is too short or the buffer length
    /// does not match the implied parameter count.
    pub fn from_flat(dims: &[usize], dropout: f32, flat: &[f32]) -> Result<Self> {
        if dims.len() < 2 {
            return Err(FarmacoError::InvalidHyperparameter {
                param: "dims".to_string(),
                value: format!("{dims:?}"),
                constraint: "need at least input and output widths".to_string(),
            });
        }
        if !(0.0..1.0).contains(&dropout) {
            return Err(FarmacoError::InvalidHyperparameter {
                param: "dropout".to_string(),
                value: dropout.to_string(),
                constraint: "must be in [0, 1)".to_string(),
            });
        }
        let expected: usize = dims.windows(2).map(|p| p[0] * p[1] + p[1]).sum();
        if flat.len() != expected {
            return Err(FarmacoError::DimensionMismatch {
                expected: format!("{expected} parameters"),
                actual: format!("{} parameters", flat.len()),
            });
        }

        let mut layers = Vec::with_capacity(dims.len() - 1);
        let mut offset = 0;
        for pair in dims.windows(2) {
            let (in_dim, out_dim) = (pair[0], pair[1]);
            let n_weights = in_dim * out_dim;
            let weights =
                Matrix::from_vec(out_dim, in_dim, flat[offset..offset + n_weights].to_vec())?;
            offset += n_weights;
            let bias = flat[offset..offset + out_dim].to_vec();
            offset += out_dim;
            layers.push(Dense { weights, bias });
        }
        Ok(Self { layers, dropout })
    }

    /// Inference pass: no dropout, softmax probabilities per row.
    ///
    /// # Errors
    ///
    /// Returns an error if the input width does not match the network.
    pub fn predict_proba(&self, x: &Matrix) -> Result<Matrix> {
        let mut a = x.clone();
        let last = self.layers.len() - 1;
        for (i, layer) in self.layers.iter().enumerate() {
            let mut z = layer.affine(&a)?;
            if i < last {
                for value in z.as_mut_slice() {
                    if *value < 0.0 {
                        *value = 0.0;
                    }
                }
            }
            a = z;
        }
        softmax_rows(&mut a);
        Ok(a)
    }

    /// Training pass with inverted dropout, keeping what backprop needs.
    ///
    /// # Errors
    ///
    /// Returns an error if the input width does not match the network.
    pub fn forward_train(&self, x: &Matrix, rng: &mut StdRng) -> Result<ForwardCache> {
        let keep_scale = if self.dropout > 0.0 {
            1.0 / (1.0 - self.dropout)
        } else {
            1.0
        };
        let last = self.layers.len() - 1;
        let mut inputs = Vec::with_capacity(self.layers.len());
        let mut masks = Vec::with_capacity(last);
        let mut a = x.clone();

        for (i, layer) in self.layers.iter().enumerate() {
            inputs.push(a.clone());
            let mut z = layer.affine(&a)?;
            if i == last {
                return Ok(ForwardCache {
                    inputs,
                    masks,
                    logits: z,
                });
            }
            let (rows, cols) = z.shape();
            let mut mask = Matrix::zeros(rows, cols);
            for (zv, mv) in z.as_mut_slice().iter_mut().zip(mask.as_mut_slice()) {
                if *zv > 0.0 {
                    let keep = self.dropout == 0.0 || rng.gen::<f32>() >= self.dropout;
                    if keep {
                        *mv = keep_scale;
                    }
                }
                *zv *= *mv;
            }
            masks.push(mask);
            a = z;
        }
        unreachable!("loop returns on the final layer")
    }

    /// Class-weighted cross-entropy loss and parameter gradients.
    ///
    /// `targets` holds one class index per batch row; `class_weights` is
    /// indexed by class. The loss is the weighted mean over the batch, so
    /// gradients are scaled by each row's weight over the batch's total
    /// weight.
    ///
    /// # Errors
    ///
    /// Returns an error if `targets` does not match the batch size or
    /// names a class outside the network's range.
    pub fn backward(
        &self,
        cache: &ForwardCache,
        targets: &[usize],
        class_weights: &[f32],
    ) -> Result<(f32, Vec<LayerGrad>)> {
        let (n, n_classes) = cache.logits.shape();
        if targets.len() != n {
            return Err(FarmacoError::DimensionMismatch {
                expected: format!("{n} targets"),
                actual: format!("{} targets", targets.len()),
            });
        }
        if class_weights.len() != n_classes {
            return Err(FarmacoError::DimensionMismatch {
                expected: format!("{n_classes} class weights"),
                actual: format!("{} class weights", class_weights.len()),
            });
        }
        if let Some(&bad) = targets.iter().find(|&&t| t >= n_classes) {
            return Err(FarmacoError::Other(format!(
                "target class {bad} out of range for {n_classes} classes"
            )));
        }

        let mut probs = cache.logits.clone();
        softmax_rows(&mut probs);

        let total_weight: f32 = targets.iter().map(|&t| class_weights[t]).sum();
        if total_weight <= 0.0 {
            return Err(FarmacoError::Other(
                "class weights sum to zero over the batch".to_string(),
            ));
        }

        // Weighted mean NLL, and dL/dlogits in place.
        let mut loss = 0.0f32;
        let mut delta = probs;
        for (i, &target) in targets.iter().enumerate() {
            let w = class_weights[target];
            let row = delta.row_mut(i);
            loss -= w * row[target].max(1e-12).ln();
            row[target] -= 1.0;
            for value in row.iter_mut() {
                *value *= w / total_weight;
            }
        }
        loss /= total_weight;

        let mut grads: Vec<LayerGrad> = Vec::with_capacity(self.layers.len());
        for (l, layer) in self.layers.iter().enumerate().rev() {
            let input = &cache.inputs[l];
            let (out_dim, in_dim) = (layer.out_dim(), layer.in_dim());

            let mut d_weights = Matrix::zeros(out_dim, in_dim);
            let mut d_bias = vec![0.0f32; out_dim];
            for i in 0..n {
                let d_row = delta.row(i);
                let x_row = input.row(i);
                for (j, &dv) in d_row.iter().enumerate() {
                    if dv == 0.0 {
                        continue;
                    }
                    d_bias[j] += dv;
                    let w_row = d_weights.row_mut(j);
                    for (wv, xv) in w_row.iter_mut().zip(x_row) {
                        *wv += dv * xv;
                    }
                }
            }
            grads.push(LayerGrad {
                weights: d_weights,
                bias: d_bias,
            });

            if l > 0 {
                // d_input = delta · W, gated by the saved activation mask.
                let mask = &cache.masks[l - 1];
                let mut d_input = Matrix::zeros(n, in_dim);
                for i in 0..n {
                    let d_row = delta.row(i);
                    for (j, &dv) in d_row.iter().enumerate() {
                        if dv == 0.0 {
                            continue;
                        }
                        let w_row = layer.weights.row(j);
                        let out_row = d_input.row_mut(i);
                        for (ov, wv) in out_row.iter_mut().zip(w_row) {
                            *ov += dv * wv;
                        }
                    }
                    let m_row = mask.row(i);
                    let out_row = d_input.row_mut(i);
                    for (ov, mv) in out_row.iter_mut().zip(m_row) {
                        *ov *= mv;
                    }
                }
                delta = d_input;
            }
        }
        grads.reverse();
        Ok((loss, grads))
    }
}

/// In-place row softmax via the log-sum-exp shift.
pub(crate) fn softmax_rows(m: &mut Matrix) {
    let rows = m.n_rows();
    for i in 0..rows {
        let row = m.row_mut(i);
        let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mut sum = 0.0f32;
        for value in row.iter_mut() {
            *value = (*value - max).exp();
            sum += *value;
        }
        for value in row.iter_mut() {
            *value /= sum;
        }
    }
}

#[cfg(test)]
#[path = "network_tests.rs"]
mod tests;
