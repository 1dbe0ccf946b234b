//! Training loop for the severity classifier.
//!
//! Plain minibatch SGD driven by [`Adam`], with a held-out validation
//! split, inverse-frequency class weighting, early stopping on validation
//! loss, and best-epoch checkpointing. Dense feature rows are expanded
//! from the bit-packed samples one minibatch at a time, so peak memory
//! stays proportional to the batch size rather than the dataset.

mod metrics;

pub use metrics::{accuracy, ConfusionMatrix};

use crate::checkpoint::{Checkpoint, CheckpointMetrics};
use crate::dataset::{Dataset, PairSample, SeverityLabel};
use crate::error::{FarmacoError, Result};
use crate::fingerprint::FingerprintConfig;
use crate::nn::{Adam, InteractionNet, NetConfig};
use crate::primitives::Matrix;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::PathBuf;
use tracing::info;

/// Training hyperparameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    /// Network shape; its input width must match the dataset.
    pub net: NetConfig,
    /// Maximum number of passes over the training split.
    pub epochs: usize,
    /// Minibatch size.
    pub batch_size: usize,
    /// Adam learning rate.
    pub learning_rate: f32,
    /// Epochs without validation improvement before stopping.
    pub patience: usize,
    /// Validation loss at or below this value counts as converged and
    /// ends training immediately. `None` disables the criterion.
    pub target_loss: Option<f32>,
    /// Fraction of the dataset held out for validation.
    pub test_size: f32,
    /// Seed for the split, weight init, shuffling, and dropout.
    pub seed: u64,
    /// When set, the best epoch's weights are checkpointed here.
    pub checkpoint_path: Option<PathBuf>,
    /// Fingerprint settings recorded in the checkpoint.
    pub fingerprint: FingerprintConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            net: NetConfig::default(),
            epochs: 50,
            batch_size: 128,
            learning_rate: 0.001,
            patience: 5,
            target_loss: None,
            test_size: 0.2,
            seed: 42,
            checkpoint_path: None,
            fingerprint: FingerprintConfig::default(),
        }
    }
}

impl TrainConfig {
    /// Validates the hyperparameters.
    ///
    /// # Errors
    ///
    /// Returns [`FarmacoError::InvalidHyperparameter`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<()> {
        self.net.validate()?;
        if self.epochs == 0 {
            return Err(FarmacoError::InvalidHyperparameter {
                param: "epochs".to_string(),
                value: "0".to_string(),
                constraint: "must be positive".to_string(),
            });
        }
        if self.batch_size == 0 {
            return Err(FarmacoError::InvalidHyperparameter {
                param: "batch_size".to_string(),
                value: "0".to_string(),
                constraint: "must be positive".to_string(),
            });
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(FarmacoError::InvalidHyperparameter {
                param: "learning_rate".to_string(),
                value: self.learning_rate.to_string(),
                constraint: "must be positive and finite".to_string(),
            });
        }
        if let Some(target) = self.target_loss {
            if !(target > 0.0 && target.is_finite()) {
                return Err(FarmacoError::InvalidHyperparameter {
                    param: "target_loss".to_string(),
                    value: target.to_string(),
                    constraint: "must be positive and finite".to_string(),
                });
            }
        }
        if !(0.0 < self.test_size && self.test_size < 1.0) {
            return Err(FarmacoError::InvalidHyperparameter {
                param: "test_size".to_string(),
                value: self.test_size.to_string(),
                constraint: "must be in (0, 1)".to_string(),
            });
        }
        Ok(())
    }
}

/// Per-epoch training history entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochStats {
    pub epoch: usize,
    pub train_loss: f32,
    pub val_loss: f32,
    pub val_accuracy: f32,
}

/// Why the training loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Validation loss reached the configured `target_loss`.
    Converged,
    /// Validation loss stopped improving for `patience` epochs.
    EarlyStopped,
    /// All configured epochs ran.
    MaxEpochsReached,
}

/// Outcome of a training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainReport {
    /// One entry per completed epoch.
    pub history: Vec<EpochStats>,
    /// Epoch whose weights the returned network carries.
    pub best_epoch: usize,
    pub best_val_loss: f32,
    pub best_val_accuracy: f32,
    pub outcome: StopReason,
}

/// Trains a classifier on `dataset`, returning the best-epoch network.
///
/// The dataset is split once (stratified), the network trains with
/// inverse-frequency class weights, and the weights returned are those of
/// the epoch with the lowest validation loss, not the last one. When
/// `checkpoint_path` is set, that best epoch is also persisted (written
/// atomically, each time the best improves).
///
/// # Errors
///
/// Returns an error for invalid hyperparameters, a dataset whose feature
/// width does not match the network, a split that empties a partition, or
/// checkpoint I/O failures.
pub fn train(dataset: &Dataset, config: &TrainConfig) -> Result<(InteractionNet, TrainReport)> {
    config.validate()?;
    if dataset.feature_width() != config.net.input_dim {
        return Err(FarmacoError::DimensionMismatch {
            expected: format!("{} input features", config.net.input_dim),
            actual: format!("{}-wide feature rows", dataset.feature_width()),
        });
    }

    let (train_split, val_split) = dataset.stratified_split(config.test_size, config.seed)?;
    let class_weights = inverse_frequency_weights(&train_split);
    info!(
        train = train_split.len(),
        val = val_split.len(),
        ?class_weights,
        "training split ready"
    );

    let mut net = InteractionNet::new(&config.net, Some(config.seed))?;
    let n_buffers = net.params_mut().len();
    let mut optimizers: Vec<Adam> = (0..n_buffers)
        .map(|_| Adam::new(config.learning_rate))
        .collect();
    let mut rng = StdRng::seed_from_u64(config.seed);

    let width = dataset.feature_width();
    let samples = train_split.samples();
    let mut indices: Vec<usize> = (0..samples.len()).collect();

    let mut history = Vec::with_capacity(config.epochs);
    let mut best_params = net.to_flat();
    let mut best_epoch = 0usize;
    let mut best_val_loss = f32::INFINITY;
    let mut best_val_accuracy = 0.0f32;
    let mut stale_epochs = 0usize;
    let mut outcome = StopReason::MaxEpochsReached;

    for epoch in 0..config.epochs {
        indices.shuffle(&mut rng);

        let mut epoch_loss = 0.0f32;
        let mut seen = 0usize;
        for batch in indices.chunks(config.batch_size) {
            let (x, targets) = expand_batch(samples, batch, width);
            let cache = net.forward_train(&x, &mut rng)?;
            let (loss, grads) = net.backward(&cache, &targets, &class_weights)?;
            epoch_loss += loss * batch.len() as f32;
            seen += batch.len();

            let grads_flat: Vec<&[f32]> = grads
                .iter()
                .flat_map(|g| [g.weights.as_slice(), g.bias.as_slice()])
                .collect();
            let mut params = net.params_mut();
            for ((buf, grad), opt) in params.iter_mut().zip(&grads_flat).zip(&mut optimizers) {
                opt.step(buf, grad)?;
            }
        }
        let train_loss = epoch_loss / seen as f32;

        let (val_loss, val_accuracy) =
            evaluate(&net, val_split.samples(), config.batch_size)?;
        history.push(EpochStats {
            epoch,
            train_loss,
            val_loss,
            val_accuracy,
        });
        info!(epoch, train_loss, val_loss, val_accuracy, "epoch complete");

        if val_loss < best_val_loss {
            best_val_loss = val_loss;
            best_val_accuracy = val_accuracy;
            best_epoch = epoch;
            best_params = net.to_flat();
            stale_epochs = 0;
            if let Some(path) = &config.checkpoint_path {
                let metrics = CheckpointMetrics {
                    val_loss,
                    val_accuracy,
                    epoch,
                };
                Checkpoint::of(&net, &config.fingerprint, metrics).save(path)?;
            }
        } else {
            stale_epochs += 1;
            if stale_epochs >= config.patience {
                info!(epoch, best_epoch, "early stopping: patience exhausted");
                outcome = StopReason::EarlyStopped;
                break;
            }
        }

        if let Some(target) = config.target_loss {
            if val_loss <= target {
                info!(epoch, val_loss, target, "validation loss reached target");
                outcome = StopReason::Converged;
                break;
            }
        }
    }

    let best_net = InteractionNet::from_flat(&net.dims(), net.dropout(), &best_params)?;
    Ok((
        best_net,
        TrainReport {
            history,
            best_epoch,
            best_val_loss,
            best_val_accuracy,
            outcome,
        },
    ))
}

/// Loss and accuracy of `net` over `samples`, unweighted.
///
/// # Errors
///
/// Returns an error if the feature width does not match the network.
pub fn evaluate(
    net: &InteractionNet,
    samples: &[PairSample],
    batch_size: usize,
) -> Result<(f32, f32)> {
    if samples.is_empty() {
        return Ok((0.0, 0.0));
    }
    let width = samples[0].feature_width();
    let all: Vec<usize> = (0..samples.len()).collect();
    let mut total_loss = 0.0f32;
    let mut predictions = Vec::with_capacity(samples.len());
    let mut targets = Vec::with_capacity(samples.len());

    for batch in all.chunks(batch_size.max(1)) {
        let (x, batch_targets) = expand_batch(samples, batch, width);
        let probs = net.predict_proba(&x)?;
        for (i, &target) in batch_targets.iter().enumerate() {
            total_loss -= probs.get(i, target).max(1e-12).ln();
            predictions.push(argmax_row(probs.row(i)));
            targets.push(target);
        }
    }
    Ok((
        total_loss / samples.len() as f32,
        accuracy(&predictions, &targets),
    ))
}

/// Inverse-frequency class weights over a training split.
///
/// `w_c = n / (k * count_c)`, with absent classes pinned to zero weight.
#[must_use]
pub fn inverse_frequency_weights(dataset: &Dataset) -> Vec<f32> {
    let counts = dataset.label_counts();
    let n = dataset.len() as f32;
    let k = SeverityLabel::ALL.len() as f32;
    counts
        .iter()
        .map(|&count| {
            if count == 0 {
                0.0
            } else {
                n / (k * count as f32)
            }
        })
        .collect()
}

fn expand_batch(samples: &[PairSample], indices: &[usize], width: usize) -> (Matrix, Vec<usize>) {
    let mut x = Matrix::zeros(indices.len(), width);
    let mut targets = Vec::with_capacity(indices.len());
    for (row, &idx) in indices.iter().enumerate() {
        samples[idx].write_dense(x.row_mut(row));
        targets.push(samples[idx].label.class_index());
    }
    (x, targets)
}

fn argmax_row(row: &[f32]) -> usize {
    let mut best = 0;
    for (i, &value) in row.iter().enumerate() {
        if value > row[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
#[path = "train_tests.rs"]
mod tests;
