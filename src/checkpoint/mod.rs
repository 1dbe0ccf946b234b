//! Self-describing model checkpoints.
//!
//! A checkpoint carries everything inference needs to reproduce the
//! training-time feature space: the fingerprint settings and algorithm
//! version, the severity rule version, the label set, the layer widths,
//! and the flat parameter buffer. Loading validates all of it against the
//! running binary, so a checkpoint trained under different encoding rules
//! fails loudly instead of producing silently wrong scores.

use crate::dataset::{SeverityLabel, SEVERITY_RULES_VERSION};
use crate::error::{FarmacoError, Result};
use crate::fingerprint::{FingerprintConfig, FINGERPRINT_ALGO_VERSION};
use crate::nn::InteractionNet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Version of the checkpoint file layout itself.
pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;

/// Fingerprint settings snapshot embedded in a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintStamp {
    pub radius: u32,
    pub n_bits: usize,
    pub algo_version: u32,
}

impl FingerprintStamp {
    #[must_use]
    pub fn of(config: &FingerprintConfig) -> Self {
        Self {
            radius: config.radius,
            n_bits: config.n_bits,
            algo_version: FINGERPRINT_ALGO_VERSION,
        }
    }
}

/// Validation metrics recorded when the checkpoint was written.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetrics {
    /// Validation loss at the saved epoch.
    pub val_loss: f32,
    /// Validation accuracy at the saved epoch.
    pub val_accuracy: f32,
    /// Epoch index (zero-based) the weights come from.
    pub epoch: usize,
}

/// Serialized model state plus the provenance needed to trust it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub format_version: u32,
    pub fingerprint: FingerprintStamp,
    pub severity_rules_version: u32,
    /// Class names in index order.
    pub labels: Vec<String>,
    /// Layer width sequence, input first.
    pub dims: Vec<usize>,
    pub dropout: f32,
    /// All parameters, layer by layer, weights before bias.
    pub params: Vec<f32>,
    pub metrics: CheckpointMetrics,
}

impl Checkpoint {
    /// Snapshots a trained network together with its feature provenance.
    #[must_use]
    pub fn of(
        net: &InteractionNet,
        fingerprint: &FingerprintConfig,
        metrics: CheckpointMetrics,
    ) -> Self {
        Self {
            format_version: CHECKPOINT_FORMAT_VERSION,
            fingerprint: FingerprintStamp::of(fingerprint),
            severity_rules_version: SEVERITY_RULES_VERSION,
            labels: SeverityLabel::ALL.iter().map(|l| l.to_string()).collect(),
            dims: net.dims(),
            dropout: net.dropout(),
            params: net.to_flat(),
            metrics,
        }
    }

    /// Writes the checkpoint as JSON, atomically.
    ///
    /// The payload goes to a temporary sibling first and is renamed into
    /// place, so a crash mid-write never leaves a truncated checkpoint at
    /// the target path.
    ///
    /// # Errors
    ///
    /// Returns an error on serialization or filesystem failure.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string(self)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        info!(
            path = %path.display(),
            epoch = self.metrics.epoch,
            val_loss = self.metrics.val_loss,
            "checkpoint written"
        );
        Ok(())
    }

    /// Reads and validates a checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`FarmacoError::ModelNotLoaded`] when the file is missing
    /// or corrupt, or when any recorded version or the label set differs
    /// from what this binary implements.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| FarmacoError::ModelNotLoaded {
            reason: format!("cannot read {}: {e}", path.display()),
        })?;
        let checkpoint: Checkpoint =
            serde_json::from_str(&json).map_err(|e| FarmacoError::ModelNotLoaded {
                reason: format!("corrupt checkpoint {}: {e}", path.display()),
            })?;
        checkpoint.validate()?;
        Ok(checkpoint)
    }

    /// Checks every recorded version and the label set against the
    /// running binary.
    ///
    /// # Errors
    ///
    /// Returns [`FarmacoError::ModelNotLoaded`] naming the first mismatch.
    pub fn validate(&self) -> Result<()> {
        if self.format_version != CHECKPOINT_FORMAT_VERSION {
            return Err(FarmacoError::ModelNotLoaded {
                reason: format!(
                    "checkpoint format v{} but this build reads v{CHECKPOINT_FORMAT_VERSION}",
                    self.format_version
                ),
            });
        }
        if self.fingerprint.algo_version != FINGERPRINT_ALGO_VERSION {
            return Err(FarmacoError::ModelNotLoaded {
                reason: format!(
                    "fingerprint algorithm v{} but this build encodes v{FINGERPRINT_ALGO_VERSION}",
                    self.fingerprint.algo_version
                ),
            });
        }
        if self.severity_rules_version != SEVERITY_RULES_VERSION {
            return Err(FarmacoError::ModelNotLoaded {
                reason: format!(
                    "severity rules v{} but this build labels with v{SEVERITY_RULES_VERSION}",
                    self.severity_rules_version
                ),
            });
        }
        let expected: Vec<String> = SeverityLabel::ALL.iter().map(|l| l.to_string()).collect();
        if self.labels != expected {
            return Err(FarmacoError::ModelNotLoaded {
                reason: format!("label set {:?} does not match {expected:?}", self.labels),
            });
        }
        let first = self.dims.first().copied().unwrap_or(0);
        if first != 2 * self.fingerprint.n_bits {
            return Err(FarmacoError::ModelNotLoaded {
                reason: format!(
                    "input width {first} does not fit two {}-bit fingerprints",
                    self.fingerprint.n_bits
                ),
            });
        }
        if self.dims.last().copied().unwrap_or(0) != expected.len() {
            return Err(FarmacoError::ModelNotLoaded {
                reason: "output width does not match the label set".to_string(),
            });
        }
        Ok(())
    }

    /// Reconstructs the network held by this checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`FarmacoError::ModelNotLoaded`] if the parameter buffer
    /// does not match the recorded widths.
    pub fn restore(&self) -> Result<InteractionNet> {
        InteractionNet::from_flat(&self.dims, self.dropout, &self.params).map_err(|e| {
            FarmacoError::ModelNotLoaded {
                reason: format!("parameter buffer does not match widths: {e}"),
            }
        })
    }

    /// Fingerprint settings to encode inputs with at inference time.
    #[must_use]
    pub fn fingerprint_config(&self) -> FingerprintConfig {
        FingerprintConfig {
            radius: self.fingerprint.radius,
            n_bits: self.fingerprint.n_bits,
        }
    }
}
