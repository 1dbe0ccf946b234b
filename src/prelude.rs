//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use farmaco::prelude::*;
//! ```

pub use crate::catalog::{DrugCatalog, DrugRecord};
pub use crate::checkpoint::Checkpoint;
pub use crate::dataset::{classify_severity, Dataset, DatasetBuilder, SeverityLabel};
pub use crate::error::{FarmacoError, Result};
pub use crate::fingerprint::{encode, Fingerprint, FingerprintConfig};
pub use crate::infer::{ModelContext, PredictionResult};
pub use crate::nn::{InteractionNet, NetConfig};
pub use crate::primitives::Matrix;
pub use crate::train::{train, TrainConfig, TrainReport};
