//! Training data pipeline: severity labeling and streaming dataset
//! construction.
//!
//! Raw interaction rows (two drug names plus a free-text description) are
//! turned into labeled fingerprint pairs in bounded memory. The builder
//! streams the input in fixed-size chunks, subsamples deterministically
//! when a cap is set, and symmetrizes every pair so that (A, B) and
//! (B, A) produce the same training sample.

mod builder;
mod severity;

pub use builder::{
    BuildStats, Dataset, DatasetBuilder, InteractionRecord, PairSample,
    DATASET_FORMAT_VERSION,
};
pub use severity::{classify_severity, SeverityLabel, SEVERITY_RULES_VERSION};
