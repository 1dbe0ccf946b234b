//! Farmaco: drug-drug interaction severity prediction in pure Rust.
//!
//! Farmaco turns a pair of drugs into a severity assessment: structures
//! are encoded as circular fingerprints, a small feed-forward network
//! scores the pair, and the result carries probabilities, a bounded risk
//! score, and human-readable guidance. Training, checkpointing, and
//! serving all live in this one crate.
//!
//! # Quick Start
//!
//! ```
//! use farmaco::prelude::*;
//!
//! let catalog = DrugCatalog::from_records(vec![
//!     DrugRecord { name: "Aspirin".into(), smiles: "CC(=O)OC1=CC=CC=C1C(=O)O".into() },
//!     DrugRecord { name: "Ethanol".into(), smiles: "CCO".into() },
//! ]).unwrap();
//!
//! let config = NetConfig { input_dim: 128, hidden_dims: vec![16], n_classes: 3, dropout: 0.0 };
//! let net = InteractionNet::new(&config, Some(42)).unwrap();
//! let fingerprint = FingerprintConfig { radius: 2, n_bits: 64 };
//!
//! let context = ModelContext::new(catalog, net, fingerprint).unwrap();
//! let result = context.predict("Aspirin", "Ethanol").unwrap();
//! assert!((0.0..=100.0).contains(&result.risk_score));
//! ```
//!
//! # Modules
//!
//! - [`primitives`]: The dense Matrix type at the network boundary
//! - [`fingerprint`]: SMILES parsing and circular fingerprint encoding
//! - [`catalog`]: Drug name resolution and search
//! - [`dataset`]: Severity labeling and streaming dataset construction
//! - [`nn`]: The feed-forward classifier and its optimizer
//! - [`train`]: Training loop with early stopping and checkpointing
//! - [`checkpoint`]: Self-describing, versioned model persistence
//! - [`infer`]: The serving-side prediction engine

pub mod catalog;
pub mod checkpoint;
pub mod dataset;
pub mod error;
pub mod fingerprint;
pub mod infer;
pub mod nn;
pub mod prelude;
pub mod primitives;
pub mod train;

pub use error::{FarmacoError, Result};
