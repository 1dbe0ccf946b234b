//! Error types for farmaco operations.
//!
//! Provides rich error context for library consumers. Resolution and
//! structure errors carry the offending input so the API layer can surface
//! a user-correctable message without leaking internals.

use std::fmt;

/// Main error type for farmaco operations.
///
/// # Examples
///
/// ```
/// use farmaco::error::FarmacoError;
///
/// let err = FarmacoError::UnknownDrug {
///     name: "UnknownDrugXYZ".to_string(),
/// };
/// assert!(err.to_string().contains("not found"));
/// ```
#[derive(Debug)]
pub enum FarmacoError {
    /// Malformed canonical structure (SMILES) string.
    ///
    /// Terminates the affected row or request only; never silently mapped
    /// to a zero vector.
    InvalidStructure {
        /// The rejected SMILES input
        smiles: String,
        /// What the parser objected to
        reason: String,
    },

    /// Drug name absent from the loaded catalog.
    ///
    /// User-correctable; never fatal to a running service.
    UnknownDrug {
        /// The name that failed to resolve
        name: String,
    },

    /// Both sides of a prediction request refer to the same drug.
    IdenticalPair {
        /// The duplicated drug name or structure
        name: String,
    },

    /// Checkpoint missing, corrupt, or incompatible with the running
    /// encoder. Fatal at service startup.
    ModelNotLoaded {
        /// Why the checkpoint was rejected
        reason: String,
    },

    /// Dataset build produced too few usable rows.
    DatasetBuild {
        /// Rows skipped due to resolution or encoding failures
        skipped: usize,
        /// Rows considered
        seen: usize,
    },

    /// Matrix/vector dimensions don't match for the operation.
    DimensionMismatch {
        /// Expected dimensions description
        expected: String,
        /// Actual dimensions found
        actual: String,
    },

    /// Invalid hyperparameter value provided.
    InvalidHyperparameter {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// I/O error (file not found, permission denied, etc.).
    Io(std::io::Error),

    /// Serialization/deserialization error.
    Serialization(String),

    /// Generic error with string message.
    Other(String),
}

impl fmt::Display for FarmacoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FarmacoError::InvalidStructure { smiles, reason } => {
                write!(f, "Invalid structure {smiles:?}: {reason}")
            }
            FarmacoError::UnknownDrug { name } => {
                write!(f, "Drug {name:?} not found in catalog")
            }
            FarmacoError::IdenticalPair { name } => {
                write!(
                    f,
                    "Both drugs in the pair are {name:?}; a pair must contain two distinct drugs"
                )
            }
            FarmacoError::ModelNotLoaded { reason } => {
                write!(f, "Model not loaded: {reason}")
            }
            FarmacoError::DatasetBuild { skipped, seen } => {
                write!(
                    f,
                    "Dataset build failed: {skipped} of {seen} rows skipped, exceeding the allowed skip rate"
                )
            }
            FarmacoError::DimensionMismatch { expected, actual } => {
                write!(f, "Dimension mismatch: expected {expected}, got {actual}")
            }
            FarmacoError::InvalidHyperparameter {
                param,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "Invalid hyperparameter: {param} = {value}, expected {constraint}"
                )
            }
            FarmacoError::Io(e) => write!(f, "I/O error: {e}"),
            FarmacoError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            FarmacoError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for FarmacoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FarmacoError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FarmacoError {
    fn from(err: std::io::Error) -> Self {
        FarmacoError::Io(err)
    }
}

impl From<serde_json::Error> for FarmacoError {
    fn from(err: serde_json::Error) -> Self {
        FarmacoError::Serialization(err.to_string())
    }
}

impl From<&str> for FarmacoError {
    fn from(msg: &str) -> Self {
        FarmacoError::Other(msg.to_string())
    }
}

impl From<String> for FarmacoError {
    fn from(msg: String) -> Self {
        FarmacoError::Other(msg)
    }
}

/// Convenience result type for farmaco operations.
pub type Result<T> = std::result::Result<T, FarmacoError>;
