//! Circular (Morgan/ECFP-style) fingerprint encoding.
//!
//! Each atom starts from a hash of its local invariants; each round up to
//! the configured radius rehashes the atom together with its sorted
//! neighborhood. Every identifier produced in every round is folded into a
//! fixed-width bit vector by modulo indexing.
//!
//! Determinism is part of the contract: identical input always yields a
//! bit-identical vector, across runs and toolchains. Hashing therefore
//! uses explicit FNV-1a constants instead of the standard library hasher,
//! whose algorithm is unspecified. Changing the hash, the radius, or the
//! width invalidates every existing checkpoint, which is why all three are
//! versioned and persisted.

use super::smiles::parse_smiles;
use crate::error::{FarmacoError, Result};
use serde::{Deserialize, Serialize};

/// Version of the encoding algorithm (atom invariants, hash, fold rule).
/// Bumped on any change that alters bit layout.
pub const FINGERPRINT_ALGO_VERSION: u32 = 1;

/// Fingerprint encoding parameters.
///
/// Persisted in checkpoints and validated at load time; a checkpoint
/// produced under different parameters is rejected rather than silently
/// misinterpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintConfig {
    /// Neighborhood radius (ECFP4 equivalent at radius 2).
    pub radius: u32,
    /// Output width in bits.
    pub n_bits: usize,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            radius: 2,
            n_bits: 2048,
        }
    }
}

impl FingerprintConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `n_bits` is zero or not a multiple of 64.
    pub fn validate(&self) -> Result<()> {
        if self.n_bits == 0 || self.n_bits % 64 != 0 {
            return Err(FarmacoError::InvalidHyperparameter {
                param: "n_bits".to_string(),
                value: self.n_bits.to_string(),
                constraint: "a positive multiple of 64".to_string(),
            });
        }
        Ok(())
    }
}

/// A fixed-length binary feature vector, bit-packed into u64 words.
///
/// # Examples
///
/// ```
/// use farmaco::fingerprint::{encode, FingerprintConfig};
///
/// let config = FingerprintConfig::default();
/// let fp = encode(&config, "CCO").expect("valid SMILES");
/// assert_eq!(fp.n_bits(), 2048);
/// assert!(fp.count_ones() > 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    words: Vec<u64>,
    n_bits: usize,
}

impl Fingerprint {
    /// Creates an all-zero fingerprint of the given width.
    #[must_use]
    pub fn zeros(n_bits: usize) -> Self {
        Self {
            words: vec![0; n_bits.div_ceil(64)],
            n_bits,
        }
    }

    /// Width in bits.
    #[must_use]
    pub fn n_bits(&self) -> usize {
        self.n_bits
    }

    /// Sets the bit at `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= n_bits`.
    pub fn set_bit(&mut self, idx: usize) {
        assert!(idx < self.n_bits, "bit index out of range");
        self.words[idx / 64] |= 1u64 << (idx % 64);
    }

    /// Returns the bit at `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= n_bits`.
    #[must_use]
    pub fn bit(&self, idx: usize) -> bool {
        assert!(idx < self.n_bits, "bit index out of range");
        self.words[idx / 64] & (1u64 << (idx % 64)) != 0
    }

    /// Number of set bits.
    #[must_use]
    pub fn count_ones(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// Expands the fingerprint into a dense f32 slice (0.0 / 1.0).
    ///
    /// # Panics
    ///
    /// Panics if `out.len() != n_bits`.
    pub fn write_dense(&self, out: &mut [f32]) {
        assert_eq!(out.len(), self.n_bits, "dense output length mismatch");
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = if self.bit(i) { 1.0 } else { 0.0 };
        }
    }

    /// Dense f32 copy of the fingerprint.
    #[must_use]
    pub fn to_dense(&self) -> Vec<f32> {
        let mut out = vec![0.0; self.n_bits];
        self.write_dense(&mut out);
        out
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a over a sequence of u64 values, fed byte-wise.
fn fnv1a(values: &[u64]) -> u64 {
    let mut hash = FNV_OFFSET;
    for value in values {
        for byte in value.to_le_bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    hash
}

/// Hash of `(seed, index)`, used for chunk-independent row subsampling.
#[must_use]
pub(crate) fn fnv_pair(seed: u64, index: u64) -> u64 {
    fnv1a(&[seed, index])
}

/// Encodes a SMILES string into a circular fingerprint.
///
/// # Errors
///
/// Returns [`FarmacoError::InvalidStructure`] for malformed input and
/// [`FarmacoError::InvalidHyperparameter`] for an invalid config. A
/// malformed structure never encodes to a zero vector.
pub fn encode(config: &FingerprintConfig, smiles: &str) -> Result<Fingerprint> {
    config.validate()?;
    let mol = parse_smiles(smiles)?;

    let degrees = mol.degrees();
    let hydrogens = mol.hydrogen_counts();
    let adjacency = mol.adjacency();

    // Round 0: per-atom invariants.
    let mut ids: Vec<u64> = mol
        .atoms()
        .iter()
        .enumerate()
        .map(|(i, atom)| {
            fnv1a(&[
                u64::from(atom.atomic_number),
                u64::from(degrees[i]),
                u64::from(hydrogens[i]),
                atom.charge as u64,
                u64::from(atom.aromatic),
            ])
        })
        .collect();

    let mut fp = Fingerprint::zeros(config.n_bits);
    for &id in &ids {
        fp.set_bit((id % config.n_bits as u64) as usize);
    }

    // Rounds 1..=radius: fold the sorted neighborhood into each atom id.
    for _ in 0..config.radius {
        let mut next = vec![0u64; ids.len()];
        for (i, neighbors) in adjacency.iter().enumerate() {
            let mut env: Vec<(u64, u64)> = neighbors
                .iter()
                .map(|&(nbr, order)| (order.code(), ids[nbr]))
                .collect();
            env.sort_unstable();

            let mut material = Vec::with_capacity(1 + env.len() * 2);
            material.push(ids[i]);
            for (order, id) in env {
                material.push(order);
                material.push(id);
            }
            next[i] = fnv1a(&material);
        }
        ids = next;
        for &id in &ids {
            fp.set_bit((id % config.n_bits as u64) as usize);
        }
    }

    Ok(fp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_deterministic() {
        let config = FingerprintConfig::default();
        let a = encode(&config, "CC(=O)OC1=CC=CC=C1C(=O)O").expect("valid SMILES");
        let b = encode(&config, "CC(=O)OC1=CC=CC=C1C(=O)O").expect("valid SMILES");
        assert_eq!(a, b);
    }

    #[test]
    fn test_encode_distinguishes_molecules() {
        let config = FingerprintConfig::default();
        let ethanol = encode(&config, "CCO").expect("valid SMILES");
        let propanol = encode(&config, "CCCO").expect("valid SMILES");
        assert_ne!(ethanol, propanol);
    }

    #[test]
    fn test_encode_rejects_malformed() {
        let config = FingerprintConfig::default();
        let result = encode(&config, "C1CC(");
        assert!(matches!(
            result,
            Err(crate::error::FarmacoError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn test_encode_never_zero_for_valid_input() {
        let config = FingerprintConfig::default();
        let fp = encode(&config, "C").expect("methane is valid");
        assert!(fp.count_ones() > 0);
    }

    #[test]
    fn test_radius_changes_bits() {
        let narrow = FingerprintConfig {
            radius: 0,
            n_bits: 2048,
        };
        let wide = FingerprintConfig {
            radius: 2,
            n_bits: 2048,
        };
        let fp0 = encode(&narrow, "CCO").expect("valid SMILES");
        let fp2 = encode(&wide, "CCO").expect("valid SMILES");
        // Radius 2 folds strictly more identifiers in.
        assert!(fp2.count_ones() >= fp0.count_ones());
        assert_ne!(fp0, fp2);
    }

    #[test]
    fn test_config_rejects_bad_width() {
        let config = FingerprintConfig {
            radius: 2,
            n_bits: 100,
        };
        assert!(encode(&config, "CCO").is_err());
    }

    #[test]
    fn test_bit_packing_round_trip() {
        let mut fp = Fingerprint::zeros(128);
        fp.set_bit(0);
        fp.set_bit(63);
        fp.set_bit(64);
        fp.set_bit(127);
        assert_eq!(fp.count_ones(), 4);
        let dense = fp.to_dense();
        assert_eq!(dense[0], 1.0);
        assert_eq!(dense[63], 1.0);
        assert_eq!(dense[64], 1.0);
        assert_eq!(dense[127], 1.0);
        assert_eq!(dense.iter().sum::<f32>(), 4.0);
    }
}
