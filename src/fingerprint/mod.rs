//! Molecular fingerprint encoding.
//!
//! Maps a canonical structure string (SMILES) to a fixed-length binary
//! feature vector via deterministic circular hashing:
//!
//! - [`parse_smiles`]: validating SMILES parser → [`Molecule`]
//! - [`encode`]: Morgan/ECFP-style neighborhood hashing → [`Fingerprint`]
//! - [`FingerprintCache`]: bounded LRU memoization keyed by structure
//!
//! The encoding parameters ([`FingerprintConfig`]) and algorithm version
//! ([`FINGERPRINT_ALGO_VERSION`]) are persisted in every checkpoint and
//! validated at load time.

mod cache;
mod morgan;
mod smiles;

pub use cache::FingerprintCache;
pub use morgan::{encode, Fingerprint, FingerprintConfig, FINGERPRINT_ALGO_VERSION};
pub(crate) use morgan::fnv_pair;
pub use smiles::{parse_smiles, Atom, Bond, BondOrder, Molecule};

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Generates small valid linear SMILES from the organic subset.
    fn valid_chain() -> impl Strategy<Value = String> {
        proptest::collection::vec(
            prop_oneof![
                Just("C"),
                Just("N"),
                Just("O"),
                Just("S"),
                Just("CC"),
                Just("C=C"),
                Just("C#N"),
            ],
            1..6,
        )
        .prop_map(|parts| parts.concat())
    }

    proptest! {
        #[test]
        fn encode_is_deterministic(smiles in valid_chain()) {
            let config = FingerprintConfig::default();
            let a = encode(&config, &smiles).expect("generated SMILES are valid");
            let b = encode(&config, &smiles).expect("generated SMILES are valid");
            prop_assert_eq!(a, b);
        }

        #[test]
        fn encode_sets_at_least_one_bit(smiles in valid_chain()) {
            let config = FingerprintConfig::default();
            let fp = encode(&config, &smiles).expect("generated SMILES are valid");
            prop_assert!(fp.count_ones() > 0);
        }
    }
}
