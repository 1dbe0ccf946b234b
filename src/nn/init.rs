//! Weight initialization.
//!
//! Kaiming/He initialization (He et al., 2015) for `ReLU` networks:
//! samples from U(-bound, bound) with bound = sqrt(6 / `fan_in`), which
//! keeps activation variance stable through deep `ReLU` stacks.

use crate::primitives::Matrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Kaiming uniform initialization (He et al., 2015).
///
/// Samples a `rows x cols` matrix from U(-bound, bound) where
/// bound = sqrt(6 / `fan_in`). Pass a seed for reproducible weights.
#[must_use]
pub fn kaiming_uniform(rows: usize, cols: usize, fan_in: usize, seed: Option<u64>) -> Matrix {
    let bound = (6.0 / fan_in as f32).sqrt();
    uniform(rows, cols, -bound, bound, seed)
}

/// Uniform initialization over U(low, high).
pub(crate) fn uniform(
    rows: usize,
    cols: usize,
    low: f32,
    high: f32,
    seed: Option<u64>,
) -> Matrix {
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let mut out = Matrix::zeros(rows, cols);
    for value in out.as_mut_slice() {
        *value = rng.gen_range(low..high);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kaiming_bound() {
        let fan_in = 6;
        let bound = (6.0_f32 / 6.0).sqrt();
        let w = kaiming_uniform(4, fan_in, fan_in, Some(42));
        for &value in w.as_slice() {
            assert!(value > -bound && value < bound);
        }
    }

    #[test]
    fn test_seeded_init_is_reproducible() {
        let a = kaiming_uniform(8, 16, 16, Some(7));
        let b = kaiming_uniform(8, 16, 16, Some(7));
        assert_eq!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = kaiming_uniform(8, 16, 16, Some(1));
        let b = kaiming_uniform(8, 16, 16, Some(2));
        assert_ne!(a.as_slice(), b.as_slice());
    }
}
