//! Bounded memoization cache for encoded fingerprints.
//!
//! Keyed by canonical SMILES, which is immutable, so entries never need
//! invalidation; the cache only bounds memory. Eviction is least recently
//! used, tracked with a monotonic access stamp.

use super::morgan::{encode, Fingerprint, FingerprintConfig};
use crate::error::Result;
use std::collections::HashMap;

/// Fixed-capacity LRU cache of SMILES → fingerprint.
///
/// # Examples
///
/// ```
/// use farmaco::fingerprint::{FingerprintCache, FingerprintConfig};
///
/// let config = FingerprintConfig::default();
/// let mut cache = FingerprintCache::new(2);
/// cache.get_or_encode(&config, "CCO").expect("valid SMILES");
/// cache.get_or_encode(&config, "CCO").expect("valid SMILES");
/// assert_eq!(cache.len(), 1);
/// ```
#[derive(Debug)]
pub struct FingerprintCache {
    capacity: usize,
    entries: HashMap<String, (Fingerprint, u64)>,
    clock: u64,
}

impl FingerprintCache {
    /// Creates a cache holding at most `capacity` fingerprints.
    ///
    /// A zero capacity disables memoization entirely.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            clock: 0,
        }
    }

    /// Number of cached fingerprints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of cached fingerprints.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops every cached entry. The dataset builder calls this between
    /// chunks to bound peak memory.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns true if `smiles` is cached, without refreshing its LRU
    /// position.
    #[must_use]
    pub fn contains(&self, smiles: &str) -> bool {
        self.entries.contains_key(smiles)
    }

    /// Returns the cached fingerprint for `smiles`, refreshing its LRU
    /// position.
    pub fn get(&mut self, smiles: &str) -> Option<&Fingerprint> {
        self.clock += 1;
        let clock = self.clock;
        self.entries.get_mut(smiles).map(|(fp, stamp)| {
            *stamp = clock;
            &*fp
        })
    }

    /// Inserts a fingerprint, evicting the least recently used entry when
    /// at capacity.
    pub fn insert(&mut self, smiles: String, fp: Fingerprint) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&smiles) {
            if let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, (_, stamp))| *stamp)
                .map(|(key, _)| key.clone())
            {
                self.entries.remove(&oldest);
            }
        }
        self.clock += 1;
        self.entries.insert(smiles, (fp, self.clock));
    }

    /// Returns the fingerprint for `smiles`, encoding and caching it on a
    /// miss.
    ///
    /// # Errors
    ///
    /// Propagates encoding failures; nothing is cached for invalid input.
    pub fn get_or_encode(
        &mut self,
        config: &FingerprintConfig,
        smiles: &str,
    ) -> Result<Fingerprint> {
        if let Some(fp) = self.get(smiles) {
            return Ok(fp.clone());
        }
        let fp = encode(config, smiles)?;
        self.insert(smiles.to_string(), fp.clone());
        Ok(fp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_hit_returns_same_fingerprint() {
        let config = FingerprintConfig::default();
        let mut cache = FingerprintCache::new(8);
        let first = cache.get_or_encode(&config, "CCO").expect("valid SMILES");
        let second = cache.get_or_encode(&config, "CCO").expect("valid SMILES");
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_evicts_least_recently_used() {
        let config = FingerprintConfig::default();
        let mut cache = FingerprintCache::new(2);
        cache.get_or_encode(&config, "C").expect("valid");
        cache.get_or_encode(&config, "CC").expect("valid");
        // Touch "C" so "CC" becomes the eviction candidate.
        assert!(cache.get("C").is_some());
        cache.get_or_encode(&config, "CCC").expect("valid");

        assert_eq!(cache.len(), 2);
        assert!(cache.get("C").is_some());
        assert!(cache.get("CC").is_none());
        assert!(cache.get("CCC").is_some());
    }

    #[test]
    fn test_cache_clear() {
        let config = FingerprintConfig::default();
        let mut cache = FingerprintCache::new(4);
        cache.get_or_encode(&config, "CCO").expect("valid");
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalid_smiles_not_cached() {
        let config = FingerprintConfig::default();
        let mut cache = FingerprintCache::new(4);
        assert!(cache.get_or_encode(&config, "C(").is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_disables_caching() {
        let config = FingerprintConfig::default();
        let mut cache = FingerprintCache::new(0);
        cache.get_or_encode(&config, "CCO").expect("valid");
        assert!(cache.is_empty());
    }
}
