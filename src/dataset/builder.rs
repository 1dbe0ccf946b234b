//! Memory-bounded batch dataset builder.
//!
//! Streams raw interaction rows in fixed-size chunks, resolves drug names,
//! encodes fingerprints through a bounded cache, classifies severity, and
//! accumulates bit-packed samples. Peak memory is bounded by the chunk
//! size and the cache capacity, never by the size of the interaction
//! table.
//!
//! Row subsampling is decided by a per-row hash of `(seed, row index)`, so
//! the selected multiset does not depend on the chunk size.

use super::severity::{classify_severity, SeverityLabel, SEVERITY_RULES_VERSION};
use crate::catalog::DrugCatalog;
use crate::error::{FarmacoError, Result};
use crate::fingerprint::{
    encode, fnv_pair, Fingerprint, FingerprintCache, FingerprintConfig,
    FINGERPRINT_ALGO_VERSION,
};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Format version of the persisted dataset file.
pub const DATASET_FORMAT_VERSION: u32 = 1;

/// One raw interaction row. Consumed only during dataset building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionRecord {
    pub drug_a: String,
    pub drug_b: String,
    /// Free-text interaction description; classified by the severity rules.
    pub raw_label: String,
}

/// One training example: an order-normalized fingerprint pair plus label.
///
/// Fingerprints are kept bit-packed; dense f32 rows are materialized only
/// inside the trainer, one minibatch at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairSample {
    pub a: Fingerprint,
    pub b: Fingerprint,
    pub label: SeverityLabel,
}

impl PairSample {
    /// Width of the dense feature row (both fingerprints concatenated).
    #[must_use]
    pub fn feature_width(&self) -> usize {
        self.a.n_bits() + self.b.n_bits()
    }

    /// Expands the pair into a dense f32 row: `a` bits then `b` bits.
    ///
    /// # Panics
    ///
    /// Panics if `out.len() != feature_width()`.
    pub fn write_dense(&self, out: &mut [f32]) {
        let split = self.a.n_bits();
        assert_eq!(out.len(), self.feature_width(), "feature row length mismatch");
        self.a.write_dense(&mut out[..split]);
        self.b.write_dense(&mut out[split..]);
    }
}

/// An assembled dataset of fingerprint pairs and severity labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    n_bits: usize,
    samples: Vec<PairSample>,
}

/// Serialized form of [`Dataset`], self-describing enough to detect
/// version mismatch against the running encoder and label rules.
#[derive(Debug, Serialize, Deserialize)]
struct DatasetFile {
    format_version: u32,
    fingerprint_algo_version: u32,
    severity_rules_version: u32,
    n_bits: usize,
    samples: Vec<PairSample>,
}

impl Dataset {
    /// Wraps samples into a dataset, checking fingerprint widths.
    ///
    /// # Errors
    ///
    /// Returns an error if any sample's fingerprints don't match `n_bits`.
    pub fn from_samples(n_bits: usize, samples: Vec<PairSample>) -> Result<Self> {
        for sample in &samples {
            if sample.a.n_bits() != n_bits || sample.b.n_bits() != n_bits {
                return Err(FarmacoError::DimensionMismatch {
                    expected: format!("{n_bits}-bit fingerprints"),
                    actual: format!(
                        "{} / {} bits",
                        sample.a.n_bits(),
                        sample.b.n_bits()
                    ),
                });
            }
        }
        Ok(Self { n_bits, samples })
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the dataset has no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Fingerprint width per drug.
    #[must_use]
    pub fn n_bits(&self) -> usize {
        self.n_bits
    }

    /// Dense feature row width (two fingerprints).
    #[must_use]
    pub fn feature_width(&self) -> usize {
        self.n_bits * 2
    }

    /// Samples in build order.
    #[must_use]
    pub fn samples(&self) -> &[PairSample] {
        &self.samples
    }

    /// Per-class sample counts, indexed by class index.
    #[must_use]
    pub fn label_counts(&self) -> [usize; 3] {
        let mut counts = [0usize; 3];
        for sample in &self.samples {
            counts[sample.label.class_index()] += 1;
        }
        counts
    }

    /// Splits into train/test partitions, stratified by label.
    ///
    /// Each label group is shuffled with the given seed and split at the
    /// same ratio, so class proportions are preserved across partitions.
    ///
    /// # Errors
    ///
    /// Returns an error if `test_size` is outside (0, 1) or either
    /// partition would be empty.
    pub fn stratified_split(&self, test_size: f32, seed: u64) -> Result<(Dataset, Dataset)> {
        if !(0.0..=1.0).contains(&test_size) || test_size == 0.0 || test_size == 1.0 {
            return Err(FarmacoError::InvalidHyperparameter {
                param: "test_size".to_string(),
                value: test_size.to_string(),
                constraint: "strictly between 0 and 1".to_string(),
            });
        }

        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let mut train = Vec::new();
        let mut test = Vec::new();

        for label in SeverityLabel::ALL {
            let mut indices: Vec<usize> = self
                .samples
                .iter()
                .enumerate()
                .filter(|(_, s)| s.label == label)
                .map(|(i, _)| i)
                .collect();
            if indices.is_empty() {
                continue;
            }
            indices.shuffle(&mut rng);
            let n_test = ((indices.len() as f32) * test_size).round() as usize;
            for (pos, idx) in indices.into_iter().enumerate() {
                if pos < n_test {
                    test.push(self.samples[idx].clone());
                } else {
                    train.push(self.samples[idx].clone());
                }
            }
        }

        if train.is_empty() || test.is_empty() {
            return Err(FarmacoError::Other(format!(
                "split would leave an empty partition (train={}, test={})",
                train.len(),
                test.len()
            )));
        }

        Ok((
            Dataset {
                n_bits: self.n_bits,
                samples: train,
            },
            Dataset {
                n_bits: self.n_bits,
                samples: test,
            },
        ))
    }

    /// Persists the dataset as self-describing JSON.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O or serialization failure.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = DatasetFile {
            format_version: DATASET_FORMAT_VERSION,
            fingerprint_algo_version: FINGERPRINT_ALGO_VERSION,
            severity_rules_version: SEVERITY_RULES_VERSION,
            n_bits: self.n_bits,
            samples: self.samples.clone(),
        };
        let json = serde_json::to_string(&file)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Loads a dataset persisted by [`save`](Self::save), validating the
    /// format and encoder versions.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, corrupt content, or a version
    /// mismatch against the running encoder or severity rules.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let file: DatasetFile = serde_json::from_str(&json)?;
        if file.format_version != DATASET_FORMAT_VERSION {
            return Err(FarmacoError::Serialization(format!(
                "unsupported dataset format version {}",
                file.format_version
            )));
        }
        if file.fingerprint_algo_version != FINGERPRINT_ALGO_VERSION {
            return Err(FarmacoError::Serialization(format!(
                "dataset was built with fingerprint algorithm v{}, running v{}",
                file.fingerprint_algo_version, FINGERPRINT_ALGO_VERSION
            )));
        }
        if file.severity_rules_version != SEVERITY_RULES_VERSION {
            return Err(FarmacoError::Serialization(format!(
                "dataset was built with severity rules v{}, running v{}",
                file.severity_rules_version, SEVERITY_RULES_VERSION
            )));
        }
        Self::from_samples(file.n_bits, file.samples)
    }
}

/// Counters reported after a build run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Rows in the source table.
    pub total_rows: usize,
    /// Rows selected by subsampling (all rows when no cap applies).
    pub sampled: usize,
    /// Rows skipped: unresolved names, invalid structures, malformed rows.
    pub skipped: usize,
    /// Samples kept in the dataset.
    pub kept: usize,
}

/// Configurable streaming dataset builder.
///
/// # Examples
///
/// ```no_run
/// use farmaco::catalog::DrugCatalog;
/// use farmaco::dataset::DatasetBuilder;
///
/// let catalog = DrugCatalog::from_csv_path("drug_info.csv").expect("catalog loads");
/// let (dataset, stats) = DatasetBuilder::new()
///     .with_chunk_size(5_000)
///     .with_max_samples(Some(50_000))
///     .build_from_csv(&catalog, "interactions.csv")
///     .expect("dataset builds");
/// assert_eq!(dataset.len(), stats.kept);
/// ```
#[derive(Debug, Clone)]
pub struct DatasetBuilder {
    fingerprint: FingerprintConfig,
    chunk_size: usize,
    max_samples: Option<usize>,
    seed: u64,
    skip_threshold: f64,
    cache_capacity: usize,
}

impl Default for DatasetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetBuilder {
    /// Creates a builder with the defaults from the reference pipeline:
    /// 5,000-row chunks, a 50,000-sample cap, seed 42, a 50% skip-rate
    /// ceiling, and a 5,000-entry fingerprint cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            fingerprint: FingerprintConfig::default(),
            chunk_size: 5_000,
            max_samples: Some(50_000),
            seed: 42,
            skip_threshold: 0.5,
            cache_capacity: 5_000,
        }
    }

    /// Sets the fingerprint encoding parameters.
    #[must_use]
    pub fn with_fingerprint(mut self, config: FingerprintConfig) -> Self {
        self.fingerprint = config;
        self
    }

    /// Sets the number of rows processed per chunk.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Caps the number of kept samples; `None` keeps everything.
    #[must_use]
    pub fn with_max_samples(mut self, max_samples: Option<usize>) -> Self {
        self.max_samples = max_samples;
        self
    }

    /// Sets the subsampling and shuffling seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the skip-rate ceiling above which the build fails loudly.
    #[must_use]
    pub fn with_skip_threshold(mut self, skip_threshold: f64) -> Self {
        self.skip_threshold = skip_threshold;
        self
    }

    /// Sets the fingerprint cache capacity.
    #[must_use]
    pub fn with_cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(FarmacoError::InvalidHyperparameter {
                param: "chunk_size".to_string(),
                value: "0".to_string(),
                constraint: "at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.skip_threshold) {
            return Err(FarmacoError::InvalidHyperparameter {
                param: "skip_threshold".to_string(),
                value: self.skip_threshold.to_string(),
                constraint: "between 0 and 1".to_string(),
            });
        }
        self.fingerprint.validate()
    }

    /// Builds a dataset from in-memory interaction records.
    ///
    /// # Errors
    ///
    /// Returns [`FarmacoError::DatasetBuild`] if the skip rate exceeds the
    /// configured ceiling or no usable row remains.
    pub fn build_from_records(
        &self,
        catalog: &DrugCatalog,
        records: Vec<InteractionRecord>,
    ) -> Result<(Dataset, BuildStats)> {
        let total = records.len();
        self.process(catalog, records.into_iter().map(Ok), total)
    }

    /// Builds a dataset by streaming an interaction CSV.
    ///
    /// Expected columns (matched case-insensitively): `drug 1`, `drug 2`,
    /// `interaction description`. The file is read twice: once to count
    /// rows for the subsampling ratio, then streamed in chunks.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, missing columns, an excessive
    /// skip rate, or an empty result.
    pub fn build_from_csv<P: AsRef<Path>>(
        &self,
        catalog: &DrugCatalog,
        path: P,
    ) -> Result<(Dataset, BuildStats)> {
        let path = path.as_ref();

        let mut counter = csv::Reader::from_path(path).map_err(|e| {
            FarmacoError::Other(format!("failed to open {}: {e}", path.display()))
        })?;
        let total = counter.records().count();

        let mut reader = csv::Reader::from_path(path).map_err(|e| {
            FarmacoError::Other(format!("failed to open {}: {e}", path.display()))
        })?;
        let headers = reader
            .headers()
            .map_err(|e| FarmacoError::Other(format!("failed to read headers: {e}")))?
            .clone();

        let mut col_a = None;
        let mut col_b = None;
        let mut col_label = None;
        for (i, header) in headers.iter().enumerate() {
            match header.trim().to_lowercase().as_str() {
                "drug 1" | "drug a" => col_a = Some(i),
                "drug 2" | "drug b" => col_b = Some(i),
                "interaction description" | "description" => col_label = Some(i),
                _ => {}
            }
        }
        let (col_a, col_b, col_label) = match (col_a, col_b, col_label) {
            (Some(a), Some(b), Some(l)) => (a, b, l),
            _ => {
                return Err(FarmacoError::Other(format!(
                    "missing drug/description columns in {}",
                    path.display()
                )))
            }
        };

        let rows = reader.into_records().map(move |row| {
            let row = row.map_err(|e| FarmacoError::Other(format!("bad CSV row: {e}")))?;
            Ok(InteractionRecord {
                drug_a: row.get(col_a).unwrap_or_default().to_string(),
                drug_b: row.get(col_b).unwrap_or_default().to_string(),
                raw_label: row.get(col_label).unwrap_or_default().to_string(),
            })
        });

        self.process(catalog, rows, total)
    }

    fn process<I>(
        &self,
        catalog: &DrugCatalog,
        rows: I,
        total_rows: usize,
    ) -> Result<(Dataset, BuildStats)>
    where
        I: Iterator<Item = Result<InteractionRecord>>,
    {
        self.validate()?;

        // Per-row hash threshold for subsampling; None keeps every row.
        let threshold = match self.max_samples {
            Some(max) if total_rows > max => {
                let ratio = max as f64 / total_rows as f64;
                info!(
                    total_rows,
                    max,
                    "subsampling {:.1}% of interaction rows",
                    ratio * 100.0
                );
                Some((ratio * u64::MAX as f64) as u64)
            }
            _ => None,
        };

        let mut stats = BuildStats {
            total_rows,
            ..BuildStats::default()
        };
        let mut cache = FingerprintCache::new(self.cache_capacity);
        let mut invalid: HashSet<String> = HashSet::new();
        let mut chunk: Vec<(String, String, SeverityLabel)> =
            Vec::with_capacity(self.chunk_size);
        let mut samples: Vec<PairSample> = Vec::new();

        for (idx, row) in rows.enumerate() {
            if let Some(t) = threshold {
                if fnv_pair(self.seed, idx as u64) > t {
                    continue;
                }
            }
            stats.sampled += 1;

            let record = match row {
                Ok(record) => record,
                Err(err) => {
                    debug!(%err, "skipping malformed interaction row");
                    stats.skipped += 1;
                    continue;
                }
            };

            let (smiles_a, smiles_b) = match (
                catalog.resolve(&record.drug_a),
                catalog.resolve(&record.drug_b),
            ) {
                (Ok(a), Ok(b)) => (a.to_string(), b.to_string()),
                _ => {
                    stats.skipped += 1;
                    continue;
                }
            };

            // Order-normalize the pair so the feature layout matches the
            // inference path.
            let (smiles_a, smiles_b) = if smiles_a <= smiles_b {
                (smiles_a, smiles_b)
            } else {
                (smiles_b, smiles_a)
            };
            let label = classify_severity(&record.raw_label);
            chunk.push((smiles_a, smiles_b, label));

            if chunk.len() >= self.chunk_size {
                self.flush_chunk(&mut chunk, &mut cache, &mut invalid, &mut samples, &mut stats);
                if self
                    .max_samples
                    .is_some_and(|max| samples.len() >= max)
                {
                    break;
                }
            }
        }
        self.flush_chunk(&mut chunk, &mut cache, &mut invalid, &mut samples, &mut stats);

        if let Some(max) = self.max_samples {
            samples.truncate(max);
        }
        stats.kept = samples.len();

        if stats.sampled == 0 {
            return Err(FarmacoError::Other(
                "interaction source contained no rows".to_string(),
            ));
        }
        let skip_rate = stats.skipped as f64 / stats.sampled as f64;
        if skip_rate > self.skip_threshold || samples.is_empty() {
            return Err(FarmacoError::DatasetBuild {
                skipped: stats.skipped,
                seen: stats.sampled,
            });
        }

        info!(
            kept = stats.kept,
            skipped = stats.skipped,
            sampled = stats.sampled,
            "dataset build complete"
        );
        Ok((
            Dataset {
                n_bits: self.fingerprint.n_bits,
                samples,
            },
            stats,
        ))
    }

    /// Encodes a chunk's unresolved structures in parallel, then assembles
    /// samples. The cache is cleared afterwards once it reaches capacity.
    fn flush_chunk(
        &self,
        chunk: &mut Vec<(String, String, SeverityLabel)>,
        cache: &mut FingerprintCache,
        invalid: &mut HashSet<String>,
        samples: &mut Vec<PairSample>,
        stats: &mut BuildStats,
    ) {
        if chunk.is_empty() {
            return;
        }

        let todo: Vec<String> = {
            let mut seen = HashSet::new();
            chunk
                .iter()
                .flat_map(|(a, b, _)| [a, b])
                .filter(|s| !cache.contains(s) && !invalid.contains(*s))
                .filter(|s| seen.insert((*s).clone()))
                .cloned()
                .collect()
        };

        let encoded: Vec<(String, Result<Fingerprint>)> = todo
            .into_par_iter()
            .map(|smiles| {
                let fp = encode(&self.fingerprint, &smiles);
                (smiles, fp)
            })
            .collect();
        for (smiles, result) in encoded {
            match result {
                Ok(fp) => cache.insert(smiles, fp),
                Err(err) => {
                    debug!(%err, "structure failed to encode");
                    invalid.insert(smiles);
                }
            }
        }

        for (smiles_a, smiles_b, label) in chunk.drain(..) {
            let Some(a) = self.lookup(cache, invalid, &smiles_a) else {
                stats.skipped += 1;
                continue;
            };
            let Some(b) = self.lookup(cache, invalid, &smiles_b) else {
                stats.skipped += 1;
                continue;
            };
            samples.push(PairSample { a, b, label });
        }

        if cache.len() >= cache.capacity() {
            debug!(entries = cache.len(), "clearing fingerprint cache between chunks");
            cache.clear();
        }
    }

    /// Cache lookup with a direct-encode fallback for entries evicted
    /// mid-chunk. Returns `None` only for invalid structures.
    fn lookup(
        &self,
        cache: &mut FingerprintCache,
        invalid: &mut HashSet<String>,
        smiles: &str,
    ) -> Option<Fingerprint> {
        if invalid.contains(smiles) {
            return None;
        }
        match cache.get_or_encode(&self.fingerprint, smiles) {
            Ok(fp) => Some(fp),
            Err(_) => {
                invalid.insert(smiles.to_string());
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
