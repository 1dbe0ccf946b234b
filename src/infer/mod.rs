//! Inference engine: drug pair in, severity assessment out.
//!
//! All state needed to serve predictions lives in one [`ModelContext`]:
//! the catalog, the trained network, the fingerprint settings it was
//! trained under, and every catalog structure pre-encoded into an
//! immutable map. The context is immutable after construction and
//! shareable across threads; name-based predictions read only that map,
//! so concurrent callers never contend on a lock. Ad-hoc structures not
//! in the catalog are memoized in a bounded cache behind a `Mutex`, but
//! encoding itself always runs outside the lock.
//!
//! Pairs are symmetrized before scoring by sorting the two canonical
//! structures, so `predict(a, b)` and `predict(b, a)` are the same call
//! by construction.

use crate::catalog::DrugCatalog;
use crate::checkpoint::Checkpoint;
use crate::dataset::SeverityLabel;
use crate::error::{FarmacoError, Result};
use crate::fingerprint::{encode, Fingerprint, FingerprintCache, FingerprintConfig};
use crate::nn::InteractionNet;
use crate::primitives::Matrix;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

/// Fingerprints memoized for repeat ad-hoc structure lookups. Catalog
/// structures are pre-encoded and never go through this cache.
const INFERENCE_CACHE_CAPACITY: usize = 1024;

/// Class probabilities by name, summing to one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    pub none: f32,
    pub moderate: f32,
    pub severe: f32,
}

/// One scored drug pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Arg-max severity class.
    pub severity: SeverityLabel,
    /// True unless the predicted class is `None`.
    pub interaction_exists: bool,
    /// 50·P(Moderate) + 100·P(Severe), in [0, 100].
    pub risk_score: f32,
    /// 100·max probability, in [0, 100].
    pub confidence: f32,
    pub probabilities: ClassProbabilities,
    /// One-line human-readable assessment.
    pub summary: String,
    /// Fixed per-severity guidance.
    pub recommendations: Vec<String>,
}

/// Liveness snapshot for the service layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub model_loaded: bool,
    pub catalog_entries: usize,
}

/// Immutable serving state: catalog, network, and fingerprint settings.
///
/// `Send + Sync`; clone-free sharing via `Arc` is the intended usage.
/// Every catalog structure is encoded once at construction, so the
/// name-based prediction path holds no lock at any point.
#[derive(Debug)]
pub struct ModelContext {
    catalog: DrugCatalog,
    net: InteractionNet,
    fingerprint: FingerprintConfig,
    /// Canonical structure → fingerprint for the whole catalog. Built
    /// once, read-only afterwards.
    encoded: HashMap<String, Fingerprint>,
    /// Memo for structures outside the catalog.
    cache: Mutex<FingerprintCache>,
}

impl ModelContext {
    /// Assembles a context from already-loaded parts, pre-encoding every
    /// catalog structure.
    ///
    /// # Errors
    ///
    /// Returns an error if the fingerprint settings are invalid, the
    /// network input does not fit two fingerprints, the output head does
    /// not match the severity label set, or a catalog structure fails to
    /// encode.
    pub fn new(
        catalog: DrugCatalog,
        net: InteractionNet,
        fingerprint: FingerprintConfig,
    ) -> Result<Self> {
        fingerprint.validate()?;
        if net.input_dim() != 2 * fingerprint.n_bits {
            return Err(FarmacoError::ModelNotLoaded {
                reason: format!(
                    "network expects {} inputs but two {}-bit fingerprints give {}",
                    net.input_dim(),
                    fingerprint.n_bits,
                    2 * fingerprint.n_bits
                ),
            });
        }
        if net.n_classes() != SeverityLabel::ALL.len() {
            return Err(FarmacoError::ModelNotLoaded {
                reason: format!(
                    "network has {} outputs but there are {} severity classes",
                    net.n_classes(),
                    SeverityLabel::ALL.len()
                ),
            });
        }
        let mut encoded = HashMap::new();
        for name in catalog.names() {
            let smiles = catalog.resolve(name)?;
            if !encoded.contains_key(smiles) {
                encoded.insert(smiles.to_string(), encode(&fingerprint, smiles)?);
            }
        }
        Ok(Self {
            catalog,
            net,
            fingerprint,
            encoded,
            cache: Mutex::new(FingerprintCache::new(INFERENCE_CACHE_CAPACITY)),
        })
    }

    /// Loads a checkpoint and assembles a serving context around it.
    ///
    /// # Errors
    ///
    /// Returns [`FarmacoError::ModelNotLoaded`] if the checkpoint is
    /// missing, corrupt, or was produced under different encoding rules.
    pub fn load<P: AsRef<Path>>(catalog: DrugCatalog, checkpoint_path: P) -> Result<Self> {
        let checkpoint = Checkpoint::load(checkpoint_path)?;
        let net = checkpoint.restore()?;
        let context = Self::new(catalog, net, checkpoint.fingerprint_config())?;
        info!(
            catalog_entries = context.catalog.len(),
            n_bits = context.fingerprint.n_bits,
            "model context ready"
        );
        Ok(context)
    }

    /// The catalog backing name resolution and search.
    #[must_use]
    pub fn catalog(&self) -> &DrugCatalog {
        &self.catalog
    }

    /// Liveness snapshot.
    #[must_use]
    pub fn health(&self) -> Health {
        Health {
            model_loaded: true,
            catalog_entries: self.catalog.len(),
        }
    }

    /// Scores a pair of drug names.
    ///
    /// Names are trimmed and resolved case-insensitively; the pair is
    /// symmetrized before scoring, so argument order never matters.
    ///
    /// # Errors
    ///
    /// Returns [`FarmacoError::IdenticalPair`] when both names are the
    /// same drug, [`FarmacoError::UnknownDrug`] for unresolvable names,
    /// and encoding or dimension errors otherwise.
    pub fn predict(&self, drug_a: &str, drug_b: &str) -> Result<PredictionResult> {
        let a = drug_a.trim();
        let b = drug_b.trim();
        if a.to_lowercase() == b.to_lowercase() {
            return Err(FarmacoError::IdenticalPair {
                name: a.to_string(),
            });
        }
        let smiles_a = self.catalog.resolve(a)?.to_string();
        let smiles_b = self.catalog.resolve(b)?.to_string();
        if smiles_a == smiles_b {
            // Two names for one structure is still a self-pair.
            return Err(FarmacoError::IdenticalPair {
                name: a.to_string(),
            });
        }
        self.score(&smiles_a, &smiles_b)
    }

    /// Scores a pair of structures directly, bypassing the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`FarmacoError::IdenticalPair`] for equal structures and
    /// [`FarmacoError::InvalidStructure`] for unparsable input.
    pub fn predict_from_smiles(&self, smiles_a: &str, smiles_b: &str) -> Result<PredictionResult> {
        let a = smiles_a.trim();
        let b = smiles_b.trim();
        if a == b {
            return Err(FarmacoError::IdenticalPair {
                name: a.to_string(),
            });
        }
        self.score(a, b)
    }

    /// Fingerprint for one structure: the pre-encoded catalog map first,
    /// then the memo cache. On a memo miss, encoding runs outside the
    /// lock; concurrent misses may duplicate work but never serialize
    /// on it.
    fn fingerprint_for(&self, smiles: &str) -> Result<Fingerprint> {
        if let Some(fp) = self.encoded.get(smiles) {
            return Ok(fp.clone());
        }
        {
            let mut cache = self.lock_cache()?;
            if let Some(fp) = cache.get(smiles) {
                return Ok(fp.clone());
            }
        }
        let fp = encode(&self.fingerprint, smiles)?;
        self.lock_cache()?.insert(smiles.to_string(), fp.clone());
        Ok(fp)
    }

    fn lock_cache(&self) -> Result<MutexGuard<'_, FingerprintCache>> {
        self.cache
            .lock()
            .map_err(|_| FarmacoError::Other("fingerprint cache lock poisoned".to_string()))
    }

    fn score(&self, smiles_a: &str, smiles_b: &str) -> Result<PredictionResult> {
        let (first, second) = if smiles_a <= smiles_b {
            (smiles_a, smiles_b)
        } else {
            (smiles_b, smiles_a)
        };

        let fp_a = self.fingerprint_for(first)?;
        let fp_b = self.fingerprint_for(second)?;

        let split = fp_a.n_bits();
        let mut x = Matrix::zeros(1, split + fp_b.n_bits());
        let row = x.row_mut(0);
        fp_a.write_dense(&mut row[..split]);
        fp_b.write_dense(&mut row[split..]);

        let probs = self.net.predict_proba(&x)?;
        let row = probs.row(0);
        let probabilities = ClassProbabilities {
            none: row[SeverityLabel::None.class_index()],
            moderate: row[SeverityLabel::Moderate.class_index()],
            severe: row[SeverityLabel::Severe.class_index()],
        };

        let severity = top_class(&probabilities);
        let risk_score =
            (50.0 * probabilities.moderate + 100.0 * probabilities.severe).clamp(0.0, 100.0);
        let confidence = (100.0
            * probabilities
                .none
                .max(probabilities.moderate)
                .max(probabilities.severe))
        .clamp(0.0, 100.0);

        Ok(PredictionResult {
            severity,
            interaction_exists: severity != SeverityLabel::None,
            risk_score,
            confidence,
            probabilities,
            summary: summary_for(&probabilities).to_string(),
            recommendations: recommendations_for(severity)
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        })
    }
}

fn top_class(p: &ClassProbabilities) -> SeverityLabel {
    // Lowest class index wins ties.
    let mut best = SeverityLabel::None;
    let mut best_p = p.none;
    if p.moderate > best_p {
        best = SeverityLabel::Moderate;
        best_p = p.moderate;
    }
    if p.severe > best_p {
        best = SeverityLabel::Severe;
    }
    best
}

/// One-line assessment chosen from fixed probability bands.
fn summary_for(p: &ClassProbabilities) -> &'static str {
    if p.severe > 0.7 {
        "Dangerous combination: avoid taking these drugs together and consult a healthcare provider immediately."
    } else if p.severe > 0.5 {
        "High risk of severe interaction: use extreme caution under medical supervision."
    } else if p.moderate > 0.6 {
        "Moderate risk: use with caution, monitor for side effects, and consult a healthcare provider."
    } else if p.moderate > 0.4 {
        "Potential interaction: consider monitoring and discuss with a healthcare provider."
    } else if p.none > 0.7 {
        "No major interaction detected. Always follow prescribed dosages."
    } else {
        "Uncertain prediction: consult a healthcare provider before combining these medications."
    }
}

fn recommendations_for(severity: SeverityLabel) -> &'static [&'static str] {
    match severity {
        SeverityLabel::Severe => &[
            "Avoid this drug combination if possible",
            "Consult your healthcare provider immediately",
            "Do not start or stop medications without medical supervision",
            "Monitor for serious adverse effects",
            "Consider alternative medications",
        ],
        SeverityLabel::Moderate => &[
            "Use this combination with caution",
            "Monitor for side effects regularly",
            "Inform your healthcare provider about all medications",
            "Follow prescribed dosages carefully",
            "Report any unusual symptoms immediately",
        ],
        SeverityLabel::None => &[
            "This combination appears safe",
            "Continue following prescribed dosages",
            "Maintain regular check-ups with your healthcare provider",
            "Report any unexpected side effects",
        ],
    }
}

#[cfg(test)]
#[path = "infer_tests.rs"]
mod tests;
