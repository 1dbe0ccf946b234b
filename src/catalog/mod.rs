//! Drug catalog: name → canonical structure resolution and search.
//!
//! The catalog is built once at startup from the drug reference data and
//! held as an in-memory read-only index for the process lifetime. Lookups
//! are case-insensitive; search returns alphabetically ordered substring
//! matches.

use crate::error::{FarmacoError, Result};
use crate::fingerprint::parse_smiles;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// One row of drug reference data. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrugRecord {
    /// Display name or identifier.
    pub name: String,
    /// Canonical structure (SMILES).
    pub smiles: String,
}

/// In-memory read-only index of drug names to canonical structures.
///
/// # Examples
///
/// ```
/// use farmaco::catalog::{DrugCatalog, DrugRecord};
///
/// let catalog = DrugCatalog::from_records(vec![
///     DrugRecord { name: "Aspirin".into(), smiles: "CC(=O)OC1=CC=CC=C1C(=O)O".into() },
/// ]).expect("valid records");
///
/// assert!(catalog.resolve("aspirin").is_ok());
/// assert!(catalog.resolve("Ibuprofen").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct DrugCatalog {
    /// Lowercased name → SMILES.
    index: HashMap<String, String>,
    /// Display names, sorted alphabetically for stable search output.
    names: Vec<String>,
    /// Rows rejected during load (unparsable structures).
    skipped: usize,
}

impl DrugCatalog {
    /// Builds a catalog from records, validating each structure.
    ///
    /// Rows whose SMILES fail to parse are skipped and counted, so every
    /// resolvable name is guaranteed to encode. Duplicate names keep the
    /// last structure loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if no record survives validation.
    pub fn from_records(records: Vec<DrugRecord>) -> Result<Self> {
        let mut index = HashMap::new();
        let mut display: HashMap<String, String> = HashMap::new();
        let mut skipped = 0usize;

        for record in records {
            let name = record.name.trim();
            if name.is_empty() {
                skipped += 1;
                continue;
            }
            if let Err(err) = parse_smiles(&record.smiles) {
                warn!(name = %name, %err, "skipping catalog row with invalid structure");
                skipped += 1;
                continue;
            }
            let key = name.to_lowercase();
            index.insert(key.clone(), record.smiles);
            display.insert(key, name.to_string());
        }

        if index.is_empty() {
            return Err(FarmacoError::Other(
                "catalog is empty after validation".to_string(),
            ));
        }

        let mut names: Vec<String> = display.into_values().collect();
        names.sort();

        info!(entries = names.len(), skipped, "drug catalog loaded");
        Ok(Self {
            index,
            names,
            skipped,
        })
    }

    /// Loads a catalog from a CSV file.
    ///
    /// Header names are matched case-insensitively: a `smiles` column is
    /// required; every column named `name` or `drug name` registers an
    /// alias for the row's structure (the reference data carries both a
    /// display name and an identifier per row).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, required columns are
    /// missing, or no row survives validation.
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path).map_err(|e| {
            FarmacoError::Other(format!("failed to open {}: {e}", path.display()))
        })?;

        let headers = reader
            .headers()
            .map_err(|e| FarmacoError::Other(format!("failed to read headers: {e}")))?
            .clone();

        let mut name_cols = Vec::new();
        let mut smiles_col = None;
        for (i, header) in headers.iter().enumerate() {
            match header.trim().to_lowercase().as_str() {
                "name" | "drug name" => name_cols.push(i),
                "smiles" => smiles_col = Some(i),
                _ => {}
            }
        }
        let smiles_col = smiles_col.ok_or_else(|| {
            FarmacoError::Other(format!("no 'smiles' column in {}", path.display()))
        })?;
        if name_cols.is_empty() {
            return Err(FarmacoError::Other(format!(
                "no name column in {}",
                path.display()
            )));
        }

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row.map_err(|e| FarmacoError::Other(format!("bad CSV row: {e}")))?;
            let Some(smiles) = row.get(smiles_col) else {
                continue;
            };
            for &col in &name_cols {
                if let Some(name) = row.get(col) {
                    if !name.trim().is_empty() {
                        records.push(DrugRecord {
                            name: name.trim().to_string(),
                            smiles: smiles.trim().to_string(),
                        });
                    }
                }
            }
        }

        Self::from_records(records)
    }

    /// Resolves a drug name to its canonical structure.
    ///
    /// Matching is exact after trimming and case folding.
    ///
    /// # Errors
    ///
    /// Returns [`FarmacoError::UnknownDrug`] if the name is absent.
    pub fn resolve(&self, name: &str) -> Result<&str> {
        self.index
            .get(&name.trim().to_lowercase())
            .map(String::as_str)
            .ok_or_else(|| FarmacoError::UnknownDrug {
                name: name.trim().to_string(),
            })
    }

    /// Case-insensitive substring search over display names.
    ///
    /// Results come back in alphabetical order, capped at `limit`. An
    /// empty query or no match yields an empty list, never an error.
    #[must_use]
    pub fn search(&self, query: &str, limit: usize) -> Vec<&str> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() || limit == 0 {
            return Vec::new();
        }
        self.names
            .iter()
            .filter(|name| name.to_lowercase().contains(&needle))
            .take(limit)
            .map(String::as_str)
            .collect()
    }

    /// Number of resolvable names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns true if the catalog has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// All display names, alphabetically sorted.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Rows rejected during load.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::{encode, FingerprintConfig};

    fn sample_catalog() -> DrugCatalog {
        DrugCatalog::from_records(vec![
            DrugRecord {
                name: "Aspirin".into(),
                smiles: "CC(=O)OC1=CC=CC=C1C(=O)O".into(),
            },
            DrugRecord {
                name: "Warfarin".into(),
                smiles: "CC(=O)CC(C1=CC=CC=C1)C2=C(C3=CC=CC=C3OC2=O)O".into(),
            },
            DrugRecord {
                name: "Ibuprofen".into(),
                smiles: "CC(C)CC1=CC=C(C=C1)C(C)C(=O)O".into(),
            },
        ])
        .expect("sample records are valid")
    }

    #[test]
    fn test_resolve_case_insensitive() {
        let catalog = sample_catalog();
        assert_eq!(
            catalog.resolve("ASPIRIN").expect("known drug"),
            "CC(=O)OC1=CC=CC=C1C(=O)O"
        );
        assert_eq!(
            catalog.resolve("  warfarin ").expect("known drug"),
            catalog.resolve("Warfarin").expect("known drug")
        );
    }

    #[test]
    fn test_resolve_unknown_drug() {
        let catalog = sample_catalog();
        let err = catalog.resolve("UnknownDrugXYZ").expect_err("unknown name");
        assert!(matches!(err, FarmacoError::UnknownDrug { .. }));
    }

    #[test]
    fn test_search_alphabetical_and_capped() {
        let catalog = sample_catalog();
        let hits = catalog.search("in", 10);
        assert_eq!(hits, vec!["Aspirin", "Warfarin"]);
        assert_eq!(catalog.search("in", 1), vec!["Aspirin"]);
    }

    #[test]
    fn test_search_empty_query_returns_empty() {
        let catalog = sample_catalog();
        assert!(catalog.search("", 10).is_empty());
        assert!(catalog.search("   ", 10).is_empty());
        assert!(catalog.search("zzz", 10).is_empty());
    }

    #[test]
    fn test_invalid_structures_skipped_and_counted() {
        let catalog = DrugCatalog::from_records(vec![
            DrugRecord {
                name: "Good".into(),
                smiles: "CCO".into(),
            },
            DrugRecord {
                name: "Bad".into(),
                smiles: "C1CC(".into(),
            },
        ])
        .expect("one valid record remains");
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.skipped(), 1);
        assert!(catalog.resolve("Bad").is_err());
    }

    #[test]
    fn test_all_catalog_entries_encode() {
        // Every resolvable name must yield a structure that encodes.
        let catalog = sample_catalog();
        let config = FingerprintConfig::default();
        for name in catalog.names() {
            let smiles = catalog.resolve(name).expect("name is resolvable");
            encode(&config, smiles).expect("catalog structures must encode");
        }
    }

    #[test]
    fn test_duplicate_names_last_wins() {
        let catalog = DrugCatalog::from_records(vec![
            DrugRecord {
                name: "Drug".into(),
                smiles: "CCO".into(),
            },
            DrugRecord {
                name: "drug".into(),
                smiles: "CCC".into(),
            },
        ])
        .expect("valid records");
        assert_eq!(catalog.resolve("DRUG").expect("known"), "CCC");
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_empty_catalog_rejected() {
        assert!(DrugCatalog::from_records(vec![]).is_err());
    }
}
