use super::*;
use crate::catalog::{DrugCatalog, DrugRecord};
use std::collections::HashMap;

fn test_catalog() -> DrugCatalog {
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
        DrugRecord {
            name: "Caffeine".into(),
            smiles: "CN1C=NC2=C1C(=O)N(C(=O)N2C)C".into(),
        },
    ])
    .expect("test catalog is valid")
}

fn record(a: &str, b: &str, label: &str) -> InteractionRecord {
    InteractionRecord {
        drug_a: a.to_string(),
        drug_b: b.to_string(),
        raw_label: label.to_string(),
    }
}

fn test_records() -> Vec<InteractionRecord> {
    vec![
        record("Warfarin", "Aspirin", "May increase the risk of hemorrhage."),
        record("Aspirin", "Ibuprofen", "Monitor for reduced effect."),
        record("Caffeine", "Aspirin", "No clinically relevant interaction."),
        record("Warfarin", "Ibuprofen", "Serious bleeding risk."),
        record("Caffeine", "Ibuprofen", "Use with caution."),
        record("Warfarin", "Caffeine", "No interaction documented."),
    ]
}

fn multiset(dataset: &Dataset) -> HashMap<PairSample, usize> {
    let mut counts = HashMap::new();
    for sample in dataset.samples() {
        *counts.entry(sample.clone()).or_insert(0) += 1;
    }
    counts
}

#[test]
fn test_build_keeps_all_resolvable_rows() {
    let catalog = test_catalog();
    let builder = DatasetBuilder::new().with_max_samples(None);
    let (dataset, stats) = builder
        .build_from_records(&catalog, test_records())
        .expect("build succeeds");

    assert_eq!(dataset.len(), 6);
    assert_eq!(stats.kept, 6);
    assert_eq!(stats.skipped, 0);
    assert_eq!(stats.sampled, 6);
}

#[test]
fn test_batch_equivalence_across_chunk_sizes() {
    // Chunk size must not change the produced multiset of samples.
    let catalog = test_catalog();
    let records = test_records();

    let (tiny_chunks, _) = DatasetBuilder::new()
        .with_max_samples(None)
        .with_chunk_size(1)
        .build_from_records(&catalog, records.clone())
        .expect("build succeeds");
    let (one_chunk, _) = DatasetBuilder::new()
        .with_max_samples(None)
        .with_chunk_size(5_000)
        .build_from_records(&catalog, records)
        .expect("build succeeds");

    assert_eq!(multiset(&tiny_chunks), multiset(&one_chunk));
}

#[test]
fn test_pair_order_is_normalized() {
    let catalog = test_catalog();
    let builder = DatasetBuilder::new().with_max_samples(None);

    let (forward, _) = builder
        .build_from_records(&catalog, vec![record("Warfarin", "Aspirin", "bleeding")])
        .expect("build succeeds");
    let (reversed, _) = builder
        .build_from_records(&catalog, vec![record("Aspirin", "Warfarin", "bleeding")])
        .expect("build succeeds");

    assert_eq!(forward.samples(), reversed.samples());
}

#[test]
fn test_unresolvable_rows_skipped_and_counted() {
    let catalog = test_catalog();
    let mut records = test_records();
    records.push(record("UnknownDrugXYZ", "Aspirin", "whatever"));

    let (dataset, stats) = DatasetBuilder::new()
        .with_max_samples(None)
        .build_from_records(&catalog, records)
        .expect("skip rate stays under the ceiling");

    assert_eq!(dataset.len(), 6);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.sampled, 7);
}

#[test]
fn test_excessive_skip_rate_fails_loudly() {
    let catalog = test_catalog();
    let records = vec![
        record("Nope1", "Nope2", "x"),
        record("Nope3", "Nope4", "x"),
        record("Warfarin", "Aspirin", "bleeding"),
    ];

    let err = DatasetBuilder::new()
        .with_max_samples(None)
        .build_from_records(&catalog, records)
        .expect_err("two thirds of rows skipped");
    assert!(matches!(
        err,
        FarmacoError::DatasetBuild {
            skipped: 2,
            seen: 3
        }
    ));
}

#[test]
fn test_severity_labels_assigned() {
    let catalog = test_catalog();
    let (dataset, _) = DatasetBuilder::new()
        .with_max_samples(None)
        .build_from_records(&catalog, test_records())
        .expect("build succeeds");

    // 2 severe (hemorrhage, bleeding), 2 moderate (monitor/effect, caution),
    // 2 none.
    assert_eq!(dataset.label_counts(), [2, 2, 2]);
}

#[test]
fn test_max_samples_caps_output() {
    let catalog = test_catalog();
    let (dataset, stats) = DatasetBuilder::new()
        .with_max_samples(Some(3))
        .with_chunk_size(2)
        .build_from_records(&catalog, test_records())
        .expect("build succeeds");

    assert!(dataset.len() <= 3);
    assert_eq!(stats.kept, dataset.len());
}

#[test]
fn test_subsampling_is_reproducible() {
    let catalog = test_catalog();
    let build = |chunk_size: usize| {
        DatasetBuilder::new()
            .with_max_samples(Some(4))
            .with_chunk_size(chunk_size)
            .with_seed(7)
            .build_from_records(&catalog, test_records())
            .expect("build succeeds")
            .0
    };
    // Same seed, same rows selected, regardless of chunking.
    assert_eq!(multiset(&build(1)), multiset(&build(100)));
}

#[test]
fn test_stratified_split_preserves_classes() {
    let catalog = test_catalog();
    let mut records = Vec::new();
    for _ in 0..10 {
        records.extend(test_records());
    }
    let (dataset, _) = DatasetBuilder::new()
        .with_max_samples(None)
        .build_from_records(&catalog, records)
        .expect("build succeeds");
    assert_eq!(dataset.len(), 60);

    let (train, test) = dataset
        .stratified_split(0.2, 42)
        .expect("split succeeds");

    assert_eq!(train.len() + test.len(), 60);
    // 20 per class, 80/20 split: 4 of each class in test.
    assert_eq!(test.label_counts(), [4, 4, 4]);
    assert_eq!(train.label_counts(), [16, 16, 16]);
}

#[test]
fn test_stratified_split_reproducible() {
    let catalog = test_catalog();
    let (dataset, _) = DatasetBuilder::new()
        .with_max_samples(None)
        .build_from_records(&catalog, test_records())
        .expect("build succeeds");

    let (train_a, test_a) = dataset.stratified_split(0.5, 42).expect("split succeeds");
    let (train_b, test_b) = dataset.stratified_split(0.5, 42).expect("split succeeds");
    assert_eq!(train_a.samples(), train_b.samples());
    assert_eq!(test_a.samples(), test_b.samples());
}

#[test]
fn test_split_rejects_bad_test_size() {
    let catalog = test_catalog();
    let (dataset, _) = DatasetBuilder::new()
        .with_max_samples(None)
        .build_from_records(&catalog, test_records())
        .expect("build succeeds");

    assert!(dataset.stratified_split(0.0, 42).is_err());
    assert!(dataset.stratified_split(1.0, 42).is_err());
    assert!(dataset.stratified_split(1.5, 42).is_err());
}

#[test]
fn test_dataset_save_load_round_trip() {
    let catalog = test_catalog();
    let (dataset, _) = DatasetBuilder::new()
        .with_max_samples(None)
        .build_from_records(&catalog, test_records())
        .expect("build succeeds");

    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("dataset.json");
    dataset.save(&path).expect("save succeeds");

    let loaded = Dataset::load(&path).expect("load succeeds");
    assert_eq!(loaded, dataset);
}

#[test]
fn test_dataset_load_rejects_corrupt_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("dataset.json");
    std::fs::write(&path, "not json").expect("write succeeds");
    assert!(Dataset::load(&path).is_err());
}

#[test]
fn test_dense_feature_layout() {
    let catalog = test_catalog();
    let (dataset, _) = DatasetBuilder::new()
        .with_max_samples(None)
        .build_from_records(&catalog, vec![record("Warfarin", "Aspirin", "bleeding")])
        .expect("build succeeds");

    let sample = &dataset.samples()[0];
    let mut row = vec![0.0f32; sample.feature_width()];
    sample.write_dense(&mut row);

    assert_eq!(row.len(), dataset.feature_width());
    let ones: f32 = row.iter().sum();
    assert_eq!(
        ones,
        (sample.a.count_ones() + sample.b.count_ones()) as f32
    );
}
