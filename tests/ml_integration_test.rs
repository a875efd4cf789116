//! Integration tests for the issue classifier
//!
//! These tests verify the complete ML lifecycle:
//! - Training from labeled incidents
//! - Prediction through the shared handle
//! - Artifact save/load fidelity
//! - Model swaps

mod common;

use atm_incident_triage::{
    config::ModelConfig,
    ml::{artifact, train_model, ClassifierHandle},
    models::{IssueCategory, LabeledIncident},
    TriageError,
};
use common::{category_sample, labeled_set, small_model_config};
use tempfile::tempdir;

#[test]
fn test_trained_model_separates_categories() {
    let handle = ClassifierHandle::new();
    handle.train(&labeled_set(8), &small_model_config()).unwrap();

    for category in IssueCategory::all() {
        let result = handle
            .classify(&category_sample(&format!("SAMPLE-{}", category), category))
            .unwrap();
        assert_eq!(result.category, category);
        assert!(result.confidence > 0.5);
        assert!(result.confidence <= 1.0);
    }
}

#[test]
fn test_metadata_records_training() {
    let handle = ClassifierHandle::new();
    let metadata = handle.train(&labeled_set(10), &small_model_config()).unwrap();

    assert_eq!(metadata.n_features, 6);
    // Holdout rows are not used for fitting
    assert!(metadata.n_training_samples < 50);
    assert!(metadata.validation_metrics.is_some());
    assert_eq!(metadata.hyperparameters.get("seed").map(String::as_str), Some("42"));
}

#[test]
fn test_same_seed_same_predictions() {
    let config = small_model_config();
    let first = train_model(&labeled_set(8), &config).unwrap();
    let second = train_model(&labeled_set(8), &config).unwrap();

    for category in IssueCategory::all() {
        let incident = category_sample("P", category);
        assert_eq!(
            first.classify(&incident).unwrap(),
            second.classify(&incident).unwrap()
        );
    }
}

#[test]
fn test_save_load_fidelity() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("model/classifier.json");

    let original = ClassifierHandle::new();
    original.train(&labeled_set(8), &small_model_config()).unwrap();
    original.save(&path).unwrap();

    let restored = ClassifierHandle::new();
    let metadata = restored.load(&path).unwrap();
    assert_eq!(&metadata, original.current().unwrap().metadata());

    let mut samples: Vec<_> = IssueCategory::all().map(|c| category_sample("P", c)).collect();
    // Error code never seen in training
    let mut unseen = category_sample("UNSEEN", IssueCategory::CashOut);
    unseen.error_code = "E999".to_string();
    samples.push(unseen);

    for incident in &samples {
        assert_eq!(
            original.classify(incident).unwrap(),
            restored.classify(incident).unwrap()
        );
    }
}

#[test]
fn test_corrupt_artifact_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("classifier.json");

    let model = train_model(&labeled_set(6), &small_model_config()).unwrap();
    artifact::save(&model, &path).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, contents.replacen("E001", "E00X", 1)).unwrap();

    let handle = ClassifierHandle::new();
    assert!(matches!(
        handle.load(&path),
        Err(TriageError::Persistence { .. })
    ));
    assert!(!handle.is_ready());
}

#[test]
fn test_retrain_swaps_model() {
    let handle = ClassifierHandle::new();
    handle.train(&labeled_set(6), &small_model_config()).unwrap();
    let before = handle.current().unwrap();

    let config = ModelConfig {
        seed: 7,
        ..small_model_config()
    };
    handle.train(&labeled_set(8), &config).unwrap();
    let after = handle.current().unwrap();

    assert_eq!(before.metadata().hyperparameters["seed"], "42");
    assert_eq!(after.metadata().hyperparameters["seed"], "7");
}

#[test]
fn test_invalid_label_rejected() {
    let mut labeled = labeled_set(4);
    labeled.push(LabeledIncident {
        incident: common::incident("BAD-LABEL"),
        issue_type: "paper_jam".to_string(),
    });

    match train_model(&labeled, &small_model_config()) {
        Err(TriageError::InvalidLabel { incident_id, label }) => {
            assert_eq!(incident_id, "BAD-LABEL");
            assert_eq!(label, "paper_jam");
        }
        other => panic!("expected InvalidLabel, got {:?}", other),
    }
}

#[test]
fn test_classify_before_training() {
    let handle = ClassifierHandle::new();
    assert!(matches!(
        handle.classify(&common::incident("INC-1")),
        Err(TriageError::ModelNotReady { .. })
    ));
}
