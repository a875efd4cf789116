use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters, SplitCriterion,
};
use std::collections::BTreeMap;
use strum::EnumCount;
use tracing::debug;

use crate::error::{Result, TriageError};
use crate::ml::models::{
    calculate_metrics, ForestParameters, ModelMetadata, ModelMetrics, ModelType, Prediction,
    TrainingDataset,
};
use crate::models::IssueCategory;

/// Bootstrap redraws before a tree falls back to the full training set
const MAX_BOOTSTRAP_DRAWS: usize = 10;

type Tree = DecisionTreeClassifier<f64, i32, DenseMatrix<f64>, Vec<i32>>;

/// Capability every issue classifier provides.
///
/// Implementations return the category as a wire label. Callers check the
/// label against `IssueCategory`, so a model trained on a different label set
/// surfaces as `UnknownIssueCategory` instead of a silent mismatch.
pub trait IssuePredictor: Send + Sync {
    /// Predict the issue label for one feature vector
    fn predict(&self, features: &[f64]) -> Result<Prediction<String>>;

    /// Get model metadata
    fn metadata(&self) -> &ModelMetadata;

    /// Everything needed to rebuild this predictor, if it can be persisted
    fn snapshot(&self) -> Option<ForestSnapshot> {
        None
    }
}

/// Persistable description of a fitted forest.
///
/// Trees are not serialized. Refitting the stored rows with the stored
/// parameters reproduces the same trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestSnapshot {
    pub parameters: ForestParameters,
    pub n_features: usize,
    pub rows: Vec<Vec<f64>>,
    pub labels: Vec<usize>,
    pub metadata: ModelMetadata,
}

/// Bagged ensemble of CART trees with majority vote
pub struct RandomForestClassifier {
    /// Model metadata
    metadata: ModelMetadata,

    /// Fitted trees, in seed order
    trees: Vec<Tree>,

    /// Hyperparameters
    parameters: ForestParameters,

    /// Rows the forest was fitted on
    dataset: TrainingDataset,
}

impl RandomForestClassifier {
    /// Fit a forest on a dataset
    pub fn fit(dataset: &TrainingDataset, parameters: ForestParameters) -> Result<Self> {
        if parameters.n_trees == 0 {
            return Err(TriageError::Configuration(
                "n_trees must be at least 1".to_string(),
            ));
        }
        if dataset.n_distinct_classes() < 2 {
            return Err(TriageError::InsufficientData {
                operation: "train".to_string(),
                message: "at least two distinct issue categories are required".to_string(),
            });
        }
        if let Some(&label) = dataset.labels.iter().find(|&&l| l >= IssueCategory::COUNT) {
            return Err(TriageError::UnknownIssueCategory {
                category: format!("class_{}", label),
                context: "training labels".to_string(),
            });
        }

        let trees = (0..parameters.n_trees)
            .into_par_iter()
            .map(|tree_idx| fit_tree(dataset, &parameters, tree_idx))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            n_trees = trees.len(),
            n_samples = dataset.n_samples,
            "Fitted random forest"
        );

        let mut forest = Self {
            metadata: ModelMetadata {
                name: "Issue Classifier".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                model_type: ModelType::RandomForest,
                trained_at: chrono::Utc::now(),
                n_training_samples: dataset.n_samples,
                n_features: dataset.n_features,
                training_metrics: ModelMetrics::new(),
                validation_metrics: None,
                hyperparameters: [
                    ("n_trees".to_string(), parameters.n_trees.to_string()),
                    ("max_depth".to_string(), parameters.max_depth.to_string()),
                    ("seed".to_string(), parameters.seed.to_string()),
                ]
                .into_iter()
                .collect(),
            },
            trees,
            parameters,
            dataset: dataset.clone(),
        };

        forest.metadata.training_metrics = forest.evaluate(dataset)?;
        Ok(forest)
    }

    /// Rebuild a forest from a snapshot, restoring its recorded metadata
    pub fn restore(snapshot: ForestSnapshot) -> Result<Self> {
        if snapshot.rows.iter().any(|row| row.len() != snapshot.n_features) {
            return Err(TriageError::persistence(
                "restore_model",
                "stored rows do not match recorded feature count",
            ));
        }
        let dataset = TrainingDataset::from_rows(&snapshot.rows, snapshot.labels)?;
        let mut forest = Self::fit(&dataset, snapshot.parameters)?;
        forest.metadata = snapshot.metadata;
        Ok(forest)
    }

    /// Record holdout metrics on the metadata
    pub fn set_validation_metrics(&mut self, metrics: ModelMetrics) {
        self.metadata.validation_metrics = Some(metrics);
    }

    pub fn parameters(&self) -> &ForestParameters {
        &self.parameters
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Votes per class index for one feature vector
    pub fn votes(&self, features: &[f64]) -> Result<[usize; IssueCategory::COUNT]> {
        if features.len() != self.dataset.n_features {
            return Err(TriageError::Configuration(format!(
                "feature vector has {} values, model expects {}",
                features.len(),
                self.dataset.n_features
            )));
        }

        let x = DenseMatrix::new(1, features.len(), features.to_vec(), false);
        let mut votes = [0usize; IssueCategory::COUNT];

        for tree in &self.trees {
            let predicted = tree
                .predict(&x)
                .map_err(|e| TriageError::Configuration(format!("tree prediction failed: {}", e)))?;
            let class_idx = predicted.first().copied().unwrap_or(-1);
            let slot = usize::try_from(class_idx)
                .ok()
                .and_then(|idx| votes.get_mut(idx))
                .ok_or_else(|| TriageError::UnknownIssueCategory {
                    category: format!("class_{}", class_idx),
                    context: "tree vote".to_string(),
                })?;
            *slot += 1;
        }

        Ok(votes)
    }

    /// Winning class index; ties go to the lowest index
    pub fn predict_index(&self, features: &[f64]) -> Result<usize> {
        let votes = self.votes(features)?;
        Ok(winner(&votes))
    }

    /// Accuracy and per-class metrics on a dataset
    pub fn evaluate(&self, dataset: &TrainingDataset) -> Result<ModelMetrics> {
        let predictions = dataset
            .features
            .rows()
            .into_iter()
            .map(|row| self.predict_index(&row.to_vec()))
            .collect::<Result<Vec<_>>>()?;
        Ok(calculate_metrics(&dataset.labels, &predictions))
    }
}

impl IssuePredictor for RandomForestClassifier {
    fn predict(&self, features: &[f64]) -> Result<Prediction<String>> {
        let votes = self.votes(features)?;
        let n_trees = self.trees.len() as f64;
        let best = winner(&votes);

        let category =
            IssueCategory::from_index(best).ok_or_else(|| TriageError::UnknownIssueCategory {
                category: format!("class_{}", best),
                context: "forest vote".to_string(),
            })?;

        let probabilities: BTreeMap<String, f64> = IssueCategory::all()
            .map(|c| (c.to_string(), votes[c.index()] as f64 / n_trees))
            .collect();

        Ok(Prediction::new(category.to_string(), votes[best] as f64 / n_trees)
            .with_probabilities(probabilities))
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn snapshot(&self) -> Option<ForestSnapshot> {
        Some(ForestSnapshot {
            parameters: self.parameters.clone(),
            n_features: self.dataset.n_features,
            rows: self
                .dataset
                .features
                .rows()
                .into_iter()
                .map(|row| row.to_vec())
                .collect(),
            labels: self.dataset.labels.clone(),
            metadata: self.metadata.clone(),
        })
    }
}

fn winner(votes: &[usize]) -> usize {
    let mut best = 0;
    for (idx, &count) in votes.iter().enumerate() {
        if count > votes[best] {
            best = idx;
        }
    }
    best
}

fn fit_tree(dataset: &TrainingDataset, parameters: &ForestParameters, tree_idx: usize) -> Result<Tree> {
    let mut rng = StdRng::seed_from_u64(parameters.seed.wrapping_add(tree_idx as u64));
    let n = dataset.n_samples;

    let mut indices: Vec<usize> = Vec::new();
    for _ in 0..MAX_BOOTSTRAP_DRAWS {
        let draw: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
        let first = dataset.labels[draw[0]];
        if draw.iter().any(|&i| dataset.labels[i] != first) {
            indices = draw;
            break;
        }
    }
    // Trees need at least two classes to split on
    if indices.is_empty() {
        indices = (0..n).collect();
    }

    let sample = dataset.subset(&indices);
    let x = DenseMatrix::new(
        sample.n_samples,
        sample.n_features,
        sample.features.iter().copied().collect(),
        false,
    );
    let y: Vec<i32> = sample.labels.iter().map(|&l| l as i32).collect();

    let params = DecisionTreeClassifierParameters::default()
        .with_max_depth(parameters.max_depth)
        .with_criterion(SplitCriterion::Gini);

    DecisionTreeClassifier::fit(&x, &y, params).map_err(|e| TriageError::InsufficientData {
        operation: "train".to_string(),
        message: format!("failed to fit tree {}: {}", tree_idx, e),
    })
}
