use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::ModelConfig;
use crate::error::{Result, TriageError};
use crate::models::IssueCategory;

/// Ensemble hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParameters {
    /// Number of bootstrap trees
    pub n_trees: usize,

    /// Maximum depth of each tree
    pub max_depth: u16,

    /// Seed for bootstrap sampling
    pub seed: u64,
}

impl Default for ForestParameters {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            seed: 42,
        }
    }
}

impl From<&ModelConfig> for ForestParameters {
    fn from(config: &ModelConfig) -> Self {
        Self {
            n_trees: config.n_trees,
            max_depth: config.max_depth,
            seed: config.seed,
        }
    }
}

/// Prediction result with confidence score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction<T> {
    /// Predicted value
    pub value: T,

    /// Confidence score (0.0 - 1.0)
    pub confidence: f64,

    /// All class probabilities
    pub probabilities: BTreeMap<String, f64>,
}

impl<T> Prediction<T> {
    pub fn new(value: T, confidence: f64) -> Self {
        Self {
            value,
            confidence,
            probabilities: BTreeMap::new(),
        }
    }

    pub fn with_probabilities(mut self, probabilities: BTreeMap<String, f64>) -> Self {
        self.probabilities = probabilities;
        self
    }
}

/// Training dataset
#[derive(Debug, Clone)]
pub struct TrainingDataset {
    /// Feature matrix (n_samples × n_features)
    pub features: Array2<f64>,

    /// Class index per row
    pub labels: Vec<usize>,

    /// Number of samples
    pub n_samples: usize,

    /// Number of features
    pub n_features: usize,
}

impl TrainingDataset {
    /// Build a dataset from equally sized feature rows
    pub fn from_rows(rows: &[Vec<f64>], labels: Vec<usize>) -> Result<Self> {
        let n_samples = rows.len();
        let n_features = rows.first().map(|r| r.len()).unwrap_or(0);

        if labels.len() != n_samples {
            return Err(TriageError::InsufficientData {
                operation: "build_dataset".to_string(),
                message: format!("{} rows but {} labels", n_samples, labels.len()),
            });
        }

        let mut flat = Vec::with_capacity(n_samples * n_features);
        for row in rows {
            if row.len() != n_features {
                return Err(TriageError::Configuration(format!(
                    "feature row has {} values, expected {}",
                    row.len(),
                    n_features
                )));
            }
            flat.extend_from_slice(row);
        }

        let features = Array2::from_shape_vec((n_samples, n_features), flat)
            .map_err(|e| TriageError::Configuration(format!("feature matrix: {}", e)))?;

        Ok(Self {
            features,
            labels,
            n_samples,
            n_features,
        })
    }

    /// Number of distinct classes present
    pub fn n_distinct_classes(&self) -> usize {
        let mut seen: Vec<usize> = self.labels.clone();
        seen.sort_unstable();
        seen.dedup();
        seen.len()
    }

    /// Select rows by index
    pub fn subset(&self, indices: &[usize]) -> Self {
        let features = self.features.select(ndarray::Axis(0), indices);
        let labels = indices.iter().map(|&i| self.labels[i]).collect();
        Self {
            features,
            labels,
            n_samples: indices.len(),
            n_features: self.n_features,
        }
    }

    /// Split dataset into train/test sets, stratified by class.
    ///
    /// Every class keeps at least one row in the training side. Row order
    /// within each side follows the original dataset order.
    pub fn stratified_split(&self, test_size: f64, seed: u64) -> (TrainingDataset, TrainingDataset) {
        let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (row, &label) in self.labels.iter().enumerate() {
            by_class.entry(label).or_default().push(row);
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut train_idx = Vec::new();
        let mut test_idx = Vec::new();

        for rows in by_class.values() {
            let mut shuffled = rows.clone();
            shuffled.shuffle(&mut rng);

            let n_test = ((rows.len() as f64) * test_size).floor() as usize;
            let n_test = n_test.min(rows.len().saturating_sub(1));

            test_idx.extend_from_slice(&shuffled[..n_test]);
            train_idx.extend_from_slice(&shuffled[n_test..]);
        }

        train_idx.sort_unstable();
        test_idx.sort_unstable();

        (self.subset(&train_idx), self.subset(&test_idx))
    }
}

/// Model evaluation metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Accuracy
    pub accuracy: f64,

    /// Precision
    pub precision: f64,

    /// Recall
    pub recall: f64,

    /// F1 score
    pub f1_score: f64,

    /// Number of evaluated rows
    pub n_evaluated: usize,

    /// Per-class metrics keyed by category label
    pub per_class_metrics: BTreeMap<String, ClassMetrics>,
}

/// Per-class evaluation metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

impl ModelMetrics {
    pub fn new() -> Self {
        Self {
            accuracy: 0.0,
            precision: 0.0,
            recall: 0.0,
            f1_score: 0.0,
            n_evaluated: 0,
            per_class_metrics: BTreeMap::new(),
        }
    }
}

impl Default for ModelMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Compare true and predicted class indices.
///
/// Macro averages cover only the classes that appear in either vector.
pub fn calculate_metrics(y_true: &[usize], y_pred: &[usize]) -> ModelMetrics {
    let n_samples = y_true.len();
    if n_samples == 0 {
        return ModelMetrics::new();
    }

    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();
    let accuracy = correct as f64 / n_samples as f64;

    let mut per_class = BTreeMap::new();

    for category in IssueCategory::all() {
        let class_idx = category.index();
        let support = y_true.iter().filter(|&&t| t == class_idx).count();
        let predicted = y_pred.iter().filter(|&&p| p == class_idx).count();
        if support == 0 && predicted == 0 {
            continue;
        }

        let tp = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(t, p)| **t == class_idx && **p == class_idx)
            .count();
        let fp = predicted - tp;
        let fn_count = support - tp;

        let precision = if tp + fp > 0 {
            tp as f64 / (tp + fp) as f64
        } else {
            0.0
        };

        let recall = if tp + fn_count > 0 {
            tp as f64 / (tp + fn_count) as f64
        } else {
            0.0
        };

        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        per_class.insert(
            category.to_string(),
            ClassMetrics {
                precision,
                recall,
                f1_score: f1,
                support,
            },
        );
    }

    let n_classes = per_class.len().max(1) as f64;
    let avg_precision = per_class.values().map(|m| m.precision).sum::<f64>() / n_classes;
    let avg_recall = per_class.values().map(|m| m.recall).sum::<f64>() / n_classes;
    let avg_f1 = per_class.values().map(|m| m.f1_score).sum::<f64>() / n_classes;

    ModelMetrics {
        accuracy,
        precision: avg_precision,
        recall: avg_recall,
        f1_score: avg_f1,
        n_evaluated: n_samples,
        per_class_metrics: per_class,
    }
}

/// Model metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model name
    pub name: String,

    /// Model version
    pub version: String,

    /// Model type
    pub model_type: ModelType,

    /// Training timestamp
    pub trained_at: chrono::DateTime<chrono::Utc>,

    /// Number of training samples
    pub n_training_samples: usize,

    /// Number of features
    pub n_features: usize,

    /// Training metrics
    pub training_metrics: ModelMetrics,

    /// Holdout metrics
    pub validation_metrics: Option<ModelMetrics>,

    /// Hyperparameters
    pub hyperparameters: BTreeMap<String, String>,
}

/// Model type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Single CART tree
    DecisionTree,

    /// Bagged CART trees with majority vote
    RandomForest,
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelType::DecisionTree => write!(f, "Decision Tree"),
            ModelType::RandomForest => write!(f, "Random Forest"),
        }
    }
}
