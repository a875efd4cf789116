/// Issue classification for terminal incidents
///
/// This module provides:
/// - Feature encoding of incident attributes
/// - A seeded random forest over smartcore decision trees
/// - The `IssuePredictor` capability trait
/// - A swappable handle to the active model
/// - Checksummed model artifacts
pub mod artifact;
pub mod classifier;
pub mod features;
pub mod models;
pub mod service;

pub use artifact::{ModelArtifact, RetryPolicy, FORMAT_VERSION};
pub use classifier::{ForestSnapshot, IssuePredictor, RandomForestClassifier};
pub use features::{FeatureEncoder, FEATURE_NAMES};
pub use models::{
    ClassMetrics, ForestParameters, ModelMetadata, ModelMetrics, ModelType, Prediction,
    TrainingDataset,
};
pub use service::{train_model, ClassifierHandle, TrainedModel};
