use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::config::ModelConfig;
use crate::error::{Result, TriageError};
use crate::metrics::{MODEL_ACCURACY, MODEL_INSTALLS_TOTAL, STAGE_DURATION_SECONDS};
use crate::ml::artifact::{self, RetryPolicy};
use crate::ml::classifier::{IssuePredictor, RandomForestClassifier};
use crate::ml::features::FeatureEncoder;
use crate::ml::models::{ForestParameters, ModelMetadata, TrainingDataset};
use crate::models::{ClassificationResult, Incident, IssueCategory, LabeledIncident};

/// An encoder paired with the predictor fitted on its output.
///
/// Immutable once built; retraining produces a new `TrainedModel`.
pub struct TrainedModel {
    encoder: FeatureEncoder,
    predictor: Arc<dyn IssuePredictor>,
}

impl TrainedModel {
    pub fn new(encoder: FeatureEncoder, predictor: Arc<dyn IssuePredictor>) -> Self {
        Self { encoder, predictor }
    }

    /// Predict the issue category of one incident
    pub fn classify(&self, incident: &Incident) -> Result<ClassificationResult> {
        let features = self.encoder.transform(incident)?;
        let prediction = self.predictor.predict(&features)?;
        let category = IssueCategory::from_label(&prediction.value, "classifier output")?;

        Ok(ClassificationResult {
            incident_id: incident.incident_id.clone(),
            category,
            confidence: prediction.confidence,
            probabilities: prediction.probabilities,
        })
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn predictor(&self) -> &Arc<dyn IssuePredictor> {
        &self.predictor
    }

    pub fn metadata(&self) -> &ModelMetadata {
        self.predictor.metadata()
    }
}

impl std::fmt::Debug for TrainedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainedModel")
            .field("encoder", &self.encoder)
            .field("model_type", &self.metadata().model_type)
            .finish()
    }
}

/// Fit a new model on labeled incidents.
///
/// Holds out a stratified `test_fraction` of each category for evaluation;
/// the forest is fitted on the remainder.
#[instrument(skip(labeled, config), fields(n_samples = labeled.len()))]
pub fn train_model(labeled: &[LabeledIncident], config: &ModelConfig) -> Result<TrainedModel> {
    let started = Instant::now();

    if labeled.is_empty() || labeled.len() < config.min_training_samples {
        return Err(TriageError::InsufficientData {
            operation: "train".to_string(),
            message: format!(
                "{} labeled incidents, at least {} required",
                labeled.len(),
                config.min_training_samples.max(1)
            ),
        });
    }

    let labels = labeled
        .iter()
        .map(|sample| {
            sample
                .issue_type
                .parse::<IssueCategory>()
                .map(IssueCategory::index)
                .map_err(|_| TriageError::InvalidLabel {
                    incident_id: sample.incident.incident_id.clone(),
                    label: sample.issue_type.clone(),
                })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut encoder = FeatureEncoder::new();
    encoder.fit(labeled.iter().map(|sample| &sample.incident));

    let rows = labeled
        .iter()
        .map(|sample| encoder.transform(&sample.incident))
        .collect::<Result<Vec<_>>>()?;

    let dataset = TrainingDataset::from_rows(&rows, labels)?;
    let (train, test) = dataset.stratified_split(config.test_fraction, config.seed);

    let mut forest = RandomForestClassifier::fit(&train, ForestParameters::from(config))?;

    if test.n_samples > 0 {
        let metrics = forest.evaluate(&test)?;
        info!(
            accuracy = metrics.accuracy,
            n_test = test.n_samples,
            "Holdout evaluation complete"
        );
        MODEL_ACCURACY.set(metrics.accuracy);
        forest.set_validation_metrics(metrics);
    } else {
        warn!("Training set too small for a holdout split; skipping evaluation");
    }

    STAGE_DURATION_SECONDS
        .with_label_values(&["train"])
        .observe(started.elapsed().as_secs_f64());

    info!(
        n_train = train.n_samples,
        n_error_codes = encoder.error_codes().len(),
        "Classifier trained"
    );

    Ok(TrainedModel::new(encoder, Arc::new(forest)))
}

/// Shared, swappable reference to the active model.
///
/// Readers clone the inner `Arc` and release the lock before predicting, so
/// an in-flight batch keeps using the model it started with.
#[derive(Debug, Default)]
pub struct ClassifierHandle {
    current: RwLock<Option<Arc<TrainedModel>>>,
    retry: RetryPolicy,
}

impl ClassifierHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty handle whose artifact I/O follows the configured retry schedule
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            current: RwLock::new(None),
            retry: RetryPolicy::from_config(config),
        }
    }

    pub fn with_model(model: TrainedModel) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(model))),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Swap in a new model, returning the previous one
    pub fn install(&self, model: TrainedModel) -> Option<Arc<TrainedModel>> {
        self.current.write().replace(Arc::new(model))
    }

    /// The active model, or `ModelNotReady`
    pub fn current(&self) -> Result<Arc<TrainedModel>> {
        self.current
            .read()
            .clone()
            .ok_or_else(|| TriageError::model_not_ready("classify"))
    }

    pub fn is_ready(&self) -> bool {
        self.current.read().is_some()
    }

    /// Train on labeled incidents and install the result
    pub fn train(&self, labeled: &[LabeledIncident], config: &ModelConfig) -> Result<ModelMetadata> {
        let model = train_model(labeled, config)?;
        let metadata = model.metadata().clone();
        self.install(model);
        MODEL_INSTALLS_TOTAL.with_label_values(&["trained"]).inc();
        Ok(metadata)
    }

    /// Predict one incident with the active model
    pub fn classify(&self, incident: &Incident) -> Result<ClassificationResult> {
        self.current()?.classify(incident)
    }

    /// Persist the active model
    pub fn save(&self, path: &Path) -> Result<()> {
        let model = self
            .current
            .read()
            .clone()
            .ok_or_else(|| TriageError::model_not_ready("save_model"))?;
        artifact::save_with(&model, path, self.retry)
    }

    /// Load a model artifact and install it
    pub fn load(&self, path: &Path) -> Result<ModelMetadata> {
        let model = artifact::load_with(path, self.retry)?;
        let metadata = model.metadata().clone();
        self.install(model);
        MODEL_INSTALLS_TOTAL.with_label_values(&["loaded"]).inc();
        info!(path = %path.display(), "Classifier loaded");
        Ok(metadata)
    }
}
