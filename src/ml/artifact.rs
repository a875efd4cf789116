use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ModelConfig;
use crate::error::{Result, TriageError};
use crate::ml::classifier::{ForestSnapshot, RandomForestClassifier};
use crate::ml::features::FeatureEncoder;
use crate::ml::service::TrainedModel;

/// Current on-disk layout
pub const FORMAT_VERSION: u32 = 1;

/// Checksummed content of a model artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactPayload {
    /// Error code -> ordinal, as fitted by the encoder
    pub error_codes: BTreeMap<String, usize>,

    /// Parameters, training rows and metadata of the forest
    pub forest: ForestSnapshot,
}

/// Versioned model file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,

    /// Hex SHA-256 of the serialized payload
    pub checksum: String,

    pub payload: ArtifactPayload,
}

impl ModelArtifact {
    pub fn from_model(model: &TrainedModel) -> Result<Self> {
        let forest = model.predictor().snapshot().ok_or_else(|| {
            TriageError::persistence("save_model", "active predictor cannot be persisted")
        })?;

        let payload = ArtifactPayload {
            error_codes: model.encoder().error_codes().clone(),
            forest,
        };
        let checksum = checksum(&payload)?;

        Ok(Self {
            format_version: FORMAT_VERSION,
            checksum,
            payload,
        })
    }

    /// Check version and checksum
    pub fn verify(&self) -> Result<()> {
        if self.format_version != FORMAT_VERSION {
            return Err(TriageError::persistence(
                "load_model",
                format!(
                    "unsupported artifact format version {} (expected {})",
                    self.format_version, FORMAT_VERSION
                ),
            ));
        }

        let actual = checksum(&self.payload)?;
        if actual != self.checksum {
            return Err(TriageError::persistence(
                "load_model",
                format!("checksum mismatch: recorded {}, computed {}", self.checksum, actual),
            ));
        }
        Ok(())
    }

    /// Verify and rebuild the model
    pub fn into_model(self) -> Result<TrainedModel> {
        self.verify()?;
        let encoder = FeatureEncoder::from_error_codes(self.payload.error_codes);
        let forest = RandomForestClassifier::restore(self.payload.forest)
            .map_err(|e| TriageError::persistence("load_model", e))?;
        Ok(TrainedModel::new(encoder, Arc::new(forest)))
    }
}

fn checksum(payload: &ArtifactPayload) -> Result<String> {
    let bytes = serde_json::to_vec(payload)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Bounded retry schedule for artifact file I/O
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,

    /// Base backoff, doubled per attempt
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_ms: u64) -> Self {
        Self {
            max_retries,
            backoff: Duration::from_millis(backoff_ms),
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(config.max_retries, config.retry_backoff_ms)
    }

    /// A single attempt
    pub fn none() -> Self {
        Self::new(0, 0)
    }

    /// Run `attempt` until it succeeds or retries are exhausted
    fn run<T>(
        &self,
        operation: &str,
        path: &Path,
        mut attempt: impl FnMut() -> std::io::Result<T>,
    ) -> Result<T> {
        let mut attempts = 0;
        loop {
            if attempts > 0 {
                std::thread::sleep(self.backoff * 2u32.saturating_pow(attempts - 1));
            }

            match attempt() {
                Ok(value) => return Ok(value),
                Err(e) if attempts < self.max_retries => {
                    attempts += 1;
                    warn!(
                        path = %path.display(),
                        attempt = attempts,
                        error = %e,
                        "Model artifact {} failed, retrying", operation
                    );
                }
                Err(e) => return Err(TriageError::persistence(operation, e)),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ModelConfig::default())
    }
}

/// Write the model to `path`, replacing any previous artifact atomically
pub fn save(model: &TrainedModel, path: &Path) -> Result<()> {
    save_with(model, path, RetryPolicy::none())
}

/// [`save`] with file I/O retried under `retry`
pub fn save_with(model: &TrainedModel, path: &Path, retry: RetryPolicy) -> Result<()> {
    let artifact = ModelArtifact::from_model(model)?;
    let json = serde_json::to_vec_pretty(&artifact)?;
    let tmp = path.with_extension("tmp");

    // The temporary file is rewritten whole on every attempt, so a failed
    // attempt never leaves a partial artifact at `path`
    retry.run("save_model", path, || {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)
    })?;

    info!(
        path = %path.display(),
        checksum = %artifact.checksum,
        bytes = json.len(),
        "Model artifact saved"
    );
    Ok(())
}

/// Read, verify and rebuild a model artifact
pub fn load(path: &Path) -> Result<TrainedModel> {
    load_with(path, RetryPolicy::none())
}

/// [`load`] with the read retried under `retry`. Verification failures are
/// not retried.
pub fn load_with(path: &Path, retry: RetryPolicy) -> Result<TrainedModel> {
    let bytes = retry.run("load_model", path, || std::fs::read(path))?;
    let artifact: ModelArtifact = serde_json::from_slice(&bytes)
        .map_err(|e| TriageError::persistence("load_model", format!("malformed artifact: {}", e)))?;

    debug!(format_version = artifact.format_version, "Read model artifact");
    artifact.into_model()
}
