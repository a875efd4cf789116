//! Decoding of incident batches delivered as JSON arrays.
//!
//! A malformed element fails only itself; the batch is rejected as a whole
//! only when the payload is not a JSON array.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;
use tracing::warn;

use crate::error::{Result, TriageError};
use crate::models::{IncidentRecord, LabeledIncident, LabeledRecord};

/// Records that decoded, and the identifiers of those that did not
#[derive(Debug)]
pub struct IngestOutcome<T> {
    pub records: Vec<T>,
    pub failures: Vec<(String, TriageError)>,
}

impl<T> IngestOutcome<T> {
    pub fn len(&self) -> usize {
        self.records.len() + self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Identifier used for a record that carries none
pub fn fallback_id(index: usize) -> String {
    format!("record-{}", index)
}

/// Decode a JSON array of incident records
pub fn parse_batch(json: &str) -> Result<IngestOutcome<IncidentRecord>> {
    parse_array(json)
}

/// Decode a JSON array of labeled training records
pub fn parse_labeled(json: &str) -> Result<IngestOutcome<LabeledRecord>> {
    parse_array(json)
}

pub fn read_batch(path: &Path) -> Result<IngestOutcome<IncidentRecord>> {
    parse_batch(&std::fs::read_to_string(path)?)
}

pub fn read_labeled(path: &Path) -> Result<IngestOutcome<LabeledRecord>> {
    parse_labeled(&std::fs::read_to_string(path)?)
}

/// Validate labeled records, dropping those with invalid attributes.
///
/// Labels are not checked here; training rejects unknown labels.
pub fn into_training_set(
    outcome: IngestOutcome<LabeledRecord>,
    complaint_weight: f64,
) -> (Vec<LabeledIncident>, Vec<(String, TriageError)>) {
    let mut failures = outcome.failures;
    let mut labeled = Vec::with_capacity(outcome.records.len());

    for record in outcome.records {
        let id = record.record.incident_id.clone();
        match record.into_labeled(complaint_weight) {
            Ok(incident) => labeled.push(incident),
            Err(error) => {
                warn!(incident_id = %id, error = %error, "Skipping training record");
                failures.push((id, error));
            }
        }
    }

    (labeled, failures)
}

fn parse_array<T: DeserializeOwned>(json: &str) -> Result<IngestOutcome<T>> {
    let elements: Vec<Value> = serde_json::from_str(json)?;
    let mut outcome = IngestOutcome {
        records: Vec::with_capacity(elements.len()),
        failures: Vec::new(),
    };

    // Fallback ids use the position in the submitted array, so a decoded
    // record and a failed one never share an identifier
    for (index, mut element) in elements.into_iter().enumerate() {
        let id = element
            .get("incident_id")
            .and_then(Value::as_str)
            .filter(|id| !id.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| fallback_id(index));
        if let Value::Object(fields) = &mut element {
            fields.insert("incident_id".to_string(), Value::String(id.clone()));
        }

        match serde_json::from_value::<T>(element) {
            Ok(record) => outcome.records.push(record),
            Err(e) => outcome
                .failures
                .push((id.clone(), TriageError::invalid_attribute(id, "record", e.to_string()))),
        }
    }

    Ok(outcome)
}
