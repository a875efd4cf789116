use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

use crate::error::{FeedbackRejected, Result, TriageError};
use crate::feedback::FeedbackStore;
use crate::models::{FeedbackDraft, FeedbackEntry, IssueCategory};
use crate::processing::TriageRun;

/// Prediction accuracy as reported by technicians
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracySummary {
    /// Entries in the log
    pub total: usize,

    /// Entries carrying both a prediction and a correction
    pub evaluated: usize,

    pub correct: usize,

    /// Percentage of evaluated entries that confirmed the prediction, one decimal
    pub accuracy: Option<f64>,
}

/// Labeled pair for a retraining job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    pub incident_id: String,
    pub atm_id: Option<String>,
    pub predicted_issue: Option<IssueCategory>,
    pub corrected_issue: IssueCategory,
}

/// Binds technician feedback to triage runs and reports on the log
#[derive(Clone)]
pub struct FeedbackService {
    store: Arc<dyn FeedbackStore>,
}

impl FeedbackService {
    pub fn new(store: Arc<dyn FeedbackStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn FeedbackStore> {
        &self.store
    }

    /// Record feedback for an incident of `run`.
    ///
    /// The terminal and predicted category are taken from the run.
    #[instrument(skip(self, run, draft), fields(run_id = %run.run_id, incident_id = %draft.incident_id))]
    pub async fn submit_for_run(
        &self,
        run: &TriageRun,
        draft: FeedbackDraft,
    ) -> std::result::Result<FeedbackEntry, FeedbackRejected> {
        let validation = draft.validate();

        let mut entry = FeedbackEntry::new(draft.incident_id, draft.rating).with_notes(draft.notes);
        entry.corrected_issue = draft.corrected_issue;
        entry.resolution_time_minutes = draft.resolution_time_minutes;

        if let Err(e) = validation {
            let error = TriageError::invalid_attribute(&entry.incident_id, "feedback", e.to_string());
            return Err(FeedbackRejected { entry, error });
        }

        let Some(result) = run.get(&entry.incident_id) else {
            let error = TriageError::UnknownIncident {
                incident_id: entry.incident_id.clone(),
                operation: "submit_feedback".to_string(),
            };
            return Err(FeedbackRejected { entry, error });
        };

        entry.atm_id = Some(result.incident.atm_id.clone());
        entry.predicted_issue = Some(result.classification.category);

        self.store.submit(entry.clone()).await?;

        info!(
            rating = %entry.rating,
            prediction_correct = ?entry.prediction_correct(),
            "Feedback recorded"
        );
        Ok(entry)
    }

    /// Append an entry that is not bound to a run
    pub async fn submit(&self, entry: FeedbackEntry) -> std::result::Result<(), FeedbackRejected> {
        self.store.submit(entry).await
    }

    pub async fn entries(&self) -> Result<Vec<FeedbackEntry>> {
        self.store.load_all().await
    }

    pub async fn accuracy_summary(&self) -> Result<AccuracySummary> {
        Ok(summarize(&self.store.load_all().await?))
    }

    /// Entries where the technician named the actual category
    pub async fn corrections(&self) -> Result<Vec<Correction>> {
        Ok(self
            .store
            .load_all()
            .await?
            .into_iter()
            .filter_map(|entry| {
                entry.corrected_issue.map(|corrected_issue| Correction {
                    incident_id: entry.incident_id,
                    atm_id: entry.atm_id,
                    predicted_issue: entry.predicted_issue,
                    corrected_issue,
                })
            })
            .collect())
    }
}

fn summarize(entries: &[FeedbackEntry]) -> AccuracySummary {
    let judged: Vec<bool> = entries
        .iter()
        .filter_map(FeedbackEntry::prediction_correct)
        .collect();
    let correct = judged.iter().filter(|ok| **ok).count();

    let accuracy = if judged.is_empty() {
        None
    } else {
        Some((correct as f64 / judged.len() as f64 * 1000.0).round() / 10.0)
    };

    AccuracySummary {
        total: entries.len(),
        evaluated: judged.len(),
        correct,
        accuracy,
    }
}
