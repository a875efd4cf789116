use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::TriageError;
use crate::models::{EnrichedIncident, TriageTicket};
use crate::processing::summary::TriageSummary;

/// Why one incident of a batch produced no result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentFailure {
    pub incident_id: String,
    pub error_code: String,
    pub message: String,
}

impl IncidentFailure {
    pub fn from_error(incident_id: impl Into<String>, error: &TriageError) -> Self {
        Self {
            incident_id: incident_id.into(),
            error_code: error.error_code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Output of one batch: ranked results and per-incident failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageRun {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,

    /// Successful incidents, most urgent first
    pub results: Vec<EnrichedIncident>,

    /// Failed incidents keyed by identifier
    pub failures: BTreeMap<String, IncidentFailure>,

    /// Records submitted, counting every occurrence of a duplicate identifier
    #[serde(default)]
    pub submitted: usize,
}

impl TriageRun {
    /// Assemble a run, ranking results
    pub fn new(
        mut results: Vec<EnrichedIncident>,
        failures: BTreeMap<String, IncidentFailure>,
    ) -> Self {
        results.sort_by(rank);
        let submitted = results.len() + failures.len();
        Self {
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
            results,
            failures,
            submitted,
        }
    }

    /// Record how many records were submitted for this run
    pub fn with_submitted(mut self, submitted: usize) -> Self {
        self.submitted = submitted;
        self
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), BTreeMap::new())
    }

    /// Look up a triaged incident by identifier
    pub fn get(&self, incident_id: &str) -> Option<&EnrichedIncident> {
        self.results
            .iter()
            .find(|result| result.incident_id() == incident_id)
    }

    pub fn failure(&self, incident_id: &str) -> Option<&IncidentFailure> {
        self.failures.get(incident_id)
    }

    /// Flat export rows in rank order
    pub fn tickets(&self) -> Vec<TriageTicket> {
        self.results.iter().map(EnrichedIncident::to_ticket).collect()
    }

    pub fn summary(&self) -> TriageSummary {
        TriageSummary::from_run(self)
    }

    /// Number of records submitted
    pub fn total(&self) -> usize {
        self.submitted.max(self.results.len() + self.failures.len())
    }
}

/// Escalated first, then impact descending, then identifier
pub fn rank(a: &EnrichedIncident, b: &EnrichedIncident) -> Ordering {
    b.escalation
        .is_escalated()
        .cmp(&a.escalation.is_escalated())
        .then_with(|| b.impact.value.total_cmp(&a.impact.value))
        .then_with(|| a.incident_id().cmp(b.incident_id()))
}
