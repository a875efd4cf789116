use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument};

use crate::actions::ActionTable;
use crate::automation::AutomationGate;
use crate::config::Config;
use crate::error::{Result, TriageError};
use crate::escalation::EscalationEngine;
use crate::metrics::{
    INCIDENTS_ESCALATED_TOTAL, INCIDENTS_PROCESSED_TOTAL, INCIDENT_FAILURES_TOTAL,
    RUNS_ABORTED_TOTAL, STAGE_DURATION_SECONDS,
};
use crate::ml::{ClassifierHandle, TrainedModel};
use crate::models::{EnrichedIncident, Incident, IncidentRecord};
use crate::processing::run::{IncidentFailure, TriageRun};
use crate::scoring::ImpactScorer;

/// A validated incident, or the identifier and error it failed with
type Validated = std::result::Result<Incident, (String, TriageError)>;

/// Runs incidents through classify → score → recommend → escalate → gate.
///
/// Incidents are independent. Each batch reads one model snapshot, so a
/// retrain during a batch does not change its results.
pub struct TriageProcessor {
    classifier: Arc<ClassifierHandle>,
    scorer: ImpactScorer,
    actions: Arc<ActionTable>,
    escalation: EscalationEngine,
    automation: AutomationGate,
    complaint_weight: f64,
    parallel: bool,
}

impl TriageProcessor {
    pub fn new(
        classifier: Arc<ClassifierHandle>,
        actions: ActionTable,
        escalation: EscalationEngine,
        automation: AutomationGate,
    ) -> Self {
        Self {
            classifier,
            scorer: ImpactScorer::new(),
            actions: Arc::new(actions),
            escalation,
            automation,
            complaint_weight: crate::config::ScoringConfig::default().complaint_weight,
            parallel: true,
        }
    }

    /// Build every stage from configuration
    pub fn from_config(config: &Config, classifier: Arc<ClassifierHandle>) -> Result<Self> {
        let actions = ActionTable::with_overrides(&config.actions)?;
        let escalation = EscalationEngine::from_config(&config.escalation)?;
        let automation = AutomationGate::new(config.automation.clone())?;

        let complaint_weight = config.scoring.complaint_weight;
        if !complaint_weight.is_finite() || complaint_weight < 0.0 {
            return Err(TriageError::Configuration(format!(
                "complaint_weight {} must be finite and non-negative",
                complaint_weight
            )));
        }

        Ok(Self::new(classifier, actions, escalation, automation)
            .with_complaint_weight(complaint_weight)
            .with_parallelism(config.processing.parallel))
    }

    pub fn with_complaint_weight(mut self, weight: f64) -> Self {
        self.complaint_weight = weight;
        self
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn classifier(&self) -> &Arc<ClassifierHandle> {
        &self.classifier
    }

    pub fn actions(&self) -> &ActionTable {
        &self.actions
    }

    pub fn complaint_weight(&self) -> f64 {
        self.complaint_weight
    }

    /// Triage a batch of validated incidents
    pub fn process(&self, incidents: Vec<Incident>) -> Result<TriageRun> {
        let submitted = incidents.len();
        let records = incidents.into_iter().map(Ok).collect();
        self.run_batch(records, submitted)
    }

    /// Validate and triage a batch of ingested records.
    ///
    /// Records failing validation are reported in the run's failures; the
    /// rest of the batch continues.
    pub fn process_records(&self, records: Vec<IncidentRecord>) -> Result<TriageRun> {
        self.process_ingested(records, Vec::new())
    }

    /// Triage ingested records together with failures found while parsing
    pub fn process_ingested(
        &self,
        records: Vec<IncidentRecord>,
        parse_failures: Vec<(String, TriageError)>,
    ) -> Result<TriageRun> {
        let weight = self.complaint_weight;
        let submitted = records.len() + parse_failures.len();

        // Parse failures join the batch so their identifiers take part in
        // duplicate detection
        let validated = parse_failures
            .into_iter()
            .map(Err)
            .chain(records.into_iter().map(|record| {
                let id = record.incident_id.clone();
                record.into_incident(weight).map_err(|e| (id, e))
            }))
            .collect();
        self.run_batch(validated, submitted)
    }

    /// Full pipeline for one incident against a model snapshot
    pub fn triage_one(&self, model: &TrainedModel, incident: Incident) -> Result<EnrichedIncident> {
        let impact = self.scorer.score(&incident)?;
        let classification = model.classify(&incident)?;
        let action = self.actions.recommend(classification.category)?.clone();
        let escalation = self
            .escalation
            .evaluate(impact.value, incident.downtime_minutes);
        let automation = self
            .automation
            .assess(&incident, &classification, &impact, &escalation);

        Ok(EnrichedIncident {
            incident,
            classification,
            impact,
            action,
            escalation,
            automation,
        })
    }

    #[instrument(skip(self, batch), fields(batch_size = batch.len()))]
    fn run_batch(&self, batch: Vec<Validated>, submitted: usize) -> Result<TriageRun> {
        let started = Instant::now();
        let mut failures = BTreeMap::new();

        let duplicates = duplicate_ids(&batch);
        for (id, count) in &duplicates {
            let error = TriageError::invalid_attribute(
                id.as_str(),
                "incident_id",
                format!("duplicate identifier appears {} times in batch", count),
            );
            record_failure(&mut failures, id, &error);
        }

        let needs_model = batch.iter().any(|item| {
            matches!(item, Ok(incident) if !duplicates.contains_key(&incident.incident_id))
        });
        if !needs_model {
            for (id, error) in batch.into_iter().filter_map(|item| item.err()) {
                record_failure(&mut failures, &id, &error);
            }
            return Ok(TriageRun::new(Vec::new(), failures).with_submitted(submitted));
        }

        let model = self.classifier.current().inspect_err(|_| {
            RUNS_ABORTED_TOTAL.inc();
        })?;

        let triage = |item: Validated| match item {
            Ok(incident) if duplicates.contains_key(&incident.incident_id) => None,
            Ok(incident) => {
                let id = incident.incident_id.clone();
                Some(self.triage_one(&model, incident).map_err(|e| (id, e)))
            }
            Err(failed) => Some(Err(failed)),
        };

        let outcomes: Vec<Option<std::result::Result<EnrichedIncident, (String, TriageError)>>> =
            if self.parallel {
                batch.into_par_iter().map(triage).collect()
            } else {
                batch.into_iter().map(triage).collect()
            };

        let mut results = Vec::with_capacity(outcomes.len());
        for outcome in outcomes.into_iter().flatten() {
            match outcome {
                Ok(enriched) => results.push(enriched),
                Err((id, error)) if error.is_systemic() => {
                    RUNS_ABORTED_TOTAL.inc();
                    error!(incident_id = %id, error = %error, "Aborting triage run");
                    return Err(error);
                }
                Err((id, error)) => {
                    debug!(incident_id = %id, error = %error, "Incident failed");
                    record_failure(&mut failures, &id, &error);
                }
            }
        }

        for result in &results {
            if result.escalation.is_escalated() {
                INCIDENTS_ESCALATED_TOTAL
                    .with_label_values(&[result.classification.category.as_ref()])
                    .inc();
            }
        }
        INCIDENTS_PROCESSED_TOTAL
            .with_label_values(&["success"])
            .inc_by(results.len() as u64);
        INCIDENTS_PROCESSED_TOTAL
            .with_label_values(&["failure"])
            .inc_by(failures.len() as u64);
        STAGE_DURATION_SECONDS
            .with_label_values(&["batch"])
            .observe(started.elapsed().as_secs_f64());

        let run = TriageRun::new(results, failures).with_submitted(submitted);
        info!(
            run_id = %run.run_id,
            succeeded = run.results.len(),
            failed = run.failures.len(),
            "Triage run complete"
        );
        Ok(run)
    }
}

fn record_failure(
    failures: &mut BTreeMap<String, IncidentFailure>,
    incident_id: &str,
    error: &TriageError,
) {
    INCIDENT_FAILURES_TOTAL
        .with_label_values(&[error.error_code()])
        .inc();
    failures
        .entry(incident_id.to_string())
        .or_insert_with(|| IncidentFailure::from_error(incident_id, error));
}

/// Identifiers that appear more than once, with their counts
fn duplicate_ids(
    batch: &[Validated],
) -> HashMap<String, usize> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for item in batch {
        let id = match item {
            Ok(incident) => incident.incident_id.as_str(),
            Err((id, _)) => id.as_str(),
        };
        *counts.entry(id.to_string()).or_default() += 1;
    }
    counts.retain(|_, count| *count > 1);
    counts
}
