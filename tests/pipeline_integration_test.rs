//! End-to-end tests for the triage pipeline
//!
//! These tests run real trained models through the processor:
//! - Impact, escalation and action for the reference incident
//! - Partial failures and ranking
//! - Systemic failures that abort a run
//! - Run summaries
//! - Ingested batches mixing decoded and undecodable records

mod common;

use atm_incident_triage::{
    actions::ActionTable,
    automation::AutomationGate,
    config::Config,
    escalation::EscalationEngine,
    ml::{ClassifierHandle, IssuePredictor, ModelMetadata, Prediction, TrainedModel},
    models::{
        EscalationReason, ImpactBand, IncidentRecord, IssueCategory, ResolutionMode,
    },
    ingest,
    processing::TriageProcessor,
    Result, TriageError,
};
use common::{category_sample, labeled_set, quiet_incident, record, small_model_config};
use std::sync::Arc;

fn trained_handle() -> Arc<ClassifierHandle> {
    let handle = ClassifierHandle::new();
    handle.train(&labeled_set(8), &small_model_config()).unwrap();
    Arc::new(handle)
}

fn processor() -> TriageProcessor {
    TriageProcessor::from_config(&Config::default(), trained_handle()).unwrap()
}

#[test]
fn test_reference_incident_end_to_end() {
    let processor = processor();
    let run = processor.process_records(vec![record("INC-1")]).unwrap();

    assert!(run.failures.is_empty());
    let result = run.get("INC-1").unwrap();

    assert_eq!(result.impact.value, 2_250_000.0);
    assert_eq!(result.impact.band, ImpactBand::Critical);
    assert!(result.escalation.is_escalated());
    assert_eq!(result.escalation.reasons, vec![EscalationReason::ImpactExceeded]);
    assert_eq!(result.automation.resolution_mode, ResolutionMode::ManualRequired);

    let expected = ActionTable::default()
        .recommend(result.classification.category)
        .unwrap()
        .clone();
    assert_eq!(result.action, expected);

    let ticket = &run.tickets()[0];
    assert_eq!(ticket.impact_score, 2_250_000.0);
    assert_eq!(ticket.responsible_team, expected.team);
}

#[test]
fn test_sampled_categories_route_to_their_teams() {
    let processor = processor();
    let incidents = IssueCategory::all()
        .map(|category| category_sample(&format!("P-{}", category), category))
        .collect();
    let run = processor.process(incidents).unwrap();

    let table = ActionTable::default();
    for category in IssueCategory::all() {
        let result = run.get(&format!("P-{}", category)).unwrap();
        assert_eq!(result.classification.category, category);
        assert_eq!(&result.action, table.recommend(category).unwrap());
    }
}

#[test]
fn test_invalid_record_fails_alone() {
    let processor = processor();
    let mut broken = record("INC-BROKEN");
    broken.avg_amount = None;
    let mut negative = record("INC-NEGATIVE");
    negative.downtime_minutes = Some(-5.0);

    let run = processor
        .process_records(vec![record("INC-1"), broken, negative, record("INC-2")])
        .unwrap();

    assert_eq!(run.results.len(), 2);
    assert_eq!(run.failures.len(), 2);
    let failure = run.failure("INC-BROKEN").unwrap();
    assert_eq!(failure.error_code, "INVALID_ATTRIBUTE");
    assert!(failure.message.contains("avg_amount"));
    assert!(run.failure("INC-NEGATIVE").is_some());
}

#[test]
fn test_ranking_is_input_order_independent() {
    let processor = processor();
    let incidents = vec![
        quiet_incident("Q-1", "ATM-1"),
        common::incident("HOT-1"),
        quiet_incident("Q-2", "ATM-2"),
        {
            let mut long_outage = quiet_incident("DOWN-1", "ATM-3");
            long_outage.downtime_minutes = 300.0;
            long_outage
        },
    ];
    let mut reversed = incidents.clone();
    reversed.reverse();

    let forward = processor.process(incidents).unwrap();
    let backward = processor.process(reversed).unwrap();

    let ids = |run: &atm_incident_triage::processing::TriageRun| -> Vec<String> {
        run.results
            .iter()
            .map(|r| r.incident_id().to_string())
            .collect()
    };
    assert_eq!(ids(&forward), ids(&backward));
    // Escalated incidents lead
    assert!(forward.results[0].escalation.is_escalated());
    assert!(forward.results[1].escalation.is_escalated());
    assert_eq!(forward.results[0].incident_id(), "HOT-1");
}

#[test]
fn test_sequential_matches_parallel() {
    let incidents: Vec<_> = (0..40)
        .map(|i| quiet_incident(&format!("Q-{}", i), &format!("ATM-{}", i % 7)))
        .collect();

    let handle = trained_handle();
    let parallel = TriageProcessor::from_config(&Config::default(), handle.clone()).unwrap();
    let sequential = TriageProcessor::from_config(&Config::default(), handle)
        .unwrap()
        .with_parallelism(false);

    let a = parallel.process(incidents.clone()).unwrap();
    let b = sequential.process(incidents).unwrap();
    assert_eq!(a.results, b.results);
}

#[test]
fn test_summary_reports_repeat_terminals() {
    let processor = processor();
    let run = processor
        .process(vec![
            quiet_incident("A", "ATM-7"),
            quiet_incident("B", "ATM-7"),
            quiet_incident("C", "ATM-8"),
            common::incident("D"),
        ])
        .unwrap();

    let summary = run.summary();
    assert_eq!(summary.total, 4);
    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.escalated, 1);
    assert_eq!(summary.repeat_terminals.len(), 1);
    assert_eq!(summary.repeat_terminals[0].atm_id, "ATM-7");
    assert_eq!(summary.repeat_terminals[0].incident_count, 2);
    assert!(summary.total_exposure >= 2_250_000.0);
}

#[test]
fn test_model_not_ready_aborts() {
    let processor =
        TriageProcessor::from_config(&Config::default(), Arc::new(ClassifierHandle::new()))
            .unwrap();
    assert!(matches!(
        processor.process_records(vec![record("INC-1")]),
        Err(TriageError::ModelNotReady { .. })
    ));
}

struct DriftedPredictor {
    metadata: ModelMetadata,
}

impl IssuePredictor for DriftedPredictor {
    fn predict(&self, _features: &[f64]) -> Result<Prediction<String>> {
        Ok(Prediction::new("paper_jam".to_string(), 0.9))
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}

#[test]
fn test_misconfigured_model_aborts_run() {
    let trained = trained_handle().current().unwrap();
    let drifted = TrainedModel::new(
        trained.encoder().clone(),
        Arc::new(DriftedPredictor {
            metadata: trained.metadata().clone(),
        }),
    );
    let processor = TriageProcessor::new(
        Arc::new(ClassifierHandle::with_model(drifted)),
        ActionTable::default(),
        EscalationEngine::default(),
        AutomationGate::default(),
    );

    let err = processor
        .process_records(vec![record("INC-1"), record("INC-2")])
        .unwrap_err();
    match err {
        TriageError::UnknownIssueCategory { category, .. } => assert_eq!(category, "paper_jam"),
        other => panic!("expected UnknownIssueCategory, got {:?}", other),
    }
}

#[test]
fn test_configured_thresholds_apply() {
    let mut config = Config::default();
    config.escalation.impact_threshold = 1_000.0;
    config.escalation.downtime_threshold_minutes = 10.0;

    let processor = TriageProcessor::from_config(&config, trained_handle()).unwrap();
    let run = processor
        .process(vec![quiet_incident("Q-1", "ATM-1")])
        .unwrap();

    let result = &run.results[0];
    // 10 x 100 x 0.5h = 500, below impact threshold; 30 minutes exceeds downtime
    assert_eq!(result.impact.value, 500.0);
    assert_eq!(
        result.escalation.reasons,
        vec![EscalationReason::DowntimeExceeded]
    );
}

#[test]
fn test_derived_complaint_multiplier() {
    let processor = processor();
    let record = IncidentRecord {
        complaint_multiplier: None,
        complaint_count: Some(20),
        ..record("INC-DERIVED")
    };
    let run = processor.process_records(vec![record]).unwrap();

    // 1 + 20 x 0.05 = 2.0
    assert_eq!(run.results[0].incident.complaint_multiplier, 2.0);
    assert_eq!(run.results[0].impact.value, 3_000_000.0);
}

#[test]
fn test_ingested_batch_keeps_fallback_ids_distinct() {
    let mut anonymous = serde_json::to_value(record("ignored")).unwrap();
    anonymous.as_object_mut().unwrap().remove("incident_id");
    let json = serde_json::json!([{"avg_amount": "lots"}, anonymous, {"atm_id": 7}]).to_string();

    let outcome = ingest::parse_batch(&json).unwrap();
    let run = processor()
        .process_ingested(outcome.records, outcome.failures)
        .unwrap();

    assert!(run.failure("record-0").is_some());
    assert!(run.get("record-1").is_some());
    assert!(run.failure("record-2").is_some());
    assert_eq!(run.total(), 3);
    assert_eq!(run.summary().total, 3);
}

#[test]
fn test_ingested_duplicate_with_failed_record() {
    let mut broken = serde_json::to_value(record("INC-1")).unwrap();
    broken["hour_of_day"] = serde_json::json!("noon");
    let json = serde_json::json!([broken, record("INC-1"), record("INC-2")]).to_string();

    let outcome = ingest::parse_batch(&json).unwrap();
    let run = processor()
        .process_ingested(outcome.records, outcome.failures)
        .unwrap();

    assert!(run.get("INC-1").is_none());
    assert!(run.failure("INC-1").unwrap().message.contains("duplicate"));
    assert!(run.get("INC-2").is_some());
    assert_eq!(run.total(), 3);
}
