//! Shared fixtures for integration tests
#![allow(dead_code)]

use atm_incident_triage::{
    config::ModelConfig,
    models::{Incident, IncidentRecord, IssueCategory, LabeledIncident},
};

/// The reference incident: 500 transactions of 2000 over 90 minutes with
/// a 1.5 complaint multiplier, for an impact of 2 250 000
pub fn record(id: &str) -> IncidentRecord {
    IncidentRecord {
        incident_id: id.to_string(),
        atm_id: "ATM-1001".to_string(),
        location: "Mumbai Central".to_string(),
        hour_of_day: Some(14),
        transaction_volume: Some(500.0),
        avg_amount: Some(2000.0),
        downtime_minutes: Some(90.0),
        complaint_count: Some(10),
        complaint_multiplier: Some(1.5),
        error_code: "E001".to_string(),
    }
}

pub fn incident(id: &str) -> Incident {
    record(id).into_incident(0.05).unwrap()
}

/// Incident with small, non-escalating attributes
pub fn quiet_incident(id: &str, atm_id: &str) -> Incident {
    let mut inc = incident(id);
    inc.atm_id = atm_id.to_string();
    inc.transaction_volume = 10.0;
    inc.avg_amount = 100.0;
    inc.downtime_minutes = 30.0;
    inc.complaint_count = 1;
    inc.complaint_multiplier = 1.0;
    inc
}

/// Labeled incidents where error code and downtime identify the category
pub fn labeled_set(per_class: usize) -> Vec<LabeledIncident> {
    let mut out = Vec::new();
    for (class_idx, category) in IssueCategory::all().enumerate() {
        for i in 0..per_class {
            let mut inc = incident(&format!("TRAIN-{}-{}", class_idx, i));
            inc.error_code = format!("E{:03}", class_idx);
            inc.downtime_minutes = 20.0 * class_idx as f64 + (i % 3) as f64;
            out.push(LabeledIncident {
                incident: inc,
                issue_type: category.to_string(),
            });
        }
    }
    out
}

/// A sample that the trained model should place in `category`
pub fn category_sample(id: &str, category: IssueCategory) -> Incident {
    let mut inc = incident(id);
    inc.error_code = format!("E{:03}", category.index());
    inc.downtime_minutes = 20.0 * category.index() as f64 + 1.0;
    inc
}

pub fn small_model_config() -> ModelConfig {
    ModelConfig {
        n_trees: 15,
        max_depth: 6,
        ..ModelConfig::default()
    }
}
