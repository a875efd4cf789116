use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::ResolutionMode;
use crate::processing::run::TriageRun;

/// Terminal that reported more than one incident in a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatTerminal {
    pub atm_id: String,
    pub incident_count: usize,
}

/// Run-level KPIs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub escalated: usize,
    pub auto_eligible: usize,
    pub manual_required: usize,

    /// Sum of impact over successful incidents
    pub total_exposure: f64,

    /// Successful incidents per predicted category
    pub by_category: BTreeMap<String, usize>,

    /// Most incidents first, then terminal id
    pub repeat_terminals: Vec<RepeatTerminal>,
}

impl TriageSummary {
    pub fn from_run(run: &TriageRun) -> Self {
        let mut by_category: BTreeMap<String, usize> = BTreeMap::new();
        let mut per_terminal: BTreeMap<&str, usize> = BTreeMap::new();
        let mut escalated = 0;
        let mut auto_eligible = 0;
        let mut total_exposure = 0.0;

        for result in &run.results {
            *by_category
                .entry(result.classification.category.to_string())
                .or_default() += 1;
            *per_terminal.entry(result.incident.atm_id.as_str()).or_default() += 1;

            if result.escalation.is_escalated() {
                escalated += 1;
            }
            if result.automation.resolution_mode == ResolutionMode::AutoEligible {
                auto_eligible += 1;
            }
            total_exposure += result.impact.value;
        }

        let mut repeat_terminals: Vec<RepeatTerminal> = per_terminal
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(atm_id, incident_count)| RepeatTerminal {
                atm_id: atm_id.to_string(),
                incident_count,
            })
            .collect();
        repeat_terminals.sort_by(|a, b| {
            b.incident_count
                .cmp(&a.incident_count)
                .then_with(|| a.atm_id.cmp(&b.atm_id))
        });

        let succeeded = run.results.len();
        Self {
            total: run.total(),
            succeeded,
            failed: run.failures.len(),
            escalated,
            auto_eligible,
            manual_required: succeeded - auto_eligible,
            total_exposure,
            by_category,
            repeat_terminals,
        }
    }
}
