use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};

use crate::models::{Incident, IssueCategory};

/// Classifier output for one incident
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub incident_id: String,
    pub category: IssueCategory,

    /// Vote share of the winning category (0.0 - 1.0)
    pub confidence: f64,

    /// Share per category label
    #[serde(default)]
    pub probabilities: BTreeMap<String, f64>,
}

/// Monetary exposure estimate for one incident
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactScore {
    pub incident_id: String,
    pub value: f64,
    pub band: ImpactBand,
}

/// Severity band of a monetary exposure
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ImpactBand {
    Low,
    Medium,
    High,
    Critical,
}

impl ImpactBand {
    pub fn from_value(value: f64) -> Self {
        if value >= 500_000.0 {
            ImpactBand::Critical
        } else if value >= 100_000.0 {
            ImpactBand::High
        } else if value >= 20_000.0 {
            ImpactBand::Medium
        } else {
            ImpactBand::Low
        }
    }
}

/// Remediation record for an issue category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecommendation {
    pub action: String,
    pub team: String,
    pub sla_minutes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EscalationStatus {
    Escalated,
    Normal,
}

/// Which threshold pushed an incident over the line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EscalationReason {
    ImpactExceeded,
    DowntimeExceeded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationDecision {
    pub status: EscalationStatus,
    #[serde(default)]
    pub reasons: Vec<EscalationReason>,
}

impl EscalationDecision {
    pub fn is_escalated(&self) -> bool {
        self.status == EscalationStatus::Escalated
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionMode {
    AutoEligible,
    ManualRequired,
}

/// Outcome of the automated first-level remediation gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationAssessment {
    pub resolution_mode: ResolutionMode,
    pub eligibility_reason: String,
}

/// Pipeline output record: one fully triaged incident
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedIncident {
    pub incident: Incident,
    pub classification: ClassificationResult,
    pub impact: ImpactScore,
    pub action: ActionRecommendation,
    pub escalation: EscalationDecision,
    pub automation: AutomationAssessment,
}

impl EnrichedIncident {
    pub fn incident_id(&self) -> &str {
        &self.incident.incident_id
    }

    /// Flatten into the documented export schema
    pub fn to_ticket(&self) -> TriageTicket {
        TriageTicket {
            incident_id: self.incident.incident_id.clone(),
            atm_id: self.incident.atm_id.clone(),
            location: self.incident.location.clone(),
            predicted_issue: self.classification.category,
            ml_confidence: self.classification.confidence,
            impact_score: self.impact.value,
            impact_band: self.impact.band,
            recommended_action: self.action.action.clone(),
            escalation_status: self.escalation.status,
            escalation_reasons: self.escalation.reasons.clone(),
            sla_minutes: self.action.sla_minutes,
            responsible_team: self.action.team.clone(),
            resolution_mode: self.automation.resolution_mode,
            eligibility_reason: self.automation.eligibility_reason.clone(),
        }
    }
}

/// Export row consumed by presentation and export collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageTicket {
    pub incident_id: String,
    pub atm_id: String,
    pub location: String,
    pub predicted_issue: IssueCategory,
    pub ml_confidence: f64,
    pub impact_score: f64,
    pub impact_band: ImpactBand,
    pub recommended_action: String,
    pub escalation_status: EscalationStatus,
    pub escalation_reasons: Vec<EscalationReason>,
    pub sla_minutes: u32,
    pub responsible_team: String,
    pub resolution_mode: ResolutionMode,
    pub eligibility_reason: String,
}
