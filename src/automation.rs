//! Eligibility gate for automated first-level remediation.
//!
//! Only low-risk incidents the classifier is confident about may be handed to
//! automation; everything else is routed to a human team.

use crate::config::AutomationConfig;
use crate::error::{Result, TriageError};
use crate::models::{
    AutomationAssessment, ClassificationResult, EscalationDecision, ImpactScore, Incident,
    ResolutionMode,
};

#[derive(Debug, Clone)]
pub struct AutomationGate {
    config: AutomationConfig,
}

impl Default for AutomationGate {
    fn default() -> Self {
        Self {
            config: AutomationConfig::default(),
        }
    }
}

impl AutomationGate {
    pub fn new(config: AutomationConfig) -> Result<Self> {
        if !(0.0..=1.0).contains(&config.min_confidence) {
            return Err(TriageError::Configuration(format!(
                "automation min_confidence {} is outside [0, 1]",
                config.min_confidence
            )));
        }
        if !config.max_impact.is_finite() || !config.max_downtime_minutes.is_finite() {
            return Err(TriageError::Configuration(
                "automation ceilings must be finite".to_string(),
            ));
        }
        Ok(Self { config })
    }

    /// Decide the resolution mode. The first failing check wins.
    pub fn assess(
        &self,
        incident: &Incident,
        classification: &ClassificationResult,
        impact: &ImpactScore,
        escalation: &EscalationDecision,
    ) -> AutomationAssessment {
        let c = &self.config;

        let blocked = if classification.confidence < c.min_confidence {
            Some(format!(
                "Classifier confidence {:.0}% is below the {:.0}% automation floor",
                classification.confidence * 100.0,
                c.min_confidence * 100.0
            ))
        } else if escalation.is_escalated() {
            Some("Incident is escalated; requires human authority".to_string())
        } else if impact.value > c.max_impact {
            Some(format!(
                "Impact {:.0} exceeds auto-remediation ceiling {:.0}",
                impact.value, c.max_impact
            ))
        } else if incident.downtime_minutes > c.max_downtime_minutes {
            Some(format!(
                "Downtime {}min exceeds auto-remediation limit {}min",
                incident.downtime_minutes, c.max_downtime_minutes
            ))
        } else if incident.complaint_count > c.max_complaints {
            Some(format!(
                "Complaint volume {} exceeds safe automation threshold {}",
                incident.complaint_count, c.max_complaints
            ))
        } else {
            None
        };

        match blocked {
            Some(reason) => AutomationAssessment {
                resolution_mode: ResolutionMode::ManualRequired,
                eligibility_reason: reason,
            },
            None => AutomationAssessment {
                resolution_mode: ResolutionMode::AutoEligible,
                eligibility_reason: "Eligible for automated first-level remediation".to_string(),
            },
        }
    }
}
