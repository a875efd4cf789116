use serde::{Deserialize, Serialize};

use crate::config::EscalationConfig;
use crate::error::{Result, TriageError};
use crate::models::{EscalationDecision, EscalationReason, EscalationStatus};

/// Exclusive escalation bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EscalationThresholds {
    /// Escalate when impact is strictly above this value
    pub impact: f64,

    /// Escalate when downtime is strictly above this many minutes
    pub downtime_minutes: f64,
}

impl Default for EscalationThresholds {
    fn default() -> Self {
        Self {
            impact: 100_000.0,
            downtime_minutes: 120.0,
        }
    }
}

impl From<&EscalationConfig> for EscalationThresholds {
    fn from(config: &EscalationConfig) -> Self {
        Self {
            impact: config.impact_threshold,
            downtime_minutes: config.downtime_threshold_minutes,
        }
    }
}

/// Rule-based escalation over (impact, downtime)
#[derive(Debug, Clone, Copy, Default)]
pub struct EscalationEngine {
    thresholds: EscalationThresholds,
}

impl EscalationEngine {
    pub fn new(thresholds: EscalationThresholds) -> Result<Self> {
        if !thresholds.impact.is_finite()
            || !thresholds.downtime_minutes.is_finite()
            || thresholds.impact < 0.0
            || thresholds.downtime_minutes < 0.0
        {
            return Err(TriageError::Configuration(format!(
                "escalation thresholds must be finite and non-negative: {:?}",
                thresholds
            )));
        }
        Ok(Self { thresholds })
    }

    pub fn from_config(config: &EscalationConfig) -> Result<Self> {
        Self::new(EscalationThresholds::from(config))
    }

    pub fn thresholds(&self) -> &EscalationThresholds {
        &self.thresholds
    }

    /// Escalate iff impact or downtime exceeds its threshold
    pub fn evaluate(&self, impact: f64, downtime_minutes: f64) -> EscalationDecision {
        let mut reasons = Vec::new();
        if impact > self.thresholds.impact {
            reasons.push(EscalationReason::ImpactExceeded);
        }
        if downtime_minutes > self.thresholds.downtime_minutes {
            reasons.push(EscalationReason::DowntimeExceeded);
        }

        let status = if reasons.is_empty() {
            EscalationStatus::Normal
        } else {
            EscalationStatus::Escalated
        };

        EscalationDecision { status, reasons }
    }
}
