use crate::error::{Result, TriageError};
use crate::models::{ImpactBand, ImpactScore, Incident};

/// Minutes per hour; downtime is priced in hours of lost volume
const MINUTES_PER_HOUR: f64 = 60.0;

/// Monetary exposure of an incident.
///
/// `impact = volume × amount × (downtime / 60) × complaint_multiplier`
///
/// No floor, clamp or rounding is applied, so equal inputs always give
/// bit-identical scores.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImpactScorer;

impl ImpactScorer {
    pub fn new() -> Self {
        Self
    }

    /// Score an incident
    pub fn score(&self, incident: &Incident) -> Result<ImpactScore> {
        let id = incident.incident_id.as_str();
        let volume = checked(id, "transaction_volume", incident.transaction_volume)?;
        let amount = checked(id, "avg_amount", incident.avg_amount)?;
        let downtime = checked(id, "downtime_minutes", incident.downtime_minutes)?;
        let multiplier = checked(id, "complaint_multiplier", incident.complaint_multiplier)?;

        let value = volume * amount * (downtime / MINUTES_PER_HOUR) * multiplier;
        if !value.is_finite() {
            return Err(TriageError::invalid_attribute(
                id,
                "impact",
                "attribute product overflows",
            ));
        }

        Ok(ImpactScore {
            incident_id: incident.incident_id.clone(),
            value,
            band: ImpactBand::from_value(value),
        })
    }
}

fn checked(incident_id: &str, attribute: &str, value: f64) -> Result<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(TriageError::invalid_attribute(
            incident_id,
            attribute,
            format!("value {} must be finite and non-negative", value),
        ));
    }
    Ok(value)
}
