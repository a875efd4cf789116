use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{Result, TriageError};

/// Incident record as delivered by the ingestion collaborator.
///
/// Numeric attributes are optional at this stage so that a missing field
/// fails only the incident that lacks it, not the whole batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncidentRecord {
    /// Unique identifier within a run
    #[serde(default)]
    pub incident_id: String,

    /// Terminal identifier
    #[serde(default)]
    pub atm_id: String,

    /// Human-readable location label
    #[serde(default)]
    pub location: String,

    pub hour_of_day: Option<u8>,
    pub transaction_volume: Option<f64>,
    pub avg_amount: Option<f64>,
    pub downtime_minutes: Option<f64>,
    pub complaint_count: Option<u32>,

    /// Explicit multiplier; derived from `complaint_count` when absent
    pub complaint_multiplier: Option<f64>,

    /// Terminal error code (e.g. "E001")
    #[serde(default)]
    pub error_code: String,
}

/// A validated incident, immutable for the duration of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Incident {
    #[validate(length(min = 1, max = 128))]
    pub incident_id: String,

    #[validate(length(min = 1, max = 128))]
    pub atm_id: String,

    pub location: String,

    #[validate(range(max = 23))]
    pub hour_of_day: u8,

    #[validate(range(min = 0.0))]
    pub transaction_volume: f64,

    #[validate(range(min = 0.0))]
    pub avg_amount: f64,

    #[validate(range(min = 0.0))]
    pub downtime_minutes: f64,

    pub complaint_count: u32,

    #[validate(range(min = 0.0))]
    pub complaint_multiplier: f64,

    pub error_code: String,
}

/// Incident carrying a ground-truth label for training
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledIncident {
    #[serde(flatten)]
    pub incident: Incident,

    /// Raw label; checked against the category enumeration at training time
    pub issue_type: String,
}

/// Training record as delivered by the ingestion collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledRecord {
    #[serde(flatten)]
    pub record: IncidentRecord,
    pub issue_type: String,
}

impl IncidentRecord {
    /// Validate presence and range of every attribute and freeze the incident
    pub fn into_incident(self, complaint_weight: f64) -> Result<Incident> {
        let id = self.incident_id.clone();

        let hour_of_day = self
            .hour_of_day
            .ok_or_else(|| missing(&id, "hour_of_day"))?;
        let transaction_volume =
            require_non_negative(&id, "transaction_volume", self.transaction_volume)?;
        let avg_amount = require_non_negative(&id, "avg_amount", self.avg_amount)?;
        let downtime_minutes =
            require_non_negative(&id, "downtime_minutes", self.downtime_minutes)?;
        let complaint_count = self
            .complaint_count
            .ok_or_else(|| missing(&id, "complaint_count"))?;

        let complaint_multiplier = match self.complaint_multiplier {
            Some(explicit) => require_non_negative(&id, "complaint_multiplier", Some(explicit))?,
            None => 1.0 + complaint_count as f64 * complaint_weight,
        };

        let incident = Incident {
            incident_id: self.incident_id,
            atm_id: self.atm_id,
            location: self.location,
            hour_of_day,
            transaction_volume,
            avg_amount,
            downtime_minutes,
            complaint_count,
            complaint_multiplier,
            error_code: self.error_code,
        };
        incident.check()?;
        Ok(incident)
    }
}

impl LabeledRecord {
    pub fn into_labeled(self, complaint_weight: f64) -> Result<LabeledIncident> {
        Ok(LabeledIncident {
            incident: self.record.into_incident(complaint_weight)?,
            issue_type: self.issue_type,
        })
    }
}

impl Incident {
    /// Run declarative validation, attributing failures to this incident
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| TriageError::invalid_attribute(&self.incident_id, "record", e.to_string()))
    }
}

fn missing(incident_id: &str, attribute: &str) -> TriageError {
    TriageError::invalid_attribute(incident_id, attribute, "required attribute is missing")
}

fn require_non_negative(incident_id: &str, attribute: &str, value: Option<f64>) -> Result<f64> {
    let value = value.ok_or_else(|| missing(incident_id, attribute))?;
    if !value.is_finite() {
        return Err(TriageError::invalid_attribute(
            incident_id,
            attribute,
            format!("value {} is not finite", value),
        ));
    }
    if value < 0.0 {
        return Err(TriageError::invalid_attribute(
            incident_id,
            attribute,
            format!("value {} is negative", value),
        ));
    }
    Ok(value)
}


#[cfg(test)]
mod tests {
    use super::fixtures::record;
    use super::*;

    #[test]
    fn test_record_into_incident() {
        let incident = record("INC-1").into_incident(0.05).unwrap();
        assert_eq!(incident.incident_id, "INC-1");
        assert_eq!(incident.complaint_multiplier, 1.5);
        assert_eq!(incident.downtime_minutes, 90.0);
    }

    #[test]
    fn test_multiplier_derived_from_complaints() {
        let mut rec = record("INC-2");
        rec.complaint_multiplier = None;
        rec.complaint_count = Some(20);
        let incident = rec.into_incident(0.05).unwrap();
        assert!((incident.complaint_multiplier - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_attribute_is_attributed() {
        let mut rec = record("INC-3");
        rec.avg_amount = None;
        match rec.into_incident(0.05).unwrap_err() {
            TriageError::InvalidAttribute {
                incident_id,
                attribute,
                ..
            } => {
                assert_eq!(incident_id, "INC-3");
                assert_eq!(attribute, "avg_amount");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_negative_and_non_finite_rejected() {
        let mut rec = record("INC-4");
        rec.downtime_minutes = Some(-5.0);
        assert!(matches!(
            rec.into_incident(0.05),
            Err(TriageError::InvalidAttribute { .. })
        ));

        let mut rec = record("INC-5");
        rec.transaction_volume = Some(f64::NAN);
        assert!(matches!(
            rec.into_incident(0.05),
            Err(TriageError::InvalidAttribute { .. })
        ));
    }

    #[test]
    fn test_schema_validation() {
        let mut rec = record("INC-6");
        rec.hour_of_day = Some(24);
        assert!(rec.into_incident(0.05).is_err());

        let mut rec = record("INC-7");
        rec.atm_id = String::new();
        assert!(rec.into_incident(0.05).is_err());
    }

    #[test]
    fn test_labeled_record_deserializes_flat() {
        let json = r#"{
            "incident_id": "INC-8", "atm_id": "ATM-2", "location": "Pune Market",
            "hour_of_day": 3, "transaction_volume": 40, "avg_amount": 900.5,
            "downtime_minutes": 30, "complaint_count": 4, "error_code": "E040",
            "issue_type": "auth_timeout"
        }"#;
        let labeled: LabeledRecord = serde_json::from_str(json).unwrap();
        let labeled = labeled.into_labeled(0.05).unwrap();
        assert_eq!(labeled.issue_type, "auth_timeout");
        assert_eq!(labeled.incident.error_code, "E040");
    }
}
