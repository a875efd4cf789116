use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, TriageError};
use crate::models::Incident;

/// Column order of the feature vector
pub const FEATURE_NAMES: [&str; 6] = [
    "hour_of_day",
    "transaction_volume",
    "avg_amount",
    "downtime_minutes",
    "complaint_count",
    "error_code",
];

/// Encoded value for an error code never seen during training
pub const UNSEEN_ERROR_CODE: f64 = -1.0;

/// Turns incidents into numeric feature vectors.
///
/// Error codes are encoded as their ordinal in the sorted set of codes seen
/// during fitting, so the same training set always yields the same encoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    /// Error code -> ordinal
    error_codes: BTreeMap<String, usize>,

    /// Is fitted
    is_fitted: bool,
}

impl FeatureEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild an encoder from a persisted error-code map
    pub fn from_error_codes(error_codes: BTreeMap<String, usize>) -> Self {
        Self {
            error_codes,
            is_fitted: true,
        }
    }

    /// Fit the error-code map on a set of incidents
    pub fn fit<'a, I>(&mut self, incidents: I)
    where
        I: IntoIterator<Item = &'a Incident>,
    {
        let mut codes: Vec<&str> = incidents
            .into_iter()
            .map(|incident| incident.error_code.as_str())
            .collect();
        codes.sort_unstable();
        codes.dedup();

        self.error_codes = codes
            .into_iter()
            .enumerate()
            .map(|(ordinal, code)| (code.to_string(), ordinal))
            .collect();
        self.is_fitted = true;
    }

    /// Transform a single incident
    pub fn transform(&self, incident: &Incident) -> Result<Vec<f64>> {
        if !self.is_fitted {
            return Err(TriageError::model_not_ready("feature_transform"));
        }

        let error_code = self
            .error_codes
            .get(&incident.error_code)
            .map(|&ordinal| ordinal as f64)
            .unwrap_or(UNSEEN_ERROR_CODE);

        Ok(vec![
            incident.hour_of_day as f64,
            incident.transaction_volume,
            incident.avg_amount,
            incident.downtime_minutes,
            incident.complaint_count as f64,
            error_code,
        ])
    }

    pub fn error_codes(&self) -> &BTreeMap<String, usize> {
        &self.error_codes
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn n_features(&self) -> usize {
        FEATURE_NAMES.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::incident::fixtures::incident;

    fn with_code(id: &str, code: &str) -> Incident {
        let mut incident = incident(id);
        incident.error_code = code.to_string();
        incident
    }

    #[test]
    fn test_transform_requires_fit() {
        let encoder = FeatureEncoder::new();
        assert!(matches!(
            encoder.transform(&incident("INC-1")),
            Err(TriageError::ModelNotReady { .. })
        ));
    }

    #[test]
    fn test_error_code_ordinals_are_sorted() {
        let incidents = vec![
            with_code("INC-1", "E030"),
            with_code("INC-2", "E001"),
            with_code("INC-3", "E030"),
            with_code("INC-4", "E010"),
        ];
        let mut encoder = FeatureEncoder::new();
        encoder.fit(&incidents);

        assert_eq!(encoder.error_codes().len(), 3);
        assert_eq!(encoder.error_codes()["E001"], 0);
        assert_eq!(encoder.error_codes()["E010"], 1);
        assert_eq!(encoder.error_codes()["E030"], 2);
    }

    #[test]
    fn test_transform_layout() {
        let incidents = vec![with_code("INC-1", "E001"), with_code("INC-2", "E002")];
        let mut encoder = FeatureEncoder::new();
        encoder.fit(&incidents);

        let features = encoder.transform(&incidents[1]).unwrap();
        assert_eq!(features.len(), encoder.n_features());
        assert_eq!(features, vec![14.0, 500.0, 2000.0, 90.0, 10.0, 1.0]);
    }

    #[test]
    fn test_unseen_code_encodes_sentinel() {
        let mut encoder = FeatureEncoder::new();
        encoder.fit(&[with_code("INC-1", "E001")]);

        let features = encoder.transform(&with_code("INC-2", "E999")).unwrap();
        assert_eq!(features[5], UNSEEN_ERROR_CODE);
    }
}
