use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use validator::Validate;

use crate::models::IssueCategory;

/// Technician's judgement of the recommended action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActionRating {
    Helpful,
    Partial,
    NotHelpful,
}

/// One technician correction, as persisted in the feedback log.
///
/// Entries are written once and never updated. New fields must be optional
/// so older log lines keep deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub incident_id: String,

    #[serde(default)]
    pub atm_id: Option<String>,

    /// Category the pipeline predicted
    #[serde(default)]
    pub predicted_issue: Option<IssueCategory>,

    /// Category the technician observed, if different or confirmed
    #[serde(default)]
    pub corrected_issue: Option<IssueCategory>,

    pub rating: ActionRating,

    #[serde(default)]
    pub notes: String,

    #[serde(default)]
    pub resolution_time_minutes: Option<u32>,

    pub submitted_at: DateTime<Utc>,
}

impl FeedbackEntry {
    pub fn new(incident_id: impl Into<String>, rating: ActionRating) -> Self {
        Self {
            incident_id: incident_id.into(),
            atm_id: None,
            predicted_issue: None,
            corrected_issue: None,
            rating,
            notes: String::new(),
            resolution_time_minutes: None,
            submitted_at: Utc::now(),
        }
    }

    pub fn with_correction(mut self, category: IssueCategory) -> Self {
        self.corrected_issue = Some(category);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Whether the technician confirmed the prediction.
    ///
    /// `None` when either side is unknown.
    pub fn prediction_correct(&self) -> Option<bool> {
        match (self.predicted_issue, self.corrected_issue) {
            (Some(predicted), Some(actual)) => Some(predicted == actual),
            _ => None,
        }
    }
}

/// Feedback as submitted by the UI collaborator, before it is bound to a run
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FeedbackDraft {
    #[validate(length(min = 1, max = 128))]
    pub incident_id: String,

    #[serde(default)]
    pub corrected_issue: Option<IssueCategory>,

    pub rating: ActionRating,

    #[serde(default)]
    #[validate(length(max = 2000))]
    pub notes: String,

    #[serde(default)]
    pub resolution_time_minutes: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_correct() {
        let mut entry = FeedbackEntry::new("INC-1", ActionRating::Helpful);
        assert_eq!(entry.prediction_correct(), None);

        entry.predicted_issue = Some(IssueCategory::CashOut);
        entry.corrected_issue = Some(IssueCategory::CashOut);
        assert_eq!(entry.prediction_correct(), Some(true));

        entry.corrected_issue = Some(IssueCategory::HardwareFault);
        assert_eq!(entry.prediction_correct(), Some(false));
    }

    #[test]
    fn test_older_log_lines_still_parse() {
        let line = r#"{"incident_id":"INC-7","rating":"partial","submitted_at":"2026-01-02T03:04:05Z"}"#;
        let entry: FeedbackEntry = serde_json::from_str(line).unwrap();
        assert_eq!(entry.rating, ActionRating::Partial);
        assert!(entry.corrected_issue.is_none());
        assert!(entry.notes.is_empty());
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let line = r#"{"incident_id":"INC-8","rating":"helpful","submitted_at":"2026-01-02T03:04:05Z","reviewer":"amy"}"#;
        assert!(serde_json::from_str::<FeedbackEntry>(line).is_ok());
    }

    #[test]
    fn test_draft_validation() {
        let draft = FeedbackDraft {
            incident_id: String::new(),
            corrected_issue: None,
            rating: ActionRating::Helpful,
            notes: String::new(),
            resolution_time_minutes: None,
        };
        assert!(draft.validate().is_err());
    }
}
