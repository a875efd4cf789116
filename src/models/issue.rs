use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumCount, EnumIter, EnumString, IntoEnumIterator};

use crate::error::{Result, TriageError};

/// Failure categories a payment terminal incident can be classified into.
///
/// This single enumeration is shared by the classifier and the action table,
/// so a category the model knows is always a category the table knows.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter,
    EnumCount,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IssueCategory {
    NetworkFailure,
    CardDeclined,
    HardwareFault,
    CashOut,
    AuthTimeout,
}

impl IssueCategory {
    /// Parse a wire label, reporting drift as `UnknownIssueCategory`
    pub fn from_label(label: &str, context: &str) -> Result<Self> {
        label
            .parse::<IssueCategory>()
            .map_err(|_| TriageError::UnknownIssueCategory {
                category: label.to_string(),
                context: context.to_string(),
            })
    }

    /// Stable class index used by the model (declaration order)
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::iter().nth(index)
    }

    pub fn all() -> impl Iterator<Item = IssueCategory> {
        Self::iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_labels() {
        assert_eq!(IssueCategory::NetworkFailure.to_string(), "network_failure");
        assert_eq!(IssueCategory::CashOut.as_ref(), "cash_out");
        assert_eq!(
            "auth_timeout".parse::<IssueCategory>().unwrap(),
            IssueCategory::AuthTimeout
        );
        assert_eq!(
            serde_json::to_string(&IssueCategory::HardwareFault).unwrap(),
            "\"hardware_fault\""
        );
    }

    #[test]
    fn test_unknown_label_is_error() {
        let err = IssueCategory::from_label("paper_jam", "classifier output").unwrap_err();
        assert!(matches!(err, TriageError::UnknownIssueCategory { .. }));
    }

    #[test]
    fn test_index_round_trip() {
        assert_eq!(IssueCategory::COUNT, 5);
        for category in IssueCategory::all() {
            assert_eq!(IssueCategory::from_index(category.index()), Some(category));
        }
        assert_eq!(IssueCategory::from_index(IssueCategory::COUNT), None);
    }
}
