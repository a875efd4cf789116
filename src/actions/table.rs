use std::collections::BTreeMap;
use tracing::info;

use crate::error::{Result, TriageError};
use crate::models::{ActionRecommendation, IssueCategory};

/// Remediation lookup keyed by issue category.
///
/// Holds exactly one entry per category; construction fails otherwise, so
/// `recommend` on a known category cannot miss.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionTable {
    entries: BTreeMap<IssueCategory, ActionRecommendation>,
}

impl ActionTable {
    /// Build a table, checking completeness and entry sanity
    pub fn new(entries: BTreeMap<IssueCategory, ActionRecommendation>) -> Result<Self> {
        let missing: Vec<String> = IssueCategory::all()
            .filter(|category| !entries.contains_key(category))
            .map(|category| category.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(TriageError::Configuration(format!(
                "action table has no entry for: {}",
                missing.join(", ")
            )));
        }

        for (category, entry) in &entries {
            if entry.action.trim().is_empty() || entry.team.trim().is_empty() {
                return Err(TriageError::Configuration(format!(
                    "action table entry for {} needs an action and a team",
                    category
                )));
            }
            if entry.sla_minutes == 0 {
                return Err(TriageError::Configuration(format!(
                    "action table entry for {} needs a positive SLA",
                    category
                )));
            }
        }

        Ok(Self { entries })
    }

    /// Default table with configured entries layered on top.
    ///
    /// Override keys are category labels; an unknown label is a
    /// configuration drift and is reported as `UnknownIssueCategory`.
    pub fn with_overrides(overrides: &BTreeMap<String, ActionRecommendation>) -> Result<Self> {
        let mut entries = Self::default().entries;
        for (label, entry) in overrides {
            let category = IssueCategory::from_label(label, "action table override")?;
            entries.insert(category, entry.clone());
        }
        if !overrides.is_empty() {
            info!(overrides = overrides.len(), "Applied action table overrides");
        }
        Self::new(entries)
    }

    /// Recommendation for a category
    pub fn recommend(&self, category: IssueCategory) -> Result<&ActionRecommendation> {
        self.entries
            .get(&category)
            .ok_or_else(|| TriageError::UnknownIssueCategory {
                category: category.to_string(),
                context: "action table".to_string(),
            })
    }

    /// Recommendation for a wire label
    pub fn recommend_label(&self, label: &str) -> Result<&ActionRecommendation> {
        let category = IssueCategory::from_label(label, "action table")?;
        self.recommend(category)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&IssueCategory, &ActionRecommendation)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn entry(action: &str, team: &str, sla_minutes: u32) -> ActionRecommendation {
    ActionRecommendation {
        action: action.to_string(),
        team: team.to_string(),
        sla_minutes,
    }
}

impl Default for ActionTable {
    fn default() -> Self {
        let entries = IssueCategory::all()
            .map(|category| {
                let record = match category {
                    IssueCategory::NetworkFailure => entry(
                        "Restart network interface; verify ISP connectivity; check firewall rules.",
                        "Network Operations",
                        30,
                    ),
                    IssueCategory::CardDeclined => entry(
                        "Check card processor gateway status; review decline reason codes; contact issuing bank if batch failure.",
                        "Payments Team",
                        15,
                    ),
                    IssueCategory::HardwareFault => entry(
                        "Dispatch field technician immediately; run hardware diagnostics; check card reader & dispensing mechanism.",
                        "Field Maintenance",
                        60,
                    ),
                    IssueCategory::CashOut => entry(
                        "Schedule emergency cash replenishment; notify branch manager; temporarily disable cash withdrawal.",
                        "Cash Management",
                        45,
                    ),
                    IssueCategory::AuthTimeout => entry(
                        "Check authentication server latency; review API timeout configs; increase retry window.",
                        "Backend Engineering",
                        20,
                    ),
                };
                (category, record)
            })
            .collect();

        Self { entries }
    }
}
