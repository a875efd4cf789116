//! Triage engine for ATM and payment-terminal incidents.
//!
//! Incidents are classified into an issue category, scored for financial
//! impact, matched to a remediation action, checked against escalation
//! thresholds and gated for automated handling. Technicians report back
//! through an append-only feedback log.

pub mod actions;
pub mod api;
pub mod automation;
pub mod config;
pub mod error;
pub mod escalation;
pub mod feedback;
pub mod ingest;
pub mod metrics;
pub mod ml;
pub mod models;
pub mod processing;
pub mod scoring;
pub mod telemetry;

pub use error::{FeedbackRejected, Result, TriageError};
