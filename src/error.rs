use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::FeedbackEntry;

/// Triage error types
///
/// Every variant names the incident or the operation it originated from so
/// that no failure reaches a caller without attribution.
#[derive(Error, Debug)]
pub enum TriageError {
    /// Training set empty or too small to fit a stable model
    #[error("Insufficient training data for {operation}: {message}")]
    InsufficientData { operation: String, message: String },

    /// Training label outside the issue-category enumeration
    #[error("Invalid label '{label}' on incident {incident_id}")]
    InvalidLabel { incident_id: String, label: String },

    /// Prediction requested before a model was trained or loaded
    #[error("Model not ready for {operation}")]
    ModelNotReady { operation: String },

    /// Required numeric attribute missing, negative or non-finite
    #[error("Invalid attribute '{attribute}' on incident {incident_id}: {message}")]
    InvalidAttribute {
        incident_id: String,
        attribute: String,
        message: String,
    },

    /// Category produced by a model or table that the action table does not know
    #[error("Unknown issue category '{category}' ({context})")]
    UnknownIssueCategory { category: String, context: String },

    /// Incident identifier not present in the referenced run
    #[error("Unknown incident {incident_id} in {operation}")]
    UnknownIncident {
        incident_id: String,
        operation: String,
    },

    /// Triage run not retained by the server
    #[error("Unknown run {run_id}")]
    UnknownRun { run_id: String },

    /// Batch larger than the configured limit
    #[error("Batch of {size} incidents exceeds the limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    /// Model artifact or feedback log I/O failure
    #[error("Persistence error during {operation}: {message}")]
    Persistence { operation: String, message: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Background task failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TriageError {
    pub fn invalid_attribute(
        incident_id: impl Into<String>,
        attribute: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        TriageError::InvalidAttribute {
            incident_id: incident_id.into(),
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    pub fn persistence(operation: impl Into<String>, message: impl ToString) -> Self {
        TriageError::Persistence {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    pub fn model_not_ready(operation: impl Into<String>) -> Self {
        TriageError::ModelNotReady {
            operation: operation.into(),
        }
    }

    /// Setup defects that must abort a run instead of being recorded per incident
    pub fn is_systemic(&self) -> bool {
        matches!(
            self,
            TriageError::ModelNotReady { .. }
                | TriageError::UnknownIssueCategory { .. }
                | TriageError::Configuration(_)
        )
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            TriageError::InsufficientData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            TriageError::InvalidLabel { .. } => StatusCode::BAD_REQUEST,
            TriageError::ModelNotReady { .. } => StatusCode::SERVICE_UNAVAILABLE,
            TriageError::InvalidAttribute { .. } => StatusCode::BAD_REQUEST,
            TriageError::UnknownIssueCategory { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            TriageError::UnknownIncident { .. } => StatusCode::NOT_FOUND,
            TriageError::UnknownRun { .. } => StatusCode::NOT_FOUND,
            TriageError::BatchTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            TriageError::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            TriageError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TriageError::Serialization(_) => StatusCode::BAD_REQUEST,
            TriageError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TriageError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            TriageError::InsufficientData { .. } => "INSUFFICIENT_DATA",
            TriageError::InvalidLabel { .. } => "INVALID_LABEL",
            TriageError::ModelNotReady { .. } => "MODEL_NOT_READY",
            TriageError::InvalidAttribute { .. } => "INVALID_ATTRIBUTE",
            TriageError::UnknownIssueCategory { .. } => "UNKNOWN_ISSUE_CATEGORY",
            TriageError::UnknownIncident { .. } => "UNKNOWN_INCIDENT",
            TriageError::UnknownRun { .. } => "UNKNOWN_RUN",
            TriageError::BatchTooLarge { .. } => "BATCH_TOO_LARGE",
            TriageError::Persistence { .. } => "PERSISTENCE_ERROR",
            TriageError::Configuration(_) => "CONFIGURATION_ERROR",
            TriageError::Serialization(_) => "SERIALIZATION_ERROR",
            TriageError::Internal(_) => "INTERNAL_ERROR",
            TriageError::Io(_) => "IO_ERROR",
        }
    }
}

/// Convert TriageError to HTTP response
impl IntoResponse for TriageError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self.response_body())).into_response()
    }
}

impl TriageError {
    /// JSON error envelope, logged as it is built
    fn response_body(&self) -> serde_json::Value {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        tracing::error!(
            error_code = error_code,
            status_code = status.as_u16(),
            message = %message,
            "Request error"
        );

        json!({
            "error": {
                "code": error_code,
                "message": message,
                "status": status.as_u16(),
            }
        })
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for TriageError {
    fn from(err: serde_json::Error) -> Self {
        TriageError::Serialization(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for TriageError {
    fn from(err: config::ConfigError) -> Self {
        TriageError::Configuration(err.to_string())
    }
}

/// A feedback submission the store could not persist.
///
/// The entry travels back untouched so the caller can retry or alert.
#[derive(Error, Debug)]
#[error("Feedback for incident {} was not stored: {error}", entry.incident_id)]
pub struct FeedbackRejected {
    pub entry: FeedbackEntry,
    #[source]
    pub error: TriageError,
}

/// The error envelope plus the rejected entry under `"entry"`
impl IntoResponse for FeedbackRejected {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let mut body = self.error.response_body();
        match serde_json::to_value(&self.entry) {
            Ok(entry) => body["entry"] = entry,
            Err(e) => tracing::warn!(error = %e, "Rejected feedback entry not serializable"),
        }
        (status, Json(body)).into_response()
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, TriageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            TriageError::model_not_ready("predict").status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            TriageError::invalid_attribute("INC-1", "downtime_minutes", "negative").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            TriageError::UnknownIncident {
                incident_id: "INC-9".to_string(),
                operation: "submit_feedback".to_string(),
            }
            .status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            TriageError::persistence("feedback_append", "disk full").error_code(),
            "PERSISTENCE_ERROR"
        );
        assert_eq!(
            TriageError::UnknownIssueCategory {
                category: "paper_jam".to_string(),
                context: "classifier output".to_string(),
            }
            .error_code(),
            "UNKNOWN_ISSUE_CATEGORY"
        );
    }

    #[tokio::test]
    async fn test_feedback_rejection_body_carries_entry() {
        let rejected = FeedbackRejected {
            entry: FeedbackEntry::new("INC-7".to_string(), crate::models::ActionRating::Partial),
            error: TriageError::persistence("feedback_append", "disk full"),
        };

        let response = rejected.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "PERSISTENCE_ERROR");
        assert_eq!(body["entry"]["incident_id"], "INC-7");
        assert_eq!(body["entry"]["rating"], "partial");
    }

    #[test]
    fn test_systemic_classification() {
        assert!(TriageError::model_not_ready("predict").is_systemic());
        assert!(TriageError::UnknownIssueCategory {
            category: "x".to_string(),
            context: "y".to_string(),
        }
        .is_systemic());
        assert!(!TriageError::invalid_attribute("INC-1", "avg_amount", "missing").is_systemic());
    }

    #[test]
    fn test_messages_carry_attribution() {
        let err = TriageError::invalid_attribute("INC-42", "avg_amount", "missing");
        assert!(err.to_string().contains("INC-42"));
        assert!(err.to_string().contains("avg_amount"));
    }
}
