use crate::api::AppState;
use crate::error::{FeedbackRejected, Result, TriageError};
use crate::feedback::{AccuracySummary, Correction};
use crate::ingest;
use crate::ml::ModelMetadata;
use crate::models::{EnrichedIncident, FeedbackDraft, FeedbackEntry, TriageTicket};
use crate::processing::{IncidentFailure, TriageRun, TriageSummary};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_ready: state.processor.classifier().is_ready(),
        retained_runs: state.runs.len(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model_ready: bool,
    pub retained_runs: usize,
    pub uptime_seconds: u64,
}

/// Triage a JSON array of incident records
pub async fn triage_batch(
    State(state): State<AppState>,
    body: String,
) -> Result<(StatusCode, Json<RunResponse>)> {
    let outcome = ingest::parse_batch(&body)?;

    let limit = state.config.processing.max_batch_size;
    if outcome.len() > limit {
        return Err(TriageError::BatchTooLarge {
            size: outcome.len(),
            limit,
        });
    }

    let processor = state.processor.clone();
    let run = tokio::task::spawn_blocking(move || {
        processor.process_ingested(outcome.records, outcome.failures)
    })
    .await
    .map_err(|e| TriageError::Internal(format!("triage task failed: {}", e)))??;

    let run = state.runs.insert(run);
    Ok((StatusCode::CREATED, Json(RunResponse::from(run.as_ref()))))
}

/// Fetch a retained run
pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RunResponse>> {
    let run = state.runs.get(&id)?;
    Ok(Json(RunResponse::from(run.as_ref())))
}

/// Flat export rows of a retained run, most urgent first
pub async fn get_run_tickets(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TriageTicket>>> {
    Ok(Json(state.runs.get(&id)?.tickets()))
}

/// Run response DTO
#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub summary: TriageSummary,
    pub results: Vec<EnrichedIncident>,
    pub failures: Vec<IncidentFailure>,
}

impl From<&TriageRun> for RunResponse {
    fn from(run: &TriageRun) -> Self {
        Self {
            run_id: run.run_id,
            created_at: run.created_at,
            summary: run.summary(),
            results: run.results.clone(),
            failures: run.failures.values().cloned().collect(),
        }
    }
}

/// Record technician feedback for an incident of a retained run
pub async fn submit_feedback(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(draft): Json<FeedbackDraft>,
) -> std::result::Result<(StatusCode, Json<FeedbackEntry>), FeedbackRejected> {
    let run = match state.runs.get(&id) {
        Ok(run) => run,
        Err(error) => {
            let entry = FeedbackEntry::new(draft.incident_id, draft.rating);
            return Err(FeedbackRejected { entry, error });
        }
    };

    let entry = state.feedback.submit_for_run(&run, draft).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[derive(Debug, Deserialize)]
pub struct ListFeedbackQuery {
    pub incident_id: Option<String>,
    pub limit: Option<usize>,
}

/// List feedback entries in submission order
pub async fn list_feedback(
    State(state): State<AppState>,
    Query(params): Query<ListFeedbackQuery>,
) -> Result<Json<Vec<FeedbackEntry>>> {
    let mut entries = state.feedback.entries().await?;

    if let Some(incident_id) = params.incident_id {
        entries.retain(|entry| entry.incident_id == incident_id);
    }
    if let Some(limit) = params.limit {
        // Most recent entries
        let skip = entries.len().saturating_sub(limit);
        entries.drain(..skip);
    }

    Ok(Json(entries))
}

pub async fn feedback_summary(State(state): State<AppState>) -> Result<Json<AccuracySummary>> {
    Ok(Json(state.feedback.accuracy_summary().await?))
}

pub async fn feedback_corrections(State(state): State<AppState>) -> Result<Json<Vec<Correction>>> {
    Ok(Json(state.feedback.corrections().await?))
}

/// Metadata of the active classifier
pub async fn model_info(State(state): State<AppState>) -> Result<Json<ModelMetadata>> {
    let model = state.processor.classifier().current()?;
    Ok(Json(model.metadata().clone()))
}

/// Train a classifier from a JSON array of labeled records, install it and
/// save it to the configured artifact path.
///
/// Records with invalid attributes are skipped; an unknown label rejects
/// the whole training set. A failed save is a `Persistence` error; the
/// new model stays installed.
pub async fn train_model(
    State(state): State<AppState>,
    body: String,
) -> Result<(StatusCode, Json<ModelMetadata>)> {
    let outcome = ingest::parse_labeled(&body)?;
    let weight = state.processor.complaint_weight();
    let (labeled, skipped) = ingest::into_training_set(outcome, weight);
    if !skipped.is_empty() {
        tracing::warn!(skipped = skipped.len(), "Training records skipped");
    }

    let classifier = state.processor.classifier().clone();
    let config = state.config.model.clone();
    let metadata = tokio::task::spawn_blocking(move || {
        let metadata = classifier.train(&labeled, &config)?;
        classifier.save(&config.artifact_path)?;
        Ok::<_, TriageError>(metadata)
    })
    .await
    .map_err(|e| TriageError::Internal(format!("training task failed: {}", e)))??;

    tracing::info!(
        version = %metadata.version,
        path = %state.config.model.artifact_path.display(),
        "Classifier trained over HTTP"
    );
    Ok((StatusCode::CREATED, Json(metadata)))
}

/// Prometheus metrics endpoint
///
/// Returns metrics in Prometheus text exposition format
pub async fn metrics() -> (StatusCode, String) {
    let metrics = crate::metrics::gather_metrics();
    (StatusCode::OK, metrics)
}
