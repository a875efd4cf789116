//! HTTP API tests driven through the router without a socket

mod common;

use atm_incident_triage::{
    api::{build_router, AppState},
    config::Config,
    feedback::{FeedbackService, InMemoryFeedbackStore},
    ml::ClassifierHandle,
    processing::TriageProcessor,
};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use common::{labeled_set, record, small_model_config};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app_with(config: Config, trained: bool) -> Router {
    let handle = ClassifierHandle::new();
    if trained {
        handle.train(&labeled_set(8), &small_model_config()).unwrap();
    }
    let processor = Arc::new(TriageProcessor::from_config(&config, Arc::new(handle)).unwrap());
    let feedback = FeedbackService::new(Arc::new(InMemoryFeedbackStore::new()));
    build_router(AppState::new(processor, feedback, config))
}

fn app() -> Router {
    app_with(Config::default(), true)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn batch() -> Value {
    let mut broken = serde_json::to_value(record("INC-BROKEN")).unwrap();
    broken["avg_amount"] = Value::Null;
    json!([record("INC-1"), broken])
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(&app(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_ready"], true);
}

#[tokio::test]
async fn test_triage_and_fetch_run() {
    let app = app();
    let (status, body) = send(&app, post("/v1/triage", batch())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["results"].as_array().unwrap().len(), 1);
    assert_eq!(body["failures"][0]["incident_id"], "INC-BROKEN");
    assert_eq!(body["summary"]["escalated"], 1);
    assert_eq!(body["results"][0]["impact"]["value"], 2_250_000.0);
    assert_eq!(body["results"][0]["escalation"]["status"], "escalated");

    let run_id = body["run_id"].as_str().unwrap().to_string();
    let (status, fetched) = send(&app, get(&format!("/v1/runs/{}", run_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["run_id"], run_id.as_str());

    let (status, tickets) = send(&app, get(&format!("/v1/runs/{}/tickets", run_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tickets[0]["incident_id"], "INC-1");
}

#[tokio::test]
async fn test_unknown_run() {
    let (status, body) = send(
        &app(),
        get("/v1/runs/00000000-0000-0000-0000-000000000000"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "UNKNOWN_RUN");
}

#[tokio::test]
async fn test_feedback_flow() {
    let app = app();
    let (_, run) = send(&app, post("/v1/triage", batch())).await;
    let run_id = run["run_id"].as_str().unwrap();
    let uri = format!("/v1/runs/{}/feedback", run_id);

    let (status, entry) = send(
        &app,
        post(
            &uri,
            json!({"incident_id": "INC-1", "rating": "helpful", "notes": "reset modem"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(entry["atm_id"], "ATM-1001");

    let (status, body) = send(
        &app,
        post(&uri, json!({"incident_id": "INC-BROKEN", "rating": "partial"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "UNKNOWN_INCIDENT");
    assert_eq!(body["entry"]["incident_id"], "INC-BROKEN");

    let (status, entries) = send(&app, get("/v1/feedback")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entries.as_array().unwrap().len(), 1);

    let (status, summary) = send(&app, get("/v1/feedback/summary")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["total"], 1);
}

#[tokio::test]
async fn test_batch_limit() {
    let mut config = Config::default();
    config.processing.max_batch_size = 1;

    let (status, body) = send(&app_with(config, true), post("/v1/triage", batch())).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "BATCH_TOO_LARGE");
}

#[tokio::test]
async fn test_untrained_service_unavailable() {
    let app = app_with(Config::default(), false);

    let (status, body) = send(&app, post("/v1/triage", batch())).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "MODEL_NOT_READY");

    let (status, _) = send(&app, get("/v1/model")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_train_endpoint_installs_model() {
    let dir = tempfile::TempDir::new().unwrap();
    let artifact_path = dir.path().join("model").join("classifier.json");
    let mut config = Config::default();
    config.model.artifact_path = artifact_path.clone();
    let app = app_with(config, false);

    let labeled: Vec<Value> = labeled_set(8)
        .into_iter()
        .map(|sample| serde_json::to_value(sample).unwrap())
        .collect();
    let (status, metadata) = send(&app, post("/v1/model/train", Value::Array(labeled))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(metadata["model_type"], "random_forest");

    let (_, health) = send(&app, get("/health")).await;
    assert_eq!(health["model_ready"], true);

    assert!(artifact_path.exists());
    let restored = ClassifierHandle::new();
    let loaded = restored.load(&artifact_path).unwrap();
    assert_eq!(loaded.version, metadata["version"]);
}

#[tokio::test]
async fn test_train_endpoint_reports_failed_save() {
    let dir = tempfile::TempDir::new().unwrap();
    // A non-empty directory at the artifact path cannot be replaced
    let artifact_path = dir.path().join("classifier.json");
    std::fs::create_dir_all(artifact_path.join("occupied")).unwrap();
    let mut config = Config::default();
    config.model.artifact_path = artifact_path;
    config.model.max_retries = 1;
    config.model.retry_backoff_ms = 1;

    let handle = ClassifierHandle::from_config(&config.model);
    let processor = Arc::new(TriageProcessor::from_config(&config, Arc::new(handle)).unwrap());
    let feedback = FeedbackService::new(Arc::new(InMemoryFeedbackStore::new()));
    let app = build_router(AppState::new(processor, feedback, config));

    let labeled: Vec<Value> = labeled_set(8)
        .into_iter()
        .map(|sample| serde_json::to_value(sample).unwrap())
        .collect();
    let (status, body) = send(&app, post("/v1/model/train", Value::Array(labeled))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "PERSISTENCE_ERROR");
}

#[tokio::test]
async fn test_malformed_batch() {
    let (status, body) = send(&app(), post("/v1/triage", json!({"not": "an array"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "SERIALIZATION_ERROR");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let _ = atm_incident_triage::metrics::init_metrics();
    let app = app();
    send(&app, get("/health")).await;

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
