use crate::api::{handlers, AppState};
use crate::metrics::track_http_requests;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        // Triage
        .route("/v1/triage", post(handlers::triage_batch))
        .route("/v1/runs/:id", get(handlers::get_run))
        .route("/v1/runs/:id/tickets", get(handlers::get_run_tickets))
        // Feedback
        .route("/v1/runs/:id/feedback", post(handlers::submit_feedback))
        .route("/v1/feedback", get(handlers::list_feedback))
        .route("/v1/feedback/summary", get(handlers::feedback_summary))
        .route("/v1/feedback/corrections", get(handlers::feedback_corrections))
        // Model
        .route("/v1/model", get(handlers::model_info))
        .route("/v1/model/train", post(handlers::train_model))
        // Metrics
        .route("/metrics", get(handlers::metrics))
        // Add state
        .with_state(state)
        // Add middleware
        .route_layer(middleware::from_fn(track_http_requests))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
}
