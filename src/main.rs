use atm_incident_triage::{
    api::{build_router, AppState},
    config::Config,
    feedback::{FeedbackService, JsonlFeedbackStore},
    ml::ClassifierHandle,
    processing::TriageProcessor,
    telemetry,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        Config::default()
    });

    // Initialize tracing
    telemetry::init_tracing(&config.observability)?;

    tracing::info!(
        service = %config.observability.service_name,
        "Starting ATM incident triage v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = atm_incident_triage::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        }
    } else {
        tracing::info!("Prometheus metrics disabled in configuration");
    }

    // Load the classifier if an artifact exists; otherwise wait for /v1/model/train
    let classifier = Arc::new(ClassifierHandle::from_config(&config.model));
    let artifact_path = &config.model.artifact_path;
    if artifact_path.exists() {
        match classifier.load(artifact_path) {
            Ok(metadata) => tracing::info!(
                version = %metadata.version,
                trained_at = %metadata.trained_at,
                "Classifier ready"
            ),
            Err(e) => tracing::error!(error = %e, "Failed to load classifier artifact"),
        }
    } else {
        tracing::warn!(
            path = %artifact_path.display(),
            "No classifier artifact; triage requests fail until a model is trained"
        );
    }

    let processor = Arc::new(TriageProcessor::from_config(&config, classifier)?);

    let store = Arc::new(JsonlFeedbackStore::from_config(&config.feedback));
    tracing::info!(path = %store.path().display(), "Feedback log initialized");
    let feedback = FeedbackService::new(store);

    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let app = build_router(AppState::new(processor, feedback, config));

    // Start HTTP server
    let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("HTTP API server listening on http://{}", http_addr);
    tracing::info!("   Health check: http://{}/health", http_addr);
    tracing::info!("   Triage: http://{}/v1/triage", http_addr);

    axum::serve(http_listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
