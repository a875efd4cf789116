//! Prometheus metrics for the triage engine.
//!
//! Metrics live in a process-wide registry and are exported in the text
//! exposition format by the `/metrics` endpoint.
//!
//! # Example
//! ```no_run
//! use atm_incident_triage::metrics::INCIDENTS_PROCESSED_TOTAL;
//!
//! INCIDENTS_PROCESSED_TOTAL.with_label_values(&["success"]).inc();
//! ```

pub mod middleware;

pub use middleware::track_http_requests;

use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Gauge, GaugeVec, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts,
    Registry,
};

const NAMESPACE: &str = "atm_incident_triage";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    // ============================================================================
    // HTTP Metrics
    // ============================================================================

    /// Total number of HTTP requests received
    ///
    /// Labels: method, path, status_code
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests")
            .namespace(NAMESPACE),
        &["method", "path", "status_code"]
    ).expect("Failed to create HTTP_REQUESTS_TOTAL metric");

    // ============================================================================
    // Triage Metrics
    // ============================================================================

    /// Incidents that went through the pipeline
    ///
    /// Labels: outcome (success, failure)
    pub static ref INCIDENTS_PROCESSED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("incidents_processed_total", "Total number of incidents triaged")
            .namespace(NAMESPACE),
        &["outcome"]
    ).expect("Failed to create INCIDENTS_PROCESSED_TOTAL metric");

    /// Per-incident failures by error code
    ///
    /// Labels: error_code
    pub static ref INCIDENT_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("incident_failures_total", "Incidents that could not be triaged")
            .namespace(NAMESPACE),
        &["error_code"]
    ).expect("Failed to create INCIDENT_FAILURES_TOTAL metric");

    /// Escalated incidents by predicted category
    ///
    /// Labels: category
    pub static ref INCIDENTS_ESCALATED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("incidents_escalated_total", "Total number of escalated incidents")
            .namespace(NAMESPACE),
        &["category"]
    ).expect("Failed to create INCIDENTS_ESCALATED_TOTAL metric");

    /// Triage runs aborted by a systemic error
    pub static ref RUNS_ABORTED_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("runs_aborted_total", "Triage runs aborted by a setup defect")
            .namespace(NAMESPACE)
    ).expect("Failed to create RUNS_ABORTED_TOTAL metric");

    /// Stage duration in seconds
    ///
    /// Labels: stage (train, batch, feedback_append)
    pub static ref STAGE_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new("stage_duration_seconds", "Pipeline stage duration in seconds")
            .namespace(NAMESPACE)
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["stage"]
    ).expect("Failed to create STAGE_DURATION_SECONDS metric");

    // ============================================================================
    // Model Metrics
    // ============================================================================

    /// Holdout accuracy of the active model
    pub static ref MODEL_ACCURACY: Gauge = Gauge::with_opts(
        Opts::new("model_accuracy", "Holdout accuracy of the active classifier")
            .namespace(NAMESPACE)
    ).expect("Failed to create MODEL_ACCURACY metric");

    /// Model installations
    ///
    /// Labels: source (trained, loaded)
    pub static ref MODEL_INSTALLS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("model_installs_total", "Classifier models installed")
            .namespace(NAMESPACE),
        &["source"]
    ).expect("Failed to create MODEL_INSTALLS_TOTAL metric");

    // ============================================================================
    // Feedback Metrics
    // ============================================================================

    /// Feedback submissions
    ///
    /// Labels: status (stored, rejected)
    pub static ref FEEDBACK_SUBMISSIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("feedback_submissions_total", "Technician feedback submissions")
            .namespace(NAMESPACE),
        &["status"]
    ).expect("Failed to create FEEDBACK_SUBMISSIONS_TOTAL metric");

    /// Append retries against the feedback log
    pub static ref FEEDBACK_RETRIES_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("feedback_retries_total", "Feedback log append retries")
            .namespace(NAMESPACE)
    ).expect("Failed to create FEEDBACK_RETRIES_TOTAL metric");

    // ============================================================================
    // System Metrics
    // ============================================================================

    /// Build information
    ///
    /// Labels: version
    pub static ref BUILD_INFO: GaugeVec = GaugeVec::new(
        Opts::new("build_info", "Build information")
            .namespace(NAMESPACE),
        &["version"]
    ).expect("Failed to create BUILD_INFO metric");
}

/// Initialize all metrics
///
/// This function registers all metrics with the Prometheus registry.
///
/// # Errors
///
/// Returns an error if any metric fails to register (typically only happens
/// if metrics are registered multiple times).
pub fn init_metrics() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()))?;

    PROMETHEUS_REGISTRY.register(Box::new(INCIDENTS_PROCESSED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(INCIDENT_FAILURES_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(INCIDENTS_ESCALATED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(RUNS_ABORTED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(STAGE_DURATION_SECONDS.clone()))?;

    PROMETHEUS_REGISTRY.register(Box::new(MODEL_ACCURACY.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(MODEL_INSTALLS_TOTAL.clone()))?;

    PROMETHEUS_REGISTRY.register(Box::new(FEEDBACK_SUBMISSIONS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(FEEDBACK_RETRIES_TOTAL.clone()))?;

    PROMETHEUS_REGISTRY.register(Box::new(BUILD_INFO.clone()))?;

    BUILD_INFO
        .with_label_values(&[env!("CARGO_PKG_VERSION")])
        .set(1.0);

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Generate Prometheus text format metrics
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}
