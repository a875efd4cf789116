use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::models::ActionRecommendation;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Classifier training configuration
    #[serde(default)]
    pub model: ModelConfig,

    /// Impact scoring configuration
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Escalation thresholds
    #[serde(default)]
    pub escalation: EscalationConfig,

    /// Automated remediation gate
    #[serde(default)]
    pub automation: AutomationConfig,

    /// Feedback log configuration
    #[serde(default)]
    pub feedback: FeedbackConfig,

    /// Batch processing configuration
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Action table overrides keyed by issue category label
    #[serde(default)]
    pub actions: BTreeMap<String, ActionRecommendation>,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/triage.toml".to_string());
        Self::load_from(&config_path)
    }

    /// Load with an explicit override file
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(config_path).required(false))
            // Override with environment variables (prefix: ATM_TRIAGE_)
            .add_source(
                config::Environment::with_prefix("ATM_TRIAGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Maximum number of triage runs kept in memory for feedback lookups
    #[serde(default = "default_max_retained_runs")]
    pub max_retained_runs: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            max_retained_runs: default_max_retained_runs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Service name
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            service_name: default_service_name(),
            prometheus_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Number of trees in the ensemble
    #[serde(default = "default_n_trees")]
    pub n_trees: usize,

    /// Maximum depth of each tree
    #[serde(default = "default_max_depth")]
    pub max_depth: u16,

    /// Seed for bootstrap sampling and the holdout split
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Minimum labeled incidents required to train
    #[serde(default = "default_min_training_samples")]
    pub min_training_samples: usize,

    /// Fraction of each class held out for evaluation
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,

    /// Model artifact location
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,

    /// Max retry attempts for artifact reads and writes
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base retry backoff (milliseconds), doubled per attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_trees: default_n_trees(),
            max_depth: default_max_depth(),
            seed: default_seed(),
            min_training_samples: default_min_training_samples(),
            test_fraction: default_test_fraction(),
            artifact_path: default_artifact_path(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Multiplier increment per complaint when no explicit multiplier is given
    #[serde(default = "default_complaint_weight")]
    pub complaint_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            complaint_weight: default_complaint_weight(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// Escalate when impact exceeds this value (currency units)
    #[serde(default = "default_impact_threshold")]
    pub impact_threshold: f64,

    /// Escalate when downtime exceeds this many minutes
    #[serde(default = "default_downtime_threshold")]
    pub downtime_threshold_minutes: f64,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            impact_threshold: default_impact_threshold(),
            downtime_threshold_minutes: default_downtime_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// Predictions below this confidence always go to a human
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Impact ceiling for automated remediation
    #[serde(default = "default_auto_max_impact")]
    pub max_impact: f64,

    /// Downtime ceiling for automated remediation (minutes)
    #[serde(default = "default_auto_max_downtime")]
    pub max_downtime_minutes: f64,

    /// Complaint ceiling for automated remediation
    #[serde(default = "default_auto_max_complaints")]
    pub max_complaints: u32,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            max_impact: default_auto_max_impact(),
            max_downtime_minutes: default_auto_max_downtime(),
            max_complaints: default_auto_max_complaints(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackConfig {
    /// Append-only JSON Lines log
    #[serde(default = "default_feedback_path")]
    pub path: PathBuf,

    /// Max retry attempts per append
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base retry backoff (milliseconds), doubled per attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            path: default_feedback_path(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Process incidents of a batch on the rayon pool
    #[serde(default = "default_true")]
    pub parallel: bool,

    /// Largest batch accepted in one call
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            max_batch_size: default_max_batch_size(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_max_retained_runs() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "atm-incident-triage".to_string()
}

fn default_true() -> bool {
    true
}

fn default_n_trees() -> usize {
    100
}

fn default_max_depth() -> u16 {
    10
}

fn default_seed() -> u64 {
    42
}

fn default_min_training_samples() -> usize {
    10
}

fn default_test_fraction() -> f64 {
    0.2
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from("model/classifier.json")
}

fn default_complaint_weight() -> f64 {
    0.05
}

fn default_impact_threshold() -> f64 {
    100_000.0
}

fn default_downtime_threshold() -> f64 {
    120.0
}

fn default_min_confidence() -> f64 {
    0.60
}

fn default_auto_max_impact() -> f64 {
    50_000.0
}

fn default_auto_max_downtime() -> f64 {
    60.0
}

fn default_auto_max_complaints() -> u32 {
    15
}

fn default_feedback_path() -> PathBuf {
    PathBuf::from("data/feedback.jsonl")
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    50
}

fn default_max_batch_size() -> usize {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();
        assert_eq!(config.server.http_port, 8080);
        assert_eq!(config.escalation.impact_threshold, 100_000.0);
        assert_eq!(config.escalation.downtime_threshold_minutes, 120.0);
        assert_eq!(config.model.seed, 42);
        assert_eq!(config.model.n_trees, 100);
        assert_eq!(config.automation.min_confidence, 0.60);
        assert!(config.actions.is_empty());
    }

    #[test]
    fn test_embedded_defaults_load() {
        let config = Config::load_from("does/not/exist.toml").unwrap();
        assert_eq!(config.escalation.impact_threshold, 100_000.0);
        assert_eq!(config.feedback.max_retries, 3);
        assert_eq!(config.observability.service_name, "atm-incident-triage");
    }
}
