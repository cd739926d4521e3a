use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::warn;

// Re-export config types owned by their modules
pub use crate::nats::NatsConfig;
pub use crate::window::ShutdownPolicy;

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub nats: NatsConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Per-event processing
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessingConfig {
    /// Detections above this confidence are routed as anomalies
    #[serde(default = "default_anomaly_threshold")]
    pub anomaly_confidence_threshold: f64,
    /// Stamped into `processing_metadata.pipeline_version`
    #[serde(default = "default_pipeline_version")]
    pub pipeline_version: String,
}

fn default_anomaly_threshold() -> f64 {
    0.95
}

fn default_pipeline_version() -> String {
    "1.0.0".to_string()
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            anomaly_confidence_threshold: default_anomaly_threshold(),
            pipeline_version: default_pipeline_version(),
        }
    }
}

/// Event-time windowing
#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_size")]
    pub size_seconds: u64,
    /// How long a window stays open past its end, measured in watermark time
    #[serde(default)]
    pub allowed_lateness_seconds: u64,
    /// Watermark lags the newest event time by this much
    #[serde(default = "default_max_out_of_orderness")]
    pub max_out_of_orderness_seconds: u64,
    /// How often the runner advances the watermark
    #[serde(default = "default_tick_interval")]
    pub tick_interval_seconds: u64,
    /// What happens to open windows on shutdown
    #[serde(default)]
    pub shutdown_policy: ShutdownPolicy,
    /// Closed-window aggregates held for re-publishing after a failed publish
    #[serde(default = "default_max_pending_aggregates")]
    pub max_pending_aggregates: usize,
}

fn default_window_size() -> u64 {
    60
}

fn default_max_out_of_orderness() -> u64 {
    10
}

fn default_tick_interval() -> u64 {
    1
}

fn default_max_pending_aggregates() -> usize {
    10_000
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            size_seconds: default_window_size(),
            allowed_lateness_seconds: 0,
            max_out_of_orderness_seconds: default_max_out_of_orderness(),
            tick_interval_seconds: default_tick_interval(),
            shutdown_policy: ShutdownPolicy::default(),
            max_pending_aggregates: default_max_pending_aggregates(),
        }
    }
}

/// Quality monitor retention and health thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_retention_minutes")]
    pub retention_minutes: i64,
    #[serde(default = "default_max_records")]
    pub max_records: usize,
    /// Trailing window used by periodic reports and the health check
    #[serde(default = "default_report_window")]
    pub report_window_minutes: i64,
    /// Validity rate below this marks data quality unhealthy
    #[serde(default = "default_min_validity_rate")]
    pub min_validity_rate: f64,
    /// Share of unparseable messages above this marks ingest unhealthy
    #[serde(default = "default_max_parse_failure_rate")]
    pub max_parse_failure_rate: f64,
}

fn default_retention_minutes() -> i64 {
    60
}

fn default_max_records() -> usize {
    100_000
}

fn default_report_window() -> i64 {
    5
}

fn default_min_validity_rate() -> f64 {
    0.9
}

fn default_max_parse_failure_rate() -> f64 {
    0.5
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            retention_minutes: default_retention_minutes(),
            max_records: default_max_records(),
            report_window_minutes: default_report_window(),
            min_validity_rate: default_min_validity_rate(),
            max_parse_failure_rate: default_max_parse_failure_rate(),
        }
    }
}

/// HTTP status API
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_enabled")]
    pub enabled: bool,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

fn default_api_enabled() -> bool {
    true
}

fn default_api_port() -> u16 {
    8080
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_api_enabled(),
            port: default_api_port(),
        }
    }
}

/// Periodic metrics reporting
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// How often to log a metrics snapshot (seconds)
    #[serde(default = "default_report_interval")]
    pub report_interval_seconds: u64,
    /// Time window for "active source" tracking (seconds)
    #[serde(default = "default_active_source_window")]
    pub active_source_window_seconds: i64,
}

fn default_report_interval() -> u64 {
    30
}

fn default_active_source_window() -> i64 {
    60
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval_seconds: default_report_interval(),
            active_source_window_seconds: default_active_source_window(),
        }
    }
}

impl PipelineConfig {
    /// Apply overrides from the process environment.
    ///
    /// Recognized: `WINDOW_SIZE_SECONDS`, `ANOMALY_THRESHOLD`, `NATS_URL`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Unparseable values are logged
    /// and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("WINDOW_SIZE_SECONDS") {
            match v.parse::<u64>() {
                Ok(n) => self.window.size_seconds = n,
                Err(_) => warn!(value = %v, "Ignoring invalid WINDOW_SIZE_SECONDS"),
            }
        }
        if let Some(v) = lookup("ANOMALY_THRESHOLD") {
            match v.parse::<f64>() {
                Ok(t) => self.processing.anomaly_confidence_threshold = t,
                Err(_) => warn!(value = %v, "Ignoring invalid ANOMALY_THRESHOLD"),
            }
        }
        if let Some(v) = lookup("NATS_URL") {
            self.nats.url = v;
        }
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.window.size_seconds == 0 {
            bail!("window.size_seconds must be greater than zero");
        }
        if self.window.tick_interval_seconds == 0 {
            bail!("window.tick_interval_seconds must be greater than zero");
        }
        if self.window.max_pending_aggregates == 0 {
            bail!("window.max_pending_aggregates must be greater than zero");
        }
        let threshold = self.processing.anomaly_confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            bail!(
                "processing.anomaly_confidence_threshold must be within [0, 1], got {}",
                threshold
            );
        }
        if self.processing.pipeline_version.trim().is_empty() {
            bail!("processing.pipeline_version must not be empty");
        }
        if self.monitor.report_window_minutes <= 0 {
            bail!("monitor.report_window_minutes must be greater than zero");
        }
        for (name, subject) in self.nats.subjects() {
            if subject.trim().is_empty() {
                bail!("nats.{} must not be empty", name);
            }
        }
        Ok(())
    }
}

/// Load configuration from TOML file
pub fn load_config(path: impl AsRef<Path>) -> Result<PipelineConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    let config: PipelineConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;
    Ok(config)
}
