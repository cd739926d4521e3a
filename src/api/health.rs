use crate::config::MonitorConfig;
use crate::event::timestamp::format_timestamp;
use crate::metrics::{Counter, PipelineMetrics};
use crate::quality::QualityMonitor;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    pub details: serde_json::Value,
}

/// Overall health: healthy when every component is, unhealthy when none
/// is, degraded in between.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub healthy_components: usize,
    pub total_components: usize,
    pub components: BTreeMap<&'static str, ComponentHealth>,
    pub last_updated: String,
}

pub fn check_health(
    metrics: &PipelineMetrics,
    monitor: &QualityMonitor,
    config: &MonitorConfig,
    now: DateTime<Utc>,
) -> HealthReport {
    let mut components = BTreeMap::new();
    components.insert("ingest", ingest_health(metrics, config));
    components.insert("data_quality", quality_health(monitor, config, now));

    let total_components = components.len();
    let healthy_components = components
        .values()
        .filter(|c| c.status == HealthStatus::Healthy)
        .count();

    let status = if healthy_components == total_components {
        HealthStatus::Healthy
    } else if healthy_components == 0 {
        HealthStatus::Unhealthy
    } else {
        HealthStatus::Degraded
    };

    HealthReport {
        status,
        healthy_components,
        total_components,
        components,
        last_updated: format_timestamp(&now),
    }
}

/// Share of received messages that could not be parsed into events
fn ingest_health(metrics: &PipelineMetrics, config: &MonitorConfig) -> ComponentHealth {
    let failed = metrics.get(Counter::ParseFailed) + metrics.get(Counter::SchemaFailed);
    let received = failed
        + metrics.get(Counter::DataQualityFailed)
        + metrics.get(Counter::ProcessedSuccess);

    if received == 0 {
        return ComponentHealth {
            status: HealthStatus::Healthy,
            details: json!({ "messages_received": 0 }),
        };
    }

    let failure_rate = failed as f64 / received as f64;
    ComponentHealth {
        status: if failure_rate > config.max_parse_failure_rate {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Healthy
        },
        details: json!({
            "messages_received": received,
            "parse_failures": failed,
            "parse_failure_rate": failure_rate,
        }),
    }
}

/// Validity rate over the report window
fn quality_health(monitor: &QualityMonitor, config: &MonitorConfig, now: DateTime<Utc>) -> ComponentHealth {
    let Some(report) = monitor.get_quality_metrics_at(config.report_window_minutes, now) else {
        return ComponentHealth {
            status: HealthStatus::Healthy,
            details: json!({ "status": "no_data" }),
        };
    };

    ComponentHealth {
        status: if report.validity_rate < config.min_validity_rate {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Healthy
        },
        details: json!({
            "window_minutes": report.window_minutes,
            "total_events": report.total_events,
            "validity_rate": report.validity_rate,
            "average_quality_score": report.average_quality_score,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::ValidationResult;

    fn result(is_valid: bool) -> ValidationResult {
        ValidationResult {
            is_valid,
            errors: if is_valid { vec![] } else { vec!["bad".to_string()] },
            warnings: vec![],
            score: if is_valid { 1.0 } else { 0.5 },
        }
    }

    #[test]
    fn test_idle_pipeline_is_healthy() {
        let report = check_health(
            &PipelineMetrics::new(),
            &QualityMonitor::default(),
            &MonitorConfig::default(),
            Utc::now(),
        );
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.healthy_components, 2);
    }

    #[test]
    fn test_low_validity_degrades() {
        let monitor = QualityMonitor::default();
        let now = Utc::now();
        monitor.record_at(&result(true), "a", now);
        monitor.record_at(&result(false), "b", now);

        let report = check_health(&PipelineMetrics::new(), &monitor, &MonitorConfig::default(), now);
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.components["data_quality"].status, HealthStatus::Unhealthy);
        assert_eq!(report.components["ingest"].status, HealthStatus::Healthy);
    }

    #[test]
    fn test_everything_failing_is_unhealthy() {
        let metrics = PipelineMetrics::new();
        metrics.add(Counter::ParseFailed, 9);
        metrics.increment(Counter::DataQualityFailed);
        let monitor = QualityMonitor::default();
        let now = Utc::now();
        monitor.record_at(&result(false), "b", now);

        let report = check_health(&metrics, &monitor, &MonitorConfig::default(), now);
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert_eq!(report.healthy_components, 0);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "unhealthy");
        assert_eq!(json["components"]["ingest"]["details"]["parse_failures"], 9);
    }
}
