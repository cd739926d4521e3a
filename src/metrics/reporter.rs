use super::{Counter, PipelineMetrics};
use crate::quality::QualityMonitor;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

/// Periodically log a metrics snapshot and the recent quality report
///
/// Runs until the task is aborted. Reporting only reads counters and the
/// monitor, so it never slows the processing path.
pub async fn run_metrics_reporter(
    metrics: Arc<PipelineMetrics>,
    monitor: QualityMonitor,
    interval_seconds: u64,
    active_source_window_seconds: i64,
    quality_window_minutes: i64,
) {
    let mut ticker = interval(Duration::from_secs(interval_seconds.max(1)));

    // Skip missed ticks to prevent backlog under load
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let snapshot = metrics.snapshot(active_source_window_seconds);
        info!(
            processed = snapshot.counter(Counter::ProcessedSuccess),
            parse_failed = snapshot.counter(Counter::ParseFailed),
            schema_failed = snapshot.counter(Counter::SchemaFailed),
            quality_failed = snapshot.counter(Counter::DataQualityFailed),
            anomalies = snapshot.counter(Counter::AnomaliesDetected),
            windows = snapshot.counter(Counter::WindowsAggregated),
            late_dropped = snapshot.counter(Counter::LateEventsDropped),
            event_rate = snapshot.event_rate,
            active_sources = snapshot.active_sources,
            "Pipeline metrics"
        );

        if let Some(report) = monitor.get_quality_metrics(quality_window_minutes) {
            info!(
                window_minutes = report.window_minutes,
                total_events = report.total_events,
                validity_rate = report.validity_rate,
                average_score = report.average_quality_score,
                "Data quality"
            );
        }
    }
}
