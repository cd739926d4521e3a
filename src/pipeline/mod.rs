//! Wires the processor, watermark and aggregator together and turns their
//! output into routed outbound records. Transport-agnostic: `runner` feeds
//! it from NATS, tests feed it bytes directly.

mod pending;
mod runner;

pub use pending::PendingAggregates;
pub use runner::run;

use crate::config::PipelineConfig;
use crate::metrics::PipelineMetrics;
use crate::processor::{Branch, EventProcessor, ProcessOutcome};
use crate::quality::QualityMonitor;
use crate::window::{FixedWindows, ShutdownPolicy, WatermarkTracker, WindowAggregate, WindowedAggregator};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

/// Destination of an outbound record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Normal,
    Anomaly,
    Analytics,
    DeadLetter,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Route::Normal => "normal",
            Route::Anomaly => "anomaly",
            Route::Analytics => "analytics",
            Route::DeadLetter => "dead_letter",
        };
        f.write_str(name)
    }
}

/// A serialized record and the subject it goes to
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub route: Route,
    pub subject: String,
    pub payload: Vec<u8>,
}

/// Subject per route
#[derive(Debug, Clone)]
struct Subjects {
    normal: String,
    anomaly: String,
    analytics: String,
    dead_letter: String,
}

impl Subjects {
    fn for_route(&self, route: Route) -> &str {
        match route {
            Route::Normal => &self.normal,
            Route::Anomaly => &self.anomaly,
            Route::Analytics => &self.analytics,
            Route::DeadLetter => &self.dead_letter,
        }
    }
}

pub struct Pipeline {
    processor: EventProcessor,
    aggregator: WindowedAggregator,
    watermark: WatermarkTracker,
    subjects: Subjects,
    shutdown_policy: ShutdownPolicy,
    max_pending_aggregates: usize,
    metrics: Arc<PipelineMetrics>,
    monitor: QualityMonitor,
}

impl Pipeline {
    pub fn new(config: &PipelineConfig, metrics: Arc<PipelineMetrics>, monitor: QualityMonitor) -> Self {
        let window = &config.window;
        Self {
            processor: EventProcessor::new(
                config.processing.clone(),
                Arc::clone(&metrics),
                monitor.clone(),
            ),
            aggregator: WindowedAggregator::new(
                FixedWindows::new(window.size_seconds),
                seconds(window.allowed_lateness_seconds),
                Arc::clone(&metrics),
            ),
            watermark: WatermarkTracker::new(seconds(window.max_out_of_orderness_seconds)),
            subjects: Subjects {
                normal: config.nats.normal_subject.clone(),
                anomaly: config.nats.anomaly_subject.clone(),
                analytics: config.nats.analytics_subject.clone(),
                dead_letter: config.nats.dead_letter_subject.clone(),
            },
            shutdown_policy: window.shutdown_policy,
            max_pending_aggregates: window.max_pending_aggregates,
            metrics,
            monitor,
        }
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    pub fn monitor(&self) -> &QualityMonitor {
        &self.monitor
    }

    pub fn aggregator(&self) -> &WindowedAggregator {
        &self.aggregator
    }

    /// Empty retry buffer for aggregates that failed to publish
    pub fn pending_aggregates(&self) -> PendingAggregates {
        PendingAggregates::new(self.max_pending_aggregates, Arc::clone(&self.metrics))
    }

    /// Current event-time watermark
    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        self.watermark.current()
    }

    /// Process one inbound message.
    ///
    /// Forwarded events go to the normal or anomaly subject; normal events
    /// are also fed to the aggregator. Payloads that fail to parse go to the
    /// dead-letter subject unchanged. Quality drops produce nothing.
    pub fn handle_message(&self, payload: &[u8], now: DateTime<Utc>) -> Vec<Outbound> {
        let classified = match self.processor.process_at(payload, now) {
            ProcessOutcome::Forward(classified) => classified,
            ProcessOutcome::Dropped(reason) if reason.is_parse_failure() => {
                return vec![self.outbound_raw(Route::DeadLetter, payload.to_vec())];
            }
            ProcessOutcome::Dropped(_) => return Vec::new(),
        };

        self.watermark.on_event(classified.event.timestamp);

        let route = match classified.branch() {
            Branch::Normal => {
                if let Err(e) = self.aggregator.observe(&classified.event) {
                    debug!(event_id = %classified.event.event_id, error = %e, "Event not aggregated");
                }
                Route::Normal
            }
            Branch::Anomaly => Route::Anomaly,
        };

        self.outbound(route, &classified).into_iter().collect()
    }

    /// Advance the watermark and emit every window it closed
    pub fn on_tick(&self) -> Vec<Outbound> {
        let Some(watermark) = self.watermark.current() else {
            return Vec::new();
        };
        self.analytics(self.aggregator.advance_watermark(watermark))
    }

    /// Apply the configured shutdown policy to open windows
    pub fn shutdown(&self) -> Vec<Outbound> {
        self.analytics(self.aggregator.shutdown(self.shutdown_policy))
    }

    fn analytics(&self, aggregates: Vec<WindowAggregate>) -> Vec<Outbound> {
        aggregates
            .iter()
            .filter_map(|aggregate| self.outbound(Route::Analytics, aggregate))
            .collect()
    }

    fn outbound<T: Serialize>(&self, route: Route, record: &T) -> Option<Outbound> {
        match serde_json::to_vec(record) {
            Ok(payload) => Some(self.outbound_raw(route, payload)),
            Err(e) => {
                error!(route = %route, error = %e, "Failed to serialize outbound record");
                None
            }
        }
    }

    fn outbound_raw(&self, route: Route, payload: Vec<u8>) -> Outbound {
        Outbound {
            route,
            subject: self.subjects.for_route(route).to_string(),
            payload,
        }
    }
}

fn seconds(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}
