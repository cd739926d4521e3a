use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

mod reporter;

pub use reporter::run_metrics_reporter;

/// Sliding window used for the event rate, in milliseconds
const RATE_WINDOW_MS: i64 = 5000;

/// Named pipeline counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    ProcessedSuccess,
    ParseFailed,
    SchemaFailed,
    DataQualityFailed,
    Enriched,
    EnrichmentFailed,
    Filtered,
    AnomaliesDetected,
    WindowsAggregated,
    AggregationFailed,
    LateEventsDropped,
    WindowsDiscarded,
    AggregatesPublishFailed,
    AggregatesDropped,
}

impl Counter {
    pub const ALL: [Counter; 14] = [
        Counter::ProcessedSuccess,
        Counter::ParseFailed,
        Counter::SchemaFailed,
        Counter::DataQualityFailed,
        Counter::Enriched,
        Counter::EnrichmentFailed,
        Counter::Filtered,
        Counter::AnomaliesDetected,
        Counter::WindowsAggregated,
        Counter::AggregationFailed,
        Counter::LateEventsDropped,
        Counter::WindowsDiscarded,
        Counter::AggregatesPublishFailed,
        Counter::AggregatesDropped,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Counter::ProcessedSuccess => "events_processed_success",
            Counter::ParseFailed => "events_parse_failed",
            Counter::SchemaFailed => "events_schema_failed",
            Counter::DataQualityFailed => "events_data_quality_failed",
            Counter::Enriched => "events_enriched",
            Counter::EnrichmentFailed => "events_enrichment_failed",
            Counter::Filtered => "events_filtered",
            Counter::AnomaliesDetected => "anomalies_detected",
            Counter::WindowsAggregated => "windows_aggregated",
            Counter::AggregationFailed => "aggregation_failed",
            Counter::LateEventsDropped => "late_events_dropped",
            Counter::WindowsDiscarded => "windows_discarded",
            Counter::AggregatesPublishFailed => "aggregates_publish_failed",
            Counter::AggregatesDropped => "aggregates_dropped",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// Counters and throughput for one pipeline instance.
///
/// Shared by reference (`Arc<PipelineMetrics>`) between the processor, the
/// aggregator and the reporting tasks. Counter increments are lock-free.
pub struct PipelineMetrics {
    counters: [AtomicU64; Counter::ALL.len()],

    /// Accepted-event timestamps for rate calculation (sliding 5-second window)
    event_timestamps: RwLock<VecDeque<i64>>,

    /// Active sources (source_id -> last_seen_timestamp_ms)
    active_sources: RwLock<HashMap<String, i64>>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            counters: std::array::from_fn(|_| AtomicU64::new(0)),
            event_timestamps: RwLock::new(VecDeque::new()),
            active_sources: RwLock::new(HashMap::new()),
        }
    }

    pub fn increment(&self, counter: Counter) {
        self.add(counter, 1);
    }

    pub fn add(&self, counter: Counter, value: u64) {
        self.counters[counter.index()].fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counters[counter.index()].load(Ordering::Relaxed)
    }

    /// Record an accepted event for rate and active-source tracking
    pub fn record_event(&self, source_id: &str) {
        let now = Utc::now().timestamp_millis();

        {
            let mut timestamps = self
                .event_timestamps
                .write()
                .unwrap_or_else(|e| e.into_inner());
            timestamps.push_back(now);

            // Prune old timestamps (keep last 5 seconds)
            while let Some(&oldest) = timestamps.front() {
                if now - oldest > RATE_WINDOW_MS {
                    timestamps.pop_front();
                } else {
                    break;
                }
            }
        }

        {
            let mut sources = self
                .active_sources
                .write()
                .unwrap_or_else(|e| e.into_inner());
            sources.insert(source_id.to_string(), now);
        }
    }

    /// Accepted events per second over the last 5 seconds
    pub fn get_event_rate(&self) -> f64 {
        let timestamps = self
            .event_timestamps
            .read()
            .unwrap_or_else(|e| e.into_inner());
        timestamps.len() as f64 / (RATE_WINDOW_MS as f64 / 1000.0)
    }

    /// Count of sources seen within the window
    pub fn get_active_source_count(&self, window_seconds: i64) -> usize {
        let threshold = Utc::now().timestamp_millis() - window_seconds * 1000;

        let sources = self
            .active_sources
            .read()
            .unwrap_or_else(|e| e.into_inner());
        sources
            .values()
            .filter(|&&last_seen| last_seen > threshold)
            .count()
    }

    pub fn snapshot(&self, source_window_seconds: i64) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: Counter::ALL
                .iter()
                .map(|c| (c.name(), self.get(*c)))
                .collect(),
            event_rate: self.get_event_rate(),
            active_sources: self.get_active_source_count(source_window_seconds),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<&'static str, u64>,
    pub event_rate: f64,
    pub active_sources: usize,
}

impl MetricsSnapshot {
    pub fn counter(&self, counter: Counter) -> u64 {
        self.counters.get(counter.name()).copied().unwrap_or(0)
    }
}
