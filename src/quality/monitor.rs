use super::ValidationResult;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

/// Number of messages listed in `top_errors` / `top_warnings`
const TOP_N: usize = 5;

/// One validation outcome as seen by the monitor
#[derive(Debug, Clone)]
struct QualityRecord {
    recorded_at: DateTime<Utc>,
    event_id: String,
    score: f64,
    is_valid: bool,
    errors: Vec<String>,
    warnings: Vec<String>,
}

/// Rolling accumulator over validation results.
///
/// History is bounded two ways: entries older than the retention period are
/// trimmed on every insert, and the buffer never holds more than
/// `max_records` entries (oldest evicted first).
#[derive(Clone)]
pub struct QualityMonitor {
    records: Arc<RwLock<VecDeque<QualityRecord>>>,
    retention: Duration,
    max_records: usize,
}

impl QualityMonitor {
    pub fn new(retention_minutes: i64, max_records: usize) -> Self {
        Self {
            records: Arc::new(RwLock::new(VecDeque::new())),
            retention: Duration::try_minutes(retention_minutes.max(1)).unwrap_or(Duration::MAX),
            max_records: max_records.max(1),
        }
    }

    /// Record a validation result at the current time
    pub fn record_validation_result(&self, result: &ValidationResult, event_id: &str) {
        self.record_at(result, event_id, Utc::now());
    }

    pub fn record_at(&self, result: &ValidationResult, event_id: &str, now: DateTime<Utc>) {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());

        records.push_back(QualityRecord {
            recorded_at: now,
            event_id: event_id.to_string(),
            score: result.score,
            is_valid: result.is_valid,
            errors: result.errors.clone(),
            warnings: result.warnings.clone(),
        });

        // Trim by age, then by size
        let cutoff = window_start(now, self.retention);
        while let Some(oldest) = records.front() {
            if oldest.recorded_at < cutoff || records.len() > self.max_records {
                records.pop_front();
            } else {
                break;
            }
        }
    }

    /// Number of retained records
    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Quality metrics over the trailing `window_minutes`, or `None` when no
    /// validation was recorded in that window.
    pub fn get_quality_metrics(&self, window_minutes: i64) -> Option<QualityReport> {
        self.get_quality_metrics_at(window_minutes, Utc::now())
    }

    pub fn get_quality_metrics_at(
        &self,
        window_minutes: i64,
        now: DateTime<Utc>,
    ) -> Option<QualityReport> {
        let cutoff = Duration::try_minutes(window_minutes)
            .map_or(DateTime::<Utc>::MIN_UTC, |window| window_start(now, window));
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());

        let recent: Vec<&QualityRecord> = records
            .iter()
            .filter(|r| r.recorded_at > cutoff)
            .collect();
        if recent.is_empty() {
            return None;
        }

        let total_events = recent.len();
        let valid_events = recent.iter().filter(|r| r.is_valid).count();
        let score_sum: f64 = recent.iter().map(|r| r.score).sum();

        Some(QualityReport {
            window_minutes,
            total_events,
            valid_events,
            validity_rate: valid_events as f64 / total_events as f64,
            average_quality_score: score_sum / total_events as f64,
            total_errors: recent.iter().map(|r| r.errors.len()).sum(),
            total_warnings: recent.iter().map(|r| r.warnings.len()).sum(),
            top_errors: top_messages(recent.iter().flat_map(|r| r.errors.iter())),
            top_warnings: top_messages(recent.iter().flat_map(|r| r.warnings.iter())),
            recent_invalid_events: recent
                .iter()
                .rev()
                .filter(|r| !r.is_valid)
                .take(TOP_N)
                .map(|r| r.event_id.clone())
                .collect(),
        })
    }
}

impl Default for QualityMonitor {
    /// One hour of history, at most 100k records
    fn default() -> Self {
        Self::new(60, 100_000)
    }
}

/// Start of the trailing window ending at `now`. Windows reaching past the
/// representable range cover all retained history.
fn window_start(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Counts messages and returns the most frequent, ties in first-seen order.
fn top_messages<'a>(messages: impl Iterator<Item = &'a String>) -> Vec<MessageCount> {
    let mut order: Vec<MessageCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for msg in messages {
        match index.get(msg.as_str()) {
            Some(&i) => order[i].count += 1,
            None => {
                index.insert(msg.as_str(), order.len());
                order.push(MessageCount {
                    message: msg.clone(),
                    count: 1,
                });
            }
        }
    }

    // Stable sort keeps first-seen order among equal counts
    order.sort_by(|a, b| b.count.cmp(&a.count));
    order.truncate(TOP_N);
    order
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageCount {
    pub message: String,
    pub count: usize,
}

/// Snapshot of data quality over a trailing window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub window_minutes: i64,
    pub total_events: usize,
    pub valid_events: usize,
    pub validity_rate: f64,
    pub average_quality_score: f64,
    pub total_errors: usize,
    pub total_warnings: usize,
    pub top_errors: Vec<MessageCount>,
    pub top_warnings: Vec<MessageCount>,
    /// Most recent invalid event ids, newest first
    pub recent_invalid_events: Vec<String>,
}
