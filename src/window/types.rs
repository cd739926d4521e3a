//! Window bounds and epoch-aligned fixed windows

use super::AggregationError;
use crate::event::{timestamp, EventType};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Time bounds of one window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowBounds {
    /// Start time of the window (inclusive)
    #[serde(with = "timestamp")]
    pub start: DateTime<Utc>,
    /// End time of the window (exclusive)
    #[serde(with = "timestamp")]
    pub end: DateTime<Utc>,
}

impl WindowBounds {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> Duration {
        self.end.signed_duration_since(self.start)
    }

    /// Check if a timestamp falls within this window
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp < self.end
    }
}

impl fmt::Display for WindowBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} - {})",
            self.start.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.end.format("%Y-%m-%d %H:%M:%S%.3f")
        )
    }
}

impl PartialOrd for WindowBounds {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WindowBounds {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.start
            .cmp(&other.start)
            .then_with(|| self.end.cmp(&other.end))
    }
}

/// Tumbling windows of a whole number of seconds, aligned to the Unix epoch.
///
/// ```text
/// Window size: 60 seconds
/// Event at 00:00:10 -> [00:00:00, 00:01:00)
/// Event at 00:01:00 -> [00:01:00, 00:02:00)
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FixedWindows {
    size_seconds: i64,
}

impl FixedWindows {
    /// Zero is treated as one second; config validation rejects it earlier.
    pub fn new(size_seconds: u64) -> Self {
        // Largest size a `Duration` can represent
        let max = (i64::MAX / 1000) as u64;
        Self {
            size_seconds: size_seconds.clamp(1, max) as i64,
        }
    }

    pub fn size(&self) -> Duration {
        Duration::seconds(self.size_seconds)
    }

    /// The single window containing `timestamp`
    pub fn assign(&self, timestamp: DateTime<Utc>) -> Result<WindowBounds, AggregationError> {
        let secs = timestamp.timestamp();
        let aligned = secs - secs.rem_euclid(self.size_seconds);

        let start = DateTime::from_timestamp(aligned, 0)
            .ok_or(AggregationError::OutOfRange(timestamp))?;
        let end = start
            .checked_add_signed(self.size())
            .ok_or(AggregationError::OutOfRange(timestamp))?;

        Ok(WindowBounds::new(start, end))
    }
}

/// What happens to windows still open when the aggregator stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownPolicy {
    /// Emit every open window as if its watermark had passed
    #[default]
    Flush,
    /// Drop open windows without emitting, counted as discarded
    Discard,
}

/// Summary of one source over one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowAggregate {
    #[serde(with = "timestamp")]
    pub window_start: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub window_end: DateTime<Utc>,
    pub source_id: String,
    pub total_events: u64,
    pub event_type_counts: BTreeMap<EventType, u64>,
    /// Mean of observed confidence values, 0 when none were observed
    pub average_confidence: f64,
    pub high_confidence_events: u64,
    #[serde(with = "timestamp")]
    pub aggregated_at: DateTime<Utc>,
}

impl WindowAggregate {
    pub fn bounds(&self) -> WindowBounds {
        WindowBounds::new(self.window_start, self.window_end)
    }
}
