// Event-time windowed aggregation of normal events

mod aggregator;
mod types;
mod watermark;

pub use aggregator::WindowedAggregator;
pub use types::{FixedWindows, ShutdownPolicy, WindowAggregate, WindowBounds};
pub use watermark::WatermarkTracker;

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregationError {
    #[error("event {event_id} belongs to source '{actual}', not '{expected}'")]
    KeyMismatch {
        event_id: String,
        expected: String,
        actual: String,
    },

    #[error("event {event_id} at {timestamp} is outside window {window}")]
    WindowMismatch {
        event_id: String,
        timestamp: DateTime<Utc>,
        window: WindowBounds,
    },

    #[error("event {event_id} has non-finite confidence {confidence}")]
    NonFiniteConfidence { event_id: String, confidence: f64 },

    /// The window already closed for this source
    #[error("window {window} for source '{source_id}' is already closed")]
    Late {
        source_id: String,
        window: WindowBounds,
    },

    #[error("timestamp {0} cannot be assigned to a window")]
    OutOfRange(DateTime<Utc>),
}

impl AggregationError {
    pub fn is_late(&self) -> bool {
        matches!(self, AggregationError::Late { .. })
    }
}
