use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Bounded out-of-orderness watermark.
///
/// Tracks the newest event time seen and trails it by a fixed delay, so an
/// event up to `max_out_of_orderness` older than the newest one still lands
/// in an open window.
#[derive(Debug)]
pub struct WatermarkTracker {
    max_out_of_orderness: Duration,
    /// Newest event time in epoch millis, `i64::MIN` before the first event
    max_event_millis: AtomicI64,
}

impl WatermarkTracker {
    pub fn new(max_out_of_orderness: Duration) -> Self {
        Self {
            max_out_of_orderness,
            max_event_millis: AtomicI64::new(i64::MIN),
        }
    }

    /// Record an event time; the watermark never moves backward
    pub fn on_event(&self, timestamp: DateTime<Utc>) {
        self.max_event_millis
            .fetch_max(timestamp.timestamp_millis(), Ordering::AcqRel);
    }

    pub fn max_event_time(&self) -> Option<DateTime<Utc>> {
        match self.max_event_millis.load(Ordering::Acquire) {
            i64::MIN => None,
            millis => DateTime::from_timestamp_millis(millis),
        }
    }

    /// Current watermark, or `None` before any event was seen
    pub fn current(&self) -> Option<DateTime<Utc>> {
        let max = self.max_event_time()?;
        Some(
            max.checked_sub_signed(self.max_out_of_orderness)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        )
    }
}
