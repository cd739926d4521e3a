use super::types::{FixedWindows, ShutdownPolicy, WindowAggregate, WindowBounds};
use super::AggregationError;
use crate::event::{EventType, VideoEvent, HIGH_CONFIDENCE};
use crate::metrics::{Counter, PipelineMetrics};
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Open-window state for one (source, window)
#[derive(Debug, Default)]
struct Accumulator {
    total_events: u64,
    event_type_counts: BTreeMap<EventType, u64>,
    confidences: Vec<f64>,
}

impl Accumulator {
    fn add(&mut self, event: &VideoEvent) {
        self.total_events += 1;
        *self.event_type_counts.entry(event.event_type).or_insert(0) += 1;
        if let Some(confidence) = event.data.confidence {
            self.confidences.push(confidence);
        }
    }

    fn finish(self, source_id: String, window: WindowBounds) -> WindowAggregate {
        let average_confidence = if self.confidences.is_empty() {
            0.0
        } else {
            self.confidences.iter().sum::<f64>() / self.confidences.len() as f64
        };
        let high_confidence_events = self
            .confidences
            .iter()
            .filter(|&&c| c > HIGH_CONFIDENCE)
            .count() as u64;

        WindowAggregate {
            window_start: window.start,
            window_end: window.end,
            source_id,
            total_events: self.total_events,
            event_type_counts: self.event_type_counts,
            average_confidence,
            high_confidence_events,
            aggregated_at: Utc::now(),
        }
    }
}

/// Per-source, event-time windowed reducer.
///
/// Open windows live in a `DashMap` keyed by `(source_id, window)`; every
/// update and close for one key happens under that key's entry lock, so a
/// window is emitted at most once and never mutated afterwards.
///
/// A window closes when `advance_watermark` passes `end + allowed_lateness`
/// or when `close` is called for it. Events for a window that has already
/// closed for their source, or that the watermark has already passed, are
/// dropped and counted as late. Closing one window never closes another.
pub struct WindowedAggregator {
    windows: FixedWindows,
    allowed_lateness: Duration,
    open: DashMap<(String, WindowBounds), Accumulator>,
    /// Windows closed ahead of the watermark, pruned once it passes them
    closed: DashSet<(String, WindowBounds)>,
    /// Last watermark seen, epoch millis (`i64::MIN` before the first)
    watermark_millis: AtomicI64,
    metrics: Arc<PipelineMetrics>,
}

impl WindowedAggregator {
    pub fn new(windows: FixedWindows, allowed_lateness: Duration, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            windows,
            allowed_lateness,
            open: DashMap::new(),
            closed: DashSet::new(),
            watermark_millis: AtomicI64::new(i64::MIN),
            metrics,
        }
    }

    pub fn assign(&self, timestamp: DateTime<Utc>) -> Result<WindowBounds, AggregationError> {
        self.windows.assign(timestamp)
    }

    /// Number of windows currently open across all sources
    pub fn open_windows(&self) -> usize {
        self.open.len()
    }

    /// Assign the event to its window and add it under its source id
    pub fn observe(&self, event: &VideoEvent) -> Result<WindowBounds, AggregationError> {
        let window = self.assign(event.timestamp).inspect_err(|e| self.fault(e))?;
        self.add(event.source_id(), window, event)?;
        Ok(window)
    }

    /// Add one event to the accumulator for `(key, window)`.
    ///
    /// Late events are counted in `late_events_dropped`; every other error
    /// is counted in `aggregation_failed`. Neither affects other keys.
    pub fn add(&self, key: &str, window: WindowBounds, event: &VideoEvent) -> Result<(), AggregationError> {
        self.check_event(key, window, event)
            .inspect_err(|e| self.fault(e))?;

        match self.open.entry((key.to_string(), window)) {
            Entry::Occupied(mut open) => {
                open.get_mut().add(event);
                Ok(())
            }
            Entry::Vacant(vacant) => {
                if self.is_closed(key, window) {
                    debug!(
                        event_id = %event.event_id,
                        source_id = %key,
                        window = %window,
                        "Dropping event for closed window"
                    );
                    self.metrics.increment(Counter::LateEventsDropped);
                    return Err(AggregationError::Late {
                        source_id: key.to_string(),
                        window,
                    });
                }
                vacant.insert(Accumulator::default()).add(event);
                Ok(())
            }
        }
    }

    /// Close one window and emit its aggregate. `None` if it was not open.
    pub fn close(&self, key: &str, window: WindowBounds) -> Option<WindowAggregate> {
        let (source_id, acc) = self.take(key, window)?;

        let aggregate = acc.finish(source_id, window);
        self.metrics.increment(Counter::WindowsAggregated);
        debug!(
            source_id = %aggregate.source_id,
            window = %window,
            total_events = aggregate.total_events,
            "Window closed"
        );
        Some(aggregate)
    }

    /// Move the watermark forward and close every window it has passed.
    ///
    /// Closed windows come back ordered by window start, then source id.
    pub fn advance_watermark(&self, watermark: DateTime<Utc>) -> Vec<WindowAggregate> {
        self.watermark_millis
            .fetch_max(watermark.timestamp_millis(), Ordering::AcqRel);

        let mut due: Vec<(String, WindowBounds)> = self
            .open
            .iter()
            .filter(|entry| self.is_past(entry.key().1, watermark))
            .map(|entry| entry.key().clone())
            .collect();
        due.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let closed = due
            .into_iter()
            .filter_map(|(key, window)| self.close(&key, window))
            .collect();

        // The watermark alone now rejects these
        self.closed.retain(|(_, window)| !self.is_past(*window, watermark));
        closed
    }

    /// Stop aggregating, flushing or discarding every open window
    pub fn shutdown(&self, policy: ShutdownPolicy) -> Vec<WindowAggregate> {
        let mut open: Vec<(String, WindowBounds)> =
            self.open.iter().map(|entry| entry.key().clone()).collect();
        open.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        match policy {
            ShutdownPolicy::Flush => open
                .into_iter()
                .filter_map(|(key, window)| self.close(&key, window))
                .collect(),
            ShutdownPolicy::Discard => {
                let mut discarded = 0u64;
                for (key, window) in open {
                    if self.take(&key, window).is_some() {
                        discarded += 1;
                    }
                }
                if discarded > 0 {
                    warn!(windows = discarded, "Discarding open windows on shutdown");
                }
                self.metrics.add(Counter::WindowsDiscarded, discarded);
                Vec::new()
            }
        }
    }

    /// Remove an open window, marking it closed for its source under the
    /// same entry lock so no concurrent `add` can reopen it.
    fn take(&self, key: &str, window: WindowBounds) -> Option<(String, Accumulator)> {
        let Entry::Occupied(open) = self.open.entry((key.to_string(), window)) else {
            return None;
        };

        self.closed.insert((key.to_string(), window));
        let ((source_id, _), acc) = open.remove_entry();
        Some((source_id, acc))
    }

    fn check_event(&self, key: &str, window: WindowBounds, event: &VideoEvent) -> Result<(), AggregationError> {
        if event.source_id() != key {
            return Err(AggregationError::KeyMismatch {
                event_id: event.event_id.clone(),
                expected: key.to_string(),
                actual: event.source_id().to_string(),
            });
        }
        if !window.contains(event.timestamp) {
            return Err(AggregationError::WindowMismatch {
                event_id: event.event_id.clone(),
                timestamp: event.timestamp,
                window,
            });
        }
        if let Some(confidence) = event.data.confidence {
            if !confidence.is_finite() {
                return Err(AggregationError::NonFiniteConfidence {
                    event_id: event.event_id.clone(),
                    confidence,
                });
            }
        }
        Ok(())
    }

    fn is_past(&self, window: WindowBounds, watermark: DateTime<Utc>) -> bool {
        match window.end.checked_add_signed(self.allowed_lateness) {
            Some(deadline) => deadline <= watermark,
            None => false,
        }
    }

    fn is_closed(&self, key: &str, window: WindowBounds) -> bool {
        if self.closed.contains(&(key.to_string(), window)) {
            return true;
        }
        match self.watermark_millis.load(Ordering::Acquire) {
            i64::MIN => false,
            millis => DateTime::from_timestamp_millis(millis)
                .is_some_and(|watermark| self.is_past(window, watermark)),
        }
    }

    fn fault(&self, err: &AggregationError) {
        warn!(error = %err, "Aggregation fault");
        self.metrics.increment(Counter::AggregationFailed);
    }
}
