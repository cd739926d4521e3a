use super::Outbound;
use crate::metrics::{Counter, PipelineMetrics};
use anyhow::Result;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

/// Closed-window aggregates waiting to be published.
///
/// Once a window closes its accumulator is gone, so a failed publish would
/// lose the aggregate. Records stay here until published, in close order.
/// The buffer is bounded: when full, the oldest records are evicted and
/// counted in `aggregates_dropped`.
pub struct PendingAggregates {
    records: VecDeque<Outbound>,
    capacity: usize,
    metrics: Arc<PipelineMetrics>,
}

impl PendingAggregates {
    pub fn new(capacity: usize, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            records: VecDeque::new(),
            capacity: capacity.max(1),
            metrics,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Queue newly closed aggregates behind any still unpublished
    pub fn extend(&mut self, records: Vec<Outbound>) {
        self.records.extend(records);

        let overflow = self.records.len().saturating_sub(self.capacity);
        if overflow > 0 {
            self.records.drain(..overflow);
            warn!(dropped = overflow, capacity = self.capacity, "Pending aggregate buffer full, dropping oldest");
            self.metrics.add(Counter::AggregatesDropped, overflow as u64);
        }
    }

    /// Publish queued records in order, stopping at the first failure.
    ///
    /// The failed record and everything behind it stay queued for the next
    /// call; each failed attempt counts in `aggregates_publish_failed`.
    pub async fn flush<F, Fut>(&mut self, mut publish: F) -> Result<()>
    where
        F: FnMut(Outbound) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        while let Some(record) = self.records.front() {
            if let Err(e) = publish(record.clone()).await {
                self.metrics.increment(Counter::AggregatesPublishFailed);
                return Err(e);
            }
            self.records.pop_front();
        }
        Ok(())
    }

    /// Give up on every queued record, counting them as dropped
    pub fn abandon(&mut self) -> usize {
        let dropped = self.records.len();
        self.records.clear();
        self.metrics.add(Counter::AggregatesDropped, dropped as u64);
        dropped
    }
}
