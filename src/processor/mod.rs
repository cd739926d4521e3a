//! Per-event processing: parse, validate and gate, enrich, classify.
//!
//! Every stage is a pure function of the message and the injected clock,
//! apart from the shared counters and quality monitor. Any number of
//! messages may be processed concurrently through one `EventProcessor`.

mod classify;
mod enrich;
mod types;

pub use classify::{classify, is_anomaly};
pub use enrich::{enrich, EnrichmentFault};
pub use types::{Branch, ClassifiedEvent, DropReason, ProcessOutcome, Priority, ValidationFailure};

use crate::config::ProcessingConfig;
use crate::event::{ProcessingMetadata, VideoEvent};
use crate::metrics::{Counter, PipelineMetrics};
use crate::quality::{QualityMonitor, QualityValidator};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, warn};

pub struct EventProcessor {
    config: ProcessingConfig,
    validator: QualityValidator,
    metrics: Arc<PipelineMetrics>,
    monitor: QualityMonitor,
}

impl EventProcessor {
    pub fn new(config: ProcessingConfig, metrics: Arc<PipelineMetrics>, monitor: QualityMonitor) -> Self {
        Self::with_validator(config, QualityValidator::new(), metrics, monitor)
    }

    pub fn with_validator(
        config: ProcessingConfig,
        validator: QualityValidator,
        metrics: Arc<PipelineMetrics>,
        monitor: QualityMonitor,
    ) -> Self {
        Self {
            config,
            validator,
            metrics,
            monitor,
        }
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Process one raw message against the wall clock
    pub fn process(&self, payload: &[u8]) -> ProcessOutcome {
        self.process_at(payload, Utc::now())
    }

    /// Process one raw message with an explicit clock
    pub fn process_at(&self, payload: &[u8], now: DateTime<Utc>) -> ProcessOutcome {
        let event = match self.parse(payload) {
            Ok(event) => event,
            Err(reason) => return ProcessOutcome::Dropped(reason),
        };

        let event = match self.validate(event, now) {
            Ok(event) => event,
            Err(failure) => return ProcessOutcome::Dropped(failure.into()),
        };

        let event = self.enrich(event);
        ProcessOutcome::Forward(self.classify(event, now))
    }

    /// Stage 1: bytes to a structurally valid event
    pub fn parse(&self, payload: &[u8]) -> Result<VideoEvent, DropReason> {
        VideoEvent::from_slice(payload).map_err(|err| {
            let reason = DropReason::from(err);
            match &reason {
                DropReason::Malformed(e) => {
                    error!(error = %e, "Failed to parse event payload");
                    self.metrics.increment(Counter::ParseFailed);
                }
                _ => {
                    warn!(error = %reason, "Event failed schema validation");
                    self.metrics.increment(Counter::SchemaFailed);
                }
            }
            reason
        })
    }

    /// Stage 2: quality gate. Valid events are stamped with processing metadata.
    pub fn validate(&self, mut event: VideoEvent, now: DateTime<Utc>) -> Result<VideoEvent, ValidationFailure> {
        let result = self.validator.validate_event_at(&event, now);
        self.monitor.record_at(&result, &event.event_id, now);

        if !result.is_valid {
            warn!(
                event_id = %event.event_id,
                score = result.score,
                errors = ?result.errors,
                "Data quality check failed"
            );
            self.metrics.increment(Counter::DataQualityFailed);
            return Err(ValidationFailure {
                event_id: event.event_id,
                errors: result.errors,
                score: result.score,
            });
        }

        let metadata = event
            .processing_metadata
            .get_or_insert_with(ProcessingMetadata::default);
        metadata.pipeline_version = Some(self.config.pipeline_version.clone());
        metadata.processing_time = Some(now);

        self.metrics.increment(Counter::ProcessedSuccess);
        self.metrics.record_event(event.source_id());
        Ok(event)
    }

    /// Stage 3: best-effort enrichment. On a fault the event is returned as is.
    pub fn enrich(&self, event: VideoEvent) -> VideoEvent {
        match enrich(&event) {
            Ok(enriched) => {
                self.metrics.increment(Counter::Enriched);
                enriched
            }
            Err(fault) => {
                error!(event_id = %event.event_id, error = %fault, "Error enriching event");
                self.metrics.increment(Counter::EnrichmentFailed);
                event
            }
        }
    }

    /// Stage 4: anomaly routing
    pub fn classify(&self, event: VideoEvent, now: DateTime<Utc>) -> ClassifiedEvent {
        let classified = classify(event, self.config.anomaly_confidence_threshold, now);

        if classified.is_anomaly {
            self.metrics.increment(Counter::AnomaliesDetected);
        }
        self.metrics.increment(Counter::Filtered);

        debug!(
            event_id = %classified.event.event_id,
            branch = %classified.branch(),
            "Event classified"
        );
        classified
    }
}
