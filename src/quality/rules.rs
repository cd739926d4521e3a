//! Semantic validation rules.
//!
//! Each rule inspects one already-constructed [`VideoEvent`] and reports
//! errors, warnings and its fixed severity. Rules are independent: the
//! validator runs all of them in registration order and a fault in one never
//! stops the others.

use crate::event::{EventType, VideoEvent};
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Events further in the future than this are rejected
pub const MAX_FUTURE_SKEW_MINUTES: i64 = 5;
/// Events older than this draw a warning
pub const STALE_AFTER_DAYS: i64 = 7;
/// Below this, person/vehicle detections draw a warning
pub const LOW_CONFIDENCE: f64 = 0.3;
/// Boxes narrower or shorter than this are likely noise
pub const MIN_BOX_SIDE: f64 = 10.0;
/// 4K UHD frame
pub const MAX_FRAME_WIDTH: f64 = 3840.0;
pub const MAX_FRAME_HEIGHT: f64 = 2160.0;

/// Evaluation context shared by every rule in one validation pass
#[derive(Debug, Clone, Copy)]
pub struct RuleContext {
    /// Validation wall-clock
    pub now: DateTime<Utc>,
}

/// What a single rule found
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub severity: f64,
}

impl RuleOutcome {
    pub fn new(severity: f64) -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            severity,
        }
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// A rule could not be evaluated at all
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct RuleFault(pub String);

/// Common interface of every semantic rule
pub trait ValidationRule: Send + Sync {
    /// Stable identifier used in fault messages
    fn name(&self) -> &'static str;

    /// Weight in (0, 1] applied to score deductions
    fn severity(&self) -> f64;

    fn evaluate(&self, event: &VideoEvent, ctx: &RuleContext) -> Result<RuleOutcome, RuleFault>;
}

/// The five built-in rules, in evaluation order.
pub fn default_rules() -> Vec<Box<dyn ValidationRule>> {
    vec![
        Box::new(TimestampValidity),
        Box::new(ConfidenceRange),
        Box::new(BoundingBoxValidity),
        Box::new(EventConsistency),
        Box::new(SourceIntegrity),
    ]
}

/// Future-dated, stale, and processing-before-occurrence timestamps
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampValidity;

impl ValidationRule for TimestampValidity {
    fn name(&self) -> &'static str {
        "timestamp_validity"
    }

    fn severity(&self) -> f64 {
        0.8
    }

    fn evaluate(&self, event: &VideoEvent, ctx: &RuleContext) -> Result<RuleOutcome, RuleFault> {
        let mut outcome = RuleOutcome::new(self.severity());

        let latest = ctx
            .now
            .checked_add_signed(Duration::minutes(MAX_FUTURE_SKEW_MINUTES))
            .ok_or_else(|| RuleFault(format!("clock {} cannot be offset forward", ctx.now)))?;
        let oldest = ctx
            .now
            .checked_sub_signed(Duration::days(STALE_AFTER_DAYS))
            .ok_or_else(|| RuleFault(format!("clock {} cannot be offset backward", ctx.now)))?;

        if event.timestamp > latest {
            outcome.error("Timestamp is too far in the future");
        }
        if event.timestamp < oldest {
            outcome.warn("Timestamp is quite old (more than 7 days)");
        }

        let processing_time = event
            .processing_metadata
            .as_ref()
            .and_then(|m| m.processing_time);
        if let Some(processed) = processing_time {
            if processed < event.timestamp {
                outcome.warn("Processing time is before event timestamp");
            }
        }

        Ok(outcome)
    }
}

/// Repeats the construction-time confidence check so events built by hand
/// still get a readable error, and flags weak detections.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceRange;

impl ValidationRule for ConfidenceRange {
    fn name(&self) -> &'static str {
        "confidence_range"
    }

    fn severity(&self) -> f64 {
        0.5
    }

    fn evaluate(&self, event: &VideoEvent, _ctx: &RuleContext) -> Result<RuleOutcome, RuleFault> {
        let mut outcome = RuleOutcome::new(self.severity());

        let Some(confidence) = event.data.confidence else {
            return Ok(outcome);
        };
        if confidence.is_nan() {
            return Err(RuleFault("confidence is NaN".to_string()));
        }

        if !(0.0..=1.0).contains(&confidence) {
            outcome.error(format!(
                "Confidence score {} is out of range [0,1]",
                confidence
            ));
        }
        if event.event_type.is_visual_detection() && confidence < LOW_CONFIDENCE {
            outcome.warn("Very low confidence for detection event");
        }

        Ok(outcome)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BoundingBoxValidity;

impl ValidationRule for BoundingBoxValidity {
    fn name(&self) -> &'static str {
        "bounding_box_validity"
    }

    fn severity(&self) -> f64 {
        0.6
    }

    fn evaluate(&self, event: &VideoEvent, _ctx: &RuleContext) -> Result<RuleOutcome, RuleFault> {
        let mut outcome = RuleOutcome::new(self.severity());

        let Some(bbox) = &event.data.bounding_box else {
            return Ok(outcome);
        };
        if [bbox.x, bbox.y, bbox.width, bbox.height]
            .iter()
            .any(|v| v.is_nan())
        {
            return Err(RuleFault("bounding box contains NaN".to_string()));
        }

        if bbox.x < 0.0 || bbox.y < 0.0 {
            outcome.error("Bounding box has negative coordinates");
        }
        if bbox.width <= 0.0 || bbox.height <= 0.0 {
            outcome.error("Bounding box has invalid dimensions");
        }
        if bbox.width < MIN_BOX_SIDE || bbox.height < MIN_BOX_SIDE {
            outcome.warn("Bounding box is very small");
        }
        if bbox.width > MAX_FRAME_WIDTH || bbox.height > MAX_FRAME_HEIGHT {
            outcome.warn("Bounding box dimensions exceed typical video resolution");
        }

        Ok(outcome)
    }
}

/// Event type vs. payload agreement
#[derive(Debug, Clone, Copy, Default)]
pub struct EventConsistency;

impl ValidationRule for EventConsistency {
    fn name(&self) -> &'static str {
        "event_consistency"
    }

    fn severity(&self) -> f64 {
        0.7
    }

    fn evaluate(&self, event: &VideoEvent, _ctx: &RuleContext) -> Result<RuleOutcome, RuleFault> {
        let mut outcome = RuleOutcome::new(self.severity());
        let kind = event.event_type;

        if kind.is_detection() && event.data.confidence.is_none() {
            outcome.warn(format!("Detection event '{}' missing confidence score", kind));
        }
        if kind.is_visual_detection() && event.data.bounding_box.is_none() {
            outcome.warn(format!(
                "Visual detection event '{}' missing bounding box",
                kind
            ));
        }

        let has_metrics = event.data.metrics.as_ref().is_some_and(|m| !m.is_empty());
        if kind == EventType::PerformanceMetric && !has_metrics {
            outcome.error("Performance metric event missing metrics data");
        }

        Ok(outcome)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SourceIntegrity;

impl ValidationRule for SourceIntegrity {
    fn name(&self) -> &'static str {
        "source_integrity"
    }

    fn severity(&self) -> f64 {
        0.4
    }

    fn evaluate(&self, event: &VideoEvent, _ctx: &RuleContext) -> Result<RuleOutcome, RuleFault> {
        let mut outcome = RuleOutcome::new(self.severity());
        let source = &event.source;

        if source.source_id.trim().is_empty() {
            outcome.error("Empty video source ID");
        }
        if source.camera_id.trim().is_empty() {
            outcome.error("Empty camera ID");
        }

        if let Some(location) = &source.location {
            if let Some(lat) = location.latitude {
                if !(-90.0..=90.0).contains(&lat) {
                    outcome.error("Invalid latitude value");
                }
            }
            if let Some(lon) = location.longitude {
                if !(-180.0..=180.0).contains(&lon) {
                    outcome.error("Invalid longitude value");
                }
            }
        }

        Ok(outcome)
    }
}
