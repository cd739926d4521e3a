use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

pub mod timestamp;
mod validation;

pub use validation::{check_structure, SchemaError};

/// Confidence above which a detection counts as high-confidence, both for the
/// `high_confidence` attribute and for window aggregates
pub const HIGH_CONFIDENCE: f64 = 0.9;

/// Closed set of event kinds produced by the video analytics edge.
///
/// Serialized as its snake_case name (e.g. `"person_detected"`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    MotionDetected,
    PersonDetected,
    VehicleDetected,
    AnomalyDetected,
    PerformanceMetric,
    SystemEvent,
}

impl EventType {
    pub const ALL: [EventType; 6] = [
        EventType::MotionDetected,
        EventType::PersonDetected,
        EventType::VehicleDetected,
        EventType::AnomalyDetected,
        EventType::PerformanceMetric,
        EventType::SystemEvent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::MotionDetected => "motion_detected",
            EventType::PersonDetected => "person_detected",
            EventType::VehicleDetected => "vehicle_detected",
            EventType::AnomalyDetected => "anomaly_detected",
            EventType::PerformanceMetric => "performance_metric",
            EventType::SystemEvent => "system_event",
        }
    }

    /// Motion, person and vehicle detections.
    pub fn is_detection(&self) -> bool {
        matches!(
            self,
            EventType::MotionDetected | EventType::PersonDetected | EventType::VehicleDetected
        )
    }

    /// Detections of a concrete object in frame (person, vehicle).
    pub fn is_visual_detection(&self) -> bool {
        matches!(self, EventType::PersonDetected | EventType::VehicleDetected)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geographic location of a camera
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Camera / device that produced the event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoSource {
    pub source_id: String,
    pub camera_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl VideoSource {
    pub fn new(source_id: impl Into<String>, camera_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            camera_id: camera_id.into(),
            location: None,
        }
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

/// Pixel-space box around a detected object
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }
}

/// Detection payload. Every field is optional; which ones are expected
/// depends on the event type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<HashMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Map<String, Value>>,
}

impl EventData {
    pub fn with_confidence(confidence: f64) -> Self {
        Self {
            confidence: Some(confidence),
            ..Default::default()
        }
    }
}

/// Stamped by the processor once an event passes the quality gate
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_version: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "timestamp::option"
    )]
    pub processing_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

/// VideoEvent is a single analytics event emitted by a camera pipeline.
///
/// Instances built through [`VideoEvent::from_slice`], [`VideoEvent::from_value`]
/// or [`VideoEvent::new`] have passed the structural checks in
/// [`check_structure`]. Fields stay public so downstream stages can read them
/// freely; nothing mutates an event after the processor has enriched it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoEvent {
    /// Opaque producer-assigned identifier
    pub event_id: String,

    /// When the event occurred (UTC)
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,

    /// Producing camera
    #[serde(rename = "video_source", alias = "source")]
    pub source: VideoSource,

    pub event_type: EventType,

    pub data: EventData,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_metadata: Option<ProcessingMetadata>,
}

impl VideoEvent {
    /// Builds an event from already-typed parts, applying the structural checks.
    pub fn new(
        event_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        source: VideoSource,
        event_type: EventType,
        data: EventData,
    ) -> Result<Self, SchemaError> {
        let event = Self {
            event_id: event_id.into(),
            timestamp,
            source,
            event_type,
            data,
            processing_metadata: None,
        };
        check_structure(&event)?;
        Ok(event)
    }

    /// Parses one raw message payload.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, SchemaError> {
        let event: VideoEvent = serde_json::from_slice(bytes).map_err(SchemaError::from_json)?;
        check_structure(&event)?;
        Ok(event)
    }

    /// Parses an already-decoded JSON document.
    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        let event: VideoEvent = serde_json::from_value(value).map_err(SchemaError::from_json)?;
        check_structure(&event)?;
        Ok(event)
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn confidence(&self) -> Option<f64> {
        self.data.confidence
    }

    pub fn source_id(&self) -> &str {
        &self.source.source_id
    }
}
