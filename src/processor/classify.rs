use super::types::{ClassifiedEvent, Priority};
use crate::event::{EventType, VideoEvent};
use chrono::{DateTime, Utc};

/// Anomaly iff the producer flagged one, or a detection exceeds `threshold`.
pub fn is_anomaly(event: &VideoEvent, threshold: f64) -> bool {
    if event.event_type == EventType::AnomalyDetected {
        return true;
    }
    event.event_type.is_detection() && event.data.confidence.is_some_and(|c| c > threshold)
}

pub fn classify(event: VideoEvent, threshold: f64, now: DateTime<Utc>) -> ClassifiedEvent {
    let is_anomaly = is_anomaly(&event, threshold);
    ClassifiedEvent {
        event,
        is_anomaly,
        processing_priority: if is_anomaly {
            Priority::High
        } else {
            Priority::Normal
        },
        processed_at: now,
    }
}
