use crate::event::{timestamp, SchemaError, VideoEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Downstream branch for a forwarded event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Normal,
    Anomaly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Normal,
}

/// An enriched, classified event ready for publishing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedEvent {
    pub event: VideoEvent,
    pub is_anomaly: bool,
    pub processing_priority: Priority,
    #[serde(with = "timestamp")]
    pub processed_at: DateTime<Utc>,
}

impl ClassifiedEvent {
    pub fn branch(&self) -> Branch {
        if self.is_anomaly {
            Branch::Anomaly
        } else {
            Branch::Normal
        }
    }
}

/// The quality gate rejected an event
#[derive(Debug, Clone, PartialEq, Error)]
#[error("event {event_id} failed data quality (score {score:.2}): {}", errors.join("; "))]
pub struct ValidationFailure {
    pub event_id: String,
    pub errors: Vec<String>,
    pub score: f64,
}

/// Why a message produced no output
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DropReason {
    /// Not JSON at all
    #[error("unparseable payload: {0}")]
    Malformed(SchemaError),

    /// JSON, but not a structurally valid event
    #[error("schema violation: {0}")]
    Schema(SchemaError),

    #[error(transparent)]
    DataQuality(#[from] ValidationFailure),
}

impl DropReason {
    /// Parse-stage drops carry a payload worth dead-lettering
    pub fn is_parse_failure(&self) -> bool {
        matches!(self, DropReason::Malformed(_) | DropReason::Schema(_))
    }
}

impl From<SchemaError> for DropReason {
    fn from(err: SchemaError) -> Self {
        if err.is_malformed() {
            DropReason::Malformed(err)
        } else {
            DropReason::Schema(err)
        }
    }
}

/// Result of processing one raw message
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    Forward(ClassifiedEvent),
    Dropped(DropReason),
}

impl ProcessOutcome {
    pub fn branch(&self) -> Option<Branch> {
        match self {
            ProcessOutcome::Forward(classified) => Some(classified.branch()),
            ProcessOutcome::Dropped(_) => None,
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Branch::Normal => f.write_str("normal"),
            Branch::Anomaly => f.write_str("anomaly"),
        }
    }
}
