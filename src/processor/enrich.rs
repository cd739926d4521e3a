use crate::event::{VideoEvent, HIGH_CONFIDENCE};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnrichmentFault {
    /// The producer already set a derived attribute to something else
    #[error("attribute '{attribute}' already set to {existing}")]
    Conflict { attribute: &'static str, existing: Value },
}

/// Derive attributes for an event.
///
/// Only adds keys: an attribute the producer already set to the same value
/// is left alone, one set to a different value is a fault and the input is
/// not touched.
pub fn enrich(event: &VideoEvent) -> Result<VideoEvent, EnrichmentFault> {
    let mut derived: Vec<&'static str> = Vec::new();

    if event.event_type.is_detection()
        && event.data.confidence.is_some_and(|c| c > HIGH_CONFIDENCE)
    {
        derived.push("high_confidence");
    }
    if event.source.location.is_some() {
        derived.push("has_location");
    }

    let mut enriched = event.clone();
    if derived.is_empty() {
        return Ok(enriched);
    }

    let attributes = enriched.data.attributes.get_or_insert_with(Map::new);
    for attribute in derived {
        set_flag(attributes, attribute)?;
    }
    Ok(enriched)
}

fn set_flag(attributes: &mut Map<String, Value>, attribute: &'static str) -> Result<(), EnrichmentFault> {
    match attributes.get(attribute) {
        Some(Value::Bool(true)) => Ok(()),
        Some(existing) => Err(EnrichmentFault::Conflict {
            attribute,
            existing: existing.clone(),
        }),
        None => {
            attributes.insert(attribute.to_string(), Value::Bool(true));
            Ok(())
        }
    }
}
