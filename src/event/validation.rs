use super::VideoEvent;
use serde_json::error::Category;
use thiserror::Error;

// Must match the `InvalidTimestamp` message, which reaches `from_json` as a
// serde custom error
const TIMESTAMP_ERROR_PREFIX: &str = "invalid timestamp '";
const TIMESTAMP_ERROR_SUFFIX: &str = "': expected an ISO-8601 date-time";

/// Structural failures. An event that hits one of these is never handed to
/// the quality validator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("malformed JSON payload: {0}")]
    MalformedJson(String),

    /// Missing field, wrong type or unrecognized enum value
    #[error("invalid event shape: {0}")]
    InvalidShape(String),

    #[error("invalid timestamp '{0}': expected an ISO-8601 date-time")]
    InvalidTimestamp(String),

    #[error("confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f64),

    #[error("bounding box {field} = {value} is out of range")]
    BoundingBoxOutOfRange { field: &'static str, value: f64 },

    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),
}

impl SchemaError {
    /// Splits serde_json failures into syntax problems and shape problems.
    pub(crate) fn from_json(err: serde_json::Error) -> Self {
        match err.classify() {
            Category::Syntax | Category::Eof | Category::Io => {
                SchemaError::MalformedJson(err.to_string())
            }
            Category::Data => {
                let msg = err.to_string();
                match rejected_timestamp(&msg) {
                    Some(raw) => SchemaError::InvalidTimestamp(raw.to_string()),
                    None => SchemaError::InvalidShape(msg),
                }
            }
        }
    }

    /// True when the payload was not JSON at all.
    pub fn is_malformed(&self) -> bool {
        matches!(self, SchemaError::MalformedJson(_))
    }
}

/// The raw value from a timestamp error raised while deserializing
fn rejected_timestamp(msg: &str) -> Option<&str> {
    let rest = msg.strip_prefix(TIMESTAMP_ERROR_PREFIX)?;
    let end = rest.rfind(TIMESTAMP_ERROR_SUFFIX)?;
    Some(&rest[..end])
}

/// Numeric range checks applied at construction time.
///
/// Rules:
/// - Confidence, when present: finite and within [0, 1]
/// - Bounding box: x >= 0, y >= 0, width > 0, height > 0
/// - Location, when present: latitude within [-90, 90], longitude within [-180, 180]
///
/// Identifier emptiness is deliberately left to the quality validator so it
/// is reported as a scored error rather than a dropped payload.
pub fn check_structure(event: &VideoEvent) -> Result<(), SchemaError> {
    if let Some(confidence) = event.data.confidence {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(SchemaError::ConfidenceOutOfRange(confidence));
        }
    }

    if let Some(bbox) = &event.data.bounding_box {
        check_bbox_field("x", bbox.x, |v| v >= 0.0)?;
        check_bbox_field("y", bbox.y, |v| v >= 0.0)?;
        check_bbox_field("width", bbox.width, |v| v > 0.0)?;
        check_bbox_field("height", bbox.height, |v| v > 0.0)?;
    }

    if let Some(location) = &event.source.location {
        if let Some(lat) = location.latitude {
            if !is_valid_latitude(lat) {
                return Err(SchemaError::LatitudeOutOfRange(lat));
            }
        }
        if let Some(lon) = location.longitude {
            if !is_valid_longitude(lon) {
                return Err(SchemaError::LongitudeOutOfRange(lon));
            }
        }
    }

    Ok(())
}

fn check_bbox_field(
    field: &'static str,
    value: f64,
    ok: impl Fn(f64) -> bool,
) -> Result<(), SchemaError> {
    if value.is_finite() && ok(value) {
        Ok(())
    } else {
        Err(SchemaError::BoundingBoxOutOfRange { field, value })
    }
}

pub(crate) fn is_valid_latitude(lat: f64) -> bool {
    (-90.0..=90.0).contains(&lat)
}

pub(crate) fn is_valid_longitude(lon: f64) -> bool {
    (-180.0..=180.0).contains(&lon)
}

#[cfg(test)]
mod validation_tests {
    use super::*;

    #[test]
    fn test_latitude_bounds() {
        assert!(is_valid_latitude(0.0));
        assert!(is_valid_latitude(-90.0));
        assert!(is_valid_latitude(90.0));
        assert!(!is_valid_latitude(90.0001));
        assert!(!is_valid_latitude(f64::NAN));
    }

    #[test]
    fn test_longitude_bounds() {
        assert!(is_valid_longitude(-180.0));
        assert!(is_valid_longitude(180.0));
        assert!(!is_valid_longitude(-180.5));
        assert!(!is_valid_longitude(f64::INFINITY));
    }

    #[test]
    fn test_json_error_classification() {
        let syntax = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(SchemaError::from_json(syntax).is_malformed());

        let data = serde_json::from_str::<u32>("\"text\"").unwrap_err();
        assert!(matches!(
            SchemaError::from_json(data),
            SchemaError::InvalidShape(_)
        ));
    }

    #[test]
    fn test_timestamp_error_message_round_trips() {
        let msg = SchemaError::InvalidTimestamp("it's late".to_string()).to_string();
        assert_eq!(rejected_timestamp(&msg), Some("it's late"));

        let located = format!("{} at line 1 column 40", msg);
        assert_eq!(rejected_timestamp(&located), Some("it's late"));

        assert_eq!(rejected_timestamp("invalid type: string, expected u32"), None);
    }
}
