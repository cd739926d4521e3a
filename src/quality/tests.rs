use super::*;
use crate::event::{
    BoundingBox, EventData, EventType, Location, ProcessingMetadata, VideoEvent, VideoSource,
};
use chrono::{Duration, TimeZone};
use std::collections::HashMap;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 11, 13, 0, 0).unwrap()
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {}, got {}",
        expected,
        actual
    );
}

/// Person detection that passes every rule
fn clean_event() -> VideoEvent {
    VideoEvent {
        event_id: "test_event_001".to_string(),
        timestamp: now() - Duration::seconds(30),
        source: VideoSource::new("camera_001", "cam_123"),
        event_type: EventType::PersonDetected,
        data: EventData {
            confidence: Some(0.95),
            bounding_box: Some(BoundingBox::new(10.0, 20.0, 100.0, 80.0)),
            metrics: None,
            attributes: None,
        },
        processing_metadata: None,
    }
}

#[test]
fn test_clean_event_scores_one() {
    let validator = QualityValidator::new();
    let result = validator.validate_event_at(&clean_event(), now());

    assert!(result.is_valid);
    assert!(result.errors.is_empty());
    assert!(result.warnings.is_empty());
    assert_eq!(result.score, 1.0);
}

#[test]
fn test_clean_event_any_confidence_scores_one() {
    let validator = QualityValidator::new();
    for confidence in [0.3, 0.5, 0.75, 0.9, 1.0] {
        let mut event = clean_event();
        event.data.confidence = Some(confidence);

        let result = validator.validate_event_at(&event, now());
        assert!(result.is_valid);
        assert_eq!(result.score, 1.0, "confidence {}", confidence);
    }
}

#[test]
fn test_default_rule_order() {
    let validator = QualityValidator::new();
    assert_eq!(
        validator.rule_names(),
        vec![
            "timestamp_validity",
            "confidence_range",
            "bounding_box_validity",
            "event_consistency",
            "source_integrity",
        ]
    );
}

#[test]
fn test_validation_is_idempotent() {
    let validator = QualityValidator::new();
    let mut event = clean_event();
    event.data.confidence = Some(0.1);
    event.data.bounding_box = Some(BoundingBox::new(0.0, 0.0, 5.0, 5.0));

    let first = validator.validate_event_at(&event, now());
    let second = validator.validate_event_at(&event, now());
    assert_eq!(first, second);
}

#[test]
fn test_low_confidence_visual_detection_warns() {
    let validator = QualityValidator::new();
    for kind in [EventType::PersonDetected, EventType::VehicleDetected] {
        let mut event = clean_event();
        event.event_type = kind;
        event.data.confidence = Some(0.1);

        let result = validator.validate_event_at(&event, now());
        assert!(result.is_valid);
        assert_eq!(result.warnings, vec!["Very low confidence for detection event"]);
        assert_close(result.score, 1.0 - 0.5 * 0.1);
    }
}

#[test]
fn test_low_confidence_motion_does_not_warn() {
    let validator = QualityValidator::new();
    let mut event = clean_event();
    event.event_type = EventType::MotionDetected;
    event.data.confidence = Some(0.1);

    let result = validator.validate_event_at(&event, now());
    assert!(result.warnings.is_empty());
}

#[test]
fn test_out_of_range_confidence_is_error_when_bypassing_construction() {
    let validator = QualityValidator::new();
    let mut event = clean_event();
    event.data.confidence = Some(1.5);

    let result = validator.validate_event_at(&event, now());
    assert!(!result.is_valid);
    assert_eq!(result.errors, vec!["Confidence score 1.5 is out of range [0,1]"]);
    assert_close(result.score, 1.0 - 0.5 * 0.2);
}

#[test]
fn test_future_timestamp_is_error() {
    let validator = QualityValidator::new();
    let mut event = clean_event();
    event.timestamp = now() + Duration::minutes(6);

    let result = validator.validate_event_at(&event, now());
    assert!(!result.is_valid);
    assert_eq!(result.errors, vec!["Timestamp is too far in the future"]);
    assert_close(result.score, 1.0 - 0.8 * 0.2);

    // Within the skew allowance
    event.timestamp = now() + Duration::minutes(4);
    assert!(validator.validate_event_at(&event, now()).is_valid);
}

#[test]
fn test_stale_timestamp_warns() {
    let validator = QualityValidator::new();
    let mut event = clean_event();
    event.timestamp = now() - Duration::days(8);

    let result = validator.validate_event_at(&event, now());
    assert!(result.is_valid);
    assert_eq!(result.warnings, vec!["Timestamp is quite old (more than 7 days)"]);
    assert_close(result.score, 1.0 - 0.8 * 0.1);
}

#[test]
fn test_processing_before_event_warns() {
    let validator = QualityValidator::new();
    let mut event = clean_event();
    event.processing_metadata = Some(ProcessingMetadata {
        processing_time: Some(event.timestamp - Duration::seconds(1)),
        ..Default::default()
    });

    let result = validator.validate_event_at(&event, now());
    assert_eq!(result.warnings, vec!["Processing time is before event timestamp"]);
}

#[test]
fn test_bounding_box_rules() {
    let validator = QualityValidator::new();

    let mut small = clean_event();
    small.data.bounding_box = Some(BoundingBox::new(10.0, 20.0, 5.0, 5.0));
    let result = validator.validate_event_at(&small, now());
    assert!(result.is_valid);
    assert_eq!(result.warnings, vec!["Bounding box is very small"]);
    assert_close(result.score, 1.0 - 0.6 * 0.1);

    let mut huge = clean_event();
    huge.data.bounding_box = Some(BoundingBox::new(0.0, 0.0, 4000.0, 100.0));
    let result = validator.validate_event_at(&huge, now());
    assert_eq!(
        result.warnings,
        vec!["Bounding box dimensions exceed typical video resolution"]
    );

    let mut negative = clean_event();
    negative.data.bounding_box = Some(BoundingBox::new(-1.0, 20.0, 0.0, 50.0));
    let result = validator.validate_event_at(&negative, now());
    assert!(!result.is_valid);
    assert_eq!(
        result.errors,
        vec![
            "Bounding box has negative coordinates",
            "Bounding box has invalid dimensions"
        ]
    );
    // Zero width is also "very small"
    assert_eq!(result.warnings, vec!["Bounding box is very small"]);
    // Each message is deducted separately
    assert_close(result.score, 1.0 - 2.0 * 0.6 * 0.2 - 0.6 * 0.1);
}

#[test]
fn test_detection_missing_confidence_and_box_warns() {
    let validator = QualityValidator::new();
    let mut event = clean_event();
    event.data = EventData::default();

    let result = validator.validate_event_at(&event, now());
    assert!(result.is_valid);
    assert_eq!(
        result.warnings,
        vec![
            "Detection event 'person_detected' missing confidence score",
            "Visual detection event 'person_detected' missing bounding box",
        ]
    );
    assert_close(result.score, 1.0 - 2.0 * 0.7 * 0.1);
}

#[test]
fn test_motion_without_box_is_fine() {
    let validator = QualityValidator::new();
    let mut event = clean_event();
    event.event_type = EventType::MotionDetected;
    event.data.bounding_box = None;

    let result = validator.validate_event_at(&event, now());
    assert!(result.warnings.is_empty());
    assert_eq!(result.score, 1.0);
}

#[test]
fn test_performance_metric_requires_metrics() {
    let validator = QualityValidator::new();
    let mut event = clean_event();
    event.event_type = EventType::PerformanceMetric;
    event.data = EventData::default();

    let result = validator.validate_event_at(&event, now());
    assert!(!result.is_valid);
    assert_eq!(result.errors, vec!["Performance metric event missing metrics data"]);

    event.data.metrics = Some(HashMap::new());
    assert!(!validator.validate_event_at(&event, now()).is_valid);

    event.data.metrics = Some(HashMap::from([("fps".to_string(), 29.97)]));
    let result = validator.validate_event_at(&event, now());
    assert!(result.is_valid);
    assert_eq!(result.score, 1.0);
}

#[test]
fn test_blank_source_ids_are_errors() {
    let validator = QualityValidator::new();
    let mut event = clean_event();
    event.source.source_id = "   ".to_string();

    let result = validator.validate_event_at(&event, now());
    assert!(!result.is_valid);
    assert_eq!(result.errors, vec!["Empty video source ID"]);
    assert_close(result.score, 1.0 - 0.4 * 0.2);
}

#[test]
fn test_empty_source_id_also_fails_schema_check() {
    let validator = QualityValidator::new();
    let mut event = clean_event();
    event.source.source_id = String::new();

    let result = validator.validate_event_at(&event, now());
    assert!(!result.is_valid);
    assert_eq!(
        result.errors,
        vec![
            "Schema validation failed: video_source.source_id must be a non-empty string",
            "Empty video source ID",
        ]
    );
    assert_close(result.score, 1.0 - 0.3 - 0.4 * 0.2);
}

#[test]
fn test_empty_event_id_fails_schema_check() {
    let validator = QualityValidator::new();
    let mut event = clean_event();
    event.event_id = String::new();

    let result = validator.validate_event_at(&event, now());
    assert!(!result.is_valid);
    assert_eq!(result.errors.len(), 1);
    assert_close(result.score, 0.7);
}

#[test]
fn test_invalid_location_is_error() {
    let validator = QualityValidator::new();
    let mut event = clean_event();
    event.source.location = Some(Location {
        latitude: Some(95.0),
        longitude: Some(-200.0),
        address: None,
    });

    let result = validator.validate_event_at(&event, now());
    assert_eq!(
        result.errors,
        vec!["Invalid latitude value", "Invalid longitude value"]
    );
}

#[test]
fn test_every_rule_failing_clamps_to_zero() {
    let validator = QualityValidator::new();
    let event = VideoEvent {
        event_id: String::new(),
        timestamp: now() + Duration::hours(1),
        source: VideoSource {
            source_id: String::new(),
            camera_id: String::new(),
            location: Some(Location {
                latitude: Some(100.0),
                longitude: None,
                address: None,
            }),
        },
        event_type: EventType::PerformanceMetric,
        data: EventData {
            confidence: Some(2.0),
            bounding_box: Some(BoundingBox::new(-5.0, -5.0, -1.0, 5000.0)),
            metrics: None,
            attributes: None,
        },
        processing_metadata: None,
    };

    let result = validator.validate_event_at(&event, now());
    assert!(!result.is_valid);
    // schema 0.3, timestamp 0.16, confidence 0.1, bbox 0.36, consistency 0.14,
    // source 0.24: 1.3 in total
    assert_eq!(result.errors.len(), 9);
    assert_eq!(result.warnings.len(), 2);
    assert_eq!(result.score, 0.0);
}

/// Rule that always faults
struct Exploding;

impl ValidationRule for Exploding {
    fn name(&self) -> &'static str {
        "exploding"
    }

    fn severity(&self) -> f64 {
        1.0
    }

    fn evaluate(&self, _event: &VideoEvent, _ctx: &RuleContext) -> Result<RuleOutcome, RuleFault> {
        Err(RuleFault("boom".to_string()))
    }
}

#[test]
fn test_rule_fault_is_isolated() {
    let mut rules = default_rules();
    rules.insert(0, Box::new(Exploding));
    let validator = QualityValidator::with_rules(rules);

    let mut event = clean_event();
    event.data.confidence = Some(0.1);

    let result = validator.validate_event_at(&event, now());
    assert!(!result.is_valid);
    assert_eq!(result.errors, vec!["Validation rule 'exploding' failed: boom"]);
    // Remaining rules still ran
    assert_eq!(result.warnings, vec!["Very low confidence for detection event"]);
    assert_close(result.score, 1.0 - 0.1 - 0.5 * 0.1);
}

#[test]
fn test_faults_alone_clamp_to_zero() {
    let rules: Vec<Box<dyn ValidationRule>> = (0..12)
        .map(|_| Box::new(Exploding) as Box<dyn ValidationRule>)
        .collect();
    let validator = QualityValidator::with_rules(rules);

    let result = validator.validate_event_at(&clean_event(), now());
    assert_eq!(result.errors.len(), 12);
    assert_eq!(result.score, 0.0);
}

#[test]
fn test_nan_confidence_faults_rule() {
    let validator = QualityValidator::new();
    let mut event = clean_event();
    event.data.confidence = Some(f64::NAN);

    let result = validator.validate_event_at(&event, now());
    assert!(!result.is_valid);
    assert_eq!(
        result.errors,
        vec!["Validation rule 'confidence_range' failed: confidence is NaN"]
    );
    assert_close(result.score, 0.9);
}

// ── Monitor ──────────────────────────────────────────────────────────────────

fn result(is_valid: bool, score: f64, errors: &[&str], warnings: &[&str]) -> ValidationResult {
    ValidationResult {
        is_valid,
        errors: errors.iter().map(|s| s.to_string()).collect(),
        warnings: warnings.iter().map(|s| s.to_string()).collect(),
        score,
    }
}

#[test]
fn test_monitor_empty_window_has_no_data() {
    let monitor = QualityMonitor::default();
    assert!(monitor.get_quality_metrics_at(60, now()).is_none());
}

#[test]
fn test_monitor_aggregates_window() {
    let monitor = QualityMonitor::default();
    monitor.record_at(&result(true, 1.0, &[], &[]), "e1", now());
    monitor.record_at(&result(true, 0.9, &[], &["w1"]), "e2", now());
    monitor.record_at(&result(false, 0.5, &["e-a", "e-b"], &["w1"]), "e3", now());
    monitor.record_at(&result(true, 0.8, &[], &["w2"]), "e4", now());

    let report = monitor.get_quality_metrics_at(60, now()).unwrap();
    assert_eq!(report.total_events, 4);
    assert_eq!(report.valid_events, 3);
    assert_close(report.validity_rate, 0.75);
    assert_close(report.average_quality_score, 0.8);
    assert_eq!(report.total_errors, 2);
    assert_eq!(report.total_warnings, 3);
    assert_eq!(report.recent_invalid_events, vec!["e3"]);
    assert_eq!(
        report.top_warnings,
        vec![
            MessageCount { message: "w1".to_string(), count: 2 },
            MessageCount { message: "w2".to_string(), count: 1 },
        ]
    );
}

#[test]
fn test_monitor_window_excludes_old_records() {
    let monitor = QualityMonitor::default();
    monitor.record_at(&result(false, 0.2, &["old"], &[]), "old", now() - Duration::minutes(30));
    monitor.record_at(&result(true, 1.0, &[], &[]), "new", now());

    let report = monitor.get_quality_metrics_at(10, now()).unwrap();
    assert_eq!(report.total_events, 1);
    assert!(report.top_errors.is_empty());

    let report = monitor.get_quality_metrics_at(60, now()).unwrap();
    assert_eq!(report.total_events, 2);
    assert_eq!(report.top_errors[0].message, "old");
}

#[test]
fn test_monitor_huge_window_covers_all_history() {
    let monitor = QualityMonitor::new(i64::MAX, 100);
    monitor.record_at(&result(false, 0.2, &["old"], &[]), "old", now() - Duration::days(3650));
    monitor.record_at(&result(true, 1.0, &[], &[]), "new", now());

    // Retention too long to represent keeps everything
    assert_eq!(monitor.len(), 2);

    for window in [1_000_000_000_000, i64::MAX] {
        let report = monitor.get_quality_metrics_at(window, now()).unwrap();
        assert_eq!(report.total_events, 2);
        assert_eq!(report.window_minutes, window);
    }
}

#[test]
fn test_monitor_top_messages_ties_in_first_seen_order() {
    let monitor = QualityMonitor::default();
    let errors = ["f", "c", "a", "e", "b", "d"];
    for (i, e) in errors.iter().enumerate() {
        monitor.record_at(&result(false, 0.5, &[e], &[]), &format!("e{}", i), now());
    }
    monitor.record_at(&result(false, 0.5, &["a"], &[]), "again", now());

    let report = monitor.get_quality_metrics_at(60, now()).unwrap();
    let top: Vec<&str> = report.top_errors.iter().map(|m| m.message.as_str()).collect();
    assert_eq!(top, vec!["a", "f", "c", "e", "b"]);
    assert_eq!(report.top_errors[0].count, 2);
}

#[test]
fn test_monitor_evicts_by_size() {
    let monitor = QualityMonitor::new(60, 3);
    for i in 0..10 {
        monitor.record_at(&result(true, 1.0, &[], &[]), &format!("e{}", i), now());
    }
    assert_eq!(monitor.len(), 3);
}

#[test]
fn test_monitor_evicts_by_age() {
    let monitor = QualityMonitor::new(5, 1000);
    monitor.record_at(&result(true, 1.0, &[], &[]), "a", now() - Duration::minutes(20));
    monitor.record_at(&result(true, 1.0, &[], &[]), "b", now() - Duration::minutes(10));
    assert_eq!(monitor.len(), 1);

    monitor.record_at(&result(true, 1.0, &[], &[]), "c", now());
    assert_eq!(monitor.len(), 1);
}

#[test]
fn test_monitor_shared_across_threads() {
    let monitor = QualityMonitor::default();
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let monitor = monitor.clone();
            std::thread::spawn(move || {
                for i in 0..50 {
                    monitor.record_validation_result(
                        &result(true, 1.0, &[], &[]),
                        &format!("t{}-{}", t, i),
                    );
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let report = monitor.get_quality_metrics(60).unwrap();
    assert_eq!(report.total_events, 400);
    assert_eq!(report.validity_rate, 1.0);
}
