// Integration tests for loading pipeline configuration from disk

use std::collections::HashMap;
use std::fs;
use tempfile::TempDir;
use vidflow::config::{load_config, ShutdownPolicy};

fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, contents).unwrap();
    path
}

/// A complete file overrides every section.
#[test]
fn test_load_full_config_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
        [processing]
        anomaly_confidence_threshold = 0.9
        pipeline_version = "2.1.0"

        [window]
        size_seconds = 300
        allowed_lateness_seconds = 30
        max_out_of_orderness_seconds = 5
        shutdown_policy = "discard"

        [nats]
        url = "nats://nats.internal:4222"
        input_subject = "site1.video.raw"

        [api]
        port = 9090
        "#,
    );

    let config = load_config(&path).unwrap();

    assert_eq!(config.processing.anomaly_confidence_threshold, 0.9);
    assert_eq!(config.processing.pipeline_version, "2.1.0");
    assert_eq!(config.window.size_seconds, 300);
    assert_eq!(config.window.allowed_lateness_seconds, 30);
    assert_eq!(config.window.shutdown_policy, ShutdownPolicy::Discard);
    assert_eq!(config.nats.url, "nats://nats.internal:4222");
    assert_eq!(config.nats.input_subject, "site1.video.raw");
    // Untouched keys keep their defaults
    assert_eq!(config.nats.anomaly_subject, "video.events.anomalies");
    assert_eq!(config.api.port, 9090);
    assert!(config.validate().is_ok());
}

/// An empty file is a valid, all-default configuration.
#[test]
fn test_load_empty_config_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "");

    let config = load_config(&path).unwrap();

    assert_eq!(config.window.size_seconds, 60);
    assert_eq!(config.processing.anomaly_confidence_threshold, 0.95);
    assert_eq!(config.window.shutdown_policy, ShutdownPolicy::Flush);
}

/// Missing files name the path in the error.
#[test]
fn test_missing_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");

    let err = load_config(&path).unwrap_err();

    assert!(format!("{:#}", err).contains("absent.toml"));
}

/// Malformed TOML fails to load.
#[test]
fn test_malformed_config_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[window\nsize_seconds = ");

    let err = load_config(&path).unwrap_err();

    assert!(err.to_string().contains("Failed to parse config file"));
}

/// A file that loads can still fail validation, and overrides apply on top.
#[test]
fn test_loaded_config_validation_and_overrides() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
        [window]
        size_seconds = 0
        "#,
    );

    let mut config = load_config(&path).unwrap();
    assert!(config.validate().is_err());

    let env: HashMap<&str, &str> = [("WINDOW_SIZE_SECONDS", "120")].into_iter().collect();
    config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

    assert_eq!(config.window.size_seconds, 120);
    assert!(config.validate().is_ok());
}
