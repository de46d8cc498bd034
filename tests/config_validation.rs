//! Integration tests for configuration validation

#![allow(clippy::unwrap_used, clippy::expect_used)]

use mesh_generic_byte::config::{ClientConfig, LoggingConfig, ModelConfig, MAX_UNRELIABLE_REPEATS};
use mesh_generic_byte::transport::{RELIABLE_TIMEOUT_MAX, RELIABLE_TIMEOUT_MIN};
use mesh_generic_byte::ModelError;
use std::time::Duration;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = ModelConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
    assert!(config.validate_strict().is_ok());
}

#[test]
fn test_short_reliable_timeout() {
    let mut config = ModelConfig::default();
    config.client.reliable_timeout = Duration::from_millis(1999);

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Reliable timeout too short")));
}

#[test]
fn test_long_reliable_timeout() {
    let mut config = ModelConfig::default();
    config.client.reliable_timeout = RELIABLE_TIMEOUT_MAX + Duration::from_millis(1);

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Reliable timeout too long")));
}

#[test]
fn test_timeout_bounds_are_inclusive() {
    for timeout in [RELIABLE_TIMEOUT_MIN, RELIABLE_TIMEOUT_MAX] {
        let client = ClientConfig {
            reliable_timeout: timeout,
            ..ClientConfig::default()
        };
        assert!(client.validate().is_empty(), "{timeout:?} should be valid");
    }
}

#[test]
fn test_zero_unreliable_repeats() {
    let config = ModelConfig::default_with_overrides(|c| c.client.unreliable_repeats = 0);

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Unreliable repeats must be greater than 0")));
}

#[test]
fn test_excessive_unreliable_repeats() {
    let config = ModelConfig::default_with_overrides(|c| {
        c.client.unreliable_repeats = MAX_UNRELIABLE_REPEATS + 1;
    });

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Unreliable repeats too high")));
}

#[test]
fn test_empty_app_name() {
    let mut config = ModelConfig::default();
    config.logging.app_name = String::new();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_long_app_name() {
    let logging = LoggingConfig {
        app_name: "x".repeat(65),
        ..LoggingConfig::default()
    };
    assert!(logging
        .validate()
        .iter()
        .any(|e| e.contains("Application name too long")));
}

#[test]
fn test_multiple_errors_collected() {
    let config = ModelConfig::default_with_overrides(|c| {
        c.client.reliable_timeout = Duration::from_millis(10);
        c.client.unreliable_repeats = 0;
        c.logging.app_name = String::new();
    });

    assert_eq!(config.validate().len(), 3);
    match config.validate_strict() {
        Err(ModelError::ConfigError(msg)) => {
            assert!(msg.contains("Configuration validation failed"));
            assert!(msg.contains("Reliable timeout too short"));
        }
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn test_toml_round_trip() {
    let config = ModelConfig::default_with_overrides(|c| {
        c.client.element_index = 1;
        c.client.reliable_timeout = Duration::from_secs(5);
        c.server.element_index = 2;
        c.logging.log_level = Level::DEBUG;
        c.logging.json_format = true;
    });

    let path = std::env::temp_dir().join(format!(
        "mesh-generic-byte-config-{}.toml",
        std::process::id()
    ));
    config.save_to_file(&path).expect("save config");
    let loaded = ModelConfig::from_file(&path).expect("load config");
    let _ = std::fs::remove_file(&path);

    assert_eq!(loaded.client.element_index, 1);
    assert_eq!(loaded.client.reliable_timeout, Duration::from_secs(5));
    assert_eq!(loaded.server.element_index, 2);
    assert_eq!(loaded.logging.log_level, Level::DEBUG);
    assert!(loaded.logging.json_format);
}

#[test]
fn test_invalid_log_level_rejected() {
    let result = ModelConfig::from_toml(
        r#"
        [logging]
        app_name = "node"
        log_level = "loud"
        json_format = false
        "#,
    );
    assert!(matches!(result, Err(ModelError::ConfigError(_))));
}

#[test]
fn test_missing_file_is_config_error() {
    let result = ModelConfig::from_file("/nonexistent/mesh-generic-byte.toml");
    assert!(matches!(result, Err(ModelError::ConfigError(_))));
}
