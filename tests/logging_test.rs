// ABOUTME: Tests for logging configuration and global subscriber installation
// ABOUTME: Serialized because the tests read process environment and install a global subscriber
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use std::env;

use serial_test::serial;
use tessera::errors::ErrorCode;
use tessera::logging::{LogFormat, LoggingConfig};

#[test]
#[serial]
fn test_production_environment_enables_context_fields() {
    env::set_var("LOG_FORMAT", "json");
    env::set_var("ENVIRONMENT", "production");
    env::set_var("SERVICE_NAME", "tessera-edge");

    let config = LoggingConfig::from_env();
    assert_eq!(config.format, LogFormat::Json);
    assert!(config.include_location);
    assert!(config.include_thread);
    assert!(config.include_spans);
    assert_eq!(config.service_name, "tessera-edge");

    for var in ["LOG_FORMAT", "ENVIRONMENT", "SERVICE_NAME"] {
        env::remove_var(var);
    }
    let config = LoggingConfig::from_env();
    assert_eq!(config.format, LogFormat::Pretty);
    assert!(!config.include_location);
}

#[test]
#[serial]
fn test_second_subscriber_install_is_reported() {
    let config = LoggingConfig {
        format: LogFormat::Compact,
        level: "warn".into(),
        ..LoggingConfig::default()
    };

    // The first install may already have happened in this process
    let _ = config.init();
    let err = config.init().unwrap_err();
    assert_eq!(err.code, ErrorCode::InternalError);
    assert!(err.source.is_some());
}
