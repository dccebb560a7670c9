// ABOUTME: Tests for environment driven configuration of grants, flows and secrets
// ABOUTME: Serialized because every test mutates process environment variables
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use std::env;

use chrono::Duration;
use serial_test::serial;
use tessera::config::{AccessTokenFormat, FlowConfig, OAuth2Config, SecretsConfig, ServerConfig};
use tessera::crypto::{CipherKind, SecretProvider};
use tessera::errors::ErrorCode;
use tessera::oauth2_server::{AudienceStrategy, ScopeStrategy};

const VARS: &[&str] = &[
    "TESSERA_ACCESS_TOKEN_LIFESPAN_SECS",
    "TESSERA_REFRESH_TOKEN_LIFESPAN_SECS",
    "TESSERA_AUTHORIZE_CODE_LIFESPAN_SECS",
    "TESSERA_TOKEN_ENTROPY",
    "TESSERA_TOKEN_PREFIXES",
    "TESSERA_REFRESH_TOKEN_SCOPES",
    "TESSERA_ACCESS_TOKEN_FORMAT",
    "TESSERA_JWT_ISSUER",
    "TESSERA_JWT_REVOCATION_CHECK",
    "TESSERA_ENFORCE_PKCE",
    "TESSERA_SCOPE_STRATEGY",
    "TESSERA_AUDIENCE_STRATEGY",
    "TESSERA_SANITATION_ALLOW_LIST",
    "TESSERA_NETWORK_ID",
    "TESSERA_LOGIN_MAX_AGE_SECS",
    "TESSERA_FLOW_CIPHER",
    "TESSERA_SECRETS_SYSTEM",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_defaults_without_environment() {
    clear_env();
    let config = OAuth2Config::from_env().unwrap();
    let defaults = OAuth2Config::default();

    assert_eq!(config.access_token_lifespan, Duration::hours(1));
    assert_eq!(config.refresh_token_lifespan, defaults.refresh_token_lifespan);
    assert!(config.token_prefixes);
    assert_eq!(config.access_token_format, AccessTokenFormat::Opaque);
    assert!(!config.jwt_revocation_check);
    assert_eq!(config.scope_strategy, ScopeStrategy::Hierarchic);
    assert_eq!(config.audience_strategy, AudienceStrategy::Exact);

    let flow = FlowConfig::from_env().unwrap();
    assert_eq!(flow.network_id, "default");
    assert_eq!(flow.login_max_age, Duration::minutes(30));
    assert_eq!(flow.cipher, CipherKind::XChaCha20Poly1305);
}

#[test]
#[serial]
fn test_environment_overrides() {
    clear_env();
    env::set_var("TESSERA_ACCESS_TOKEN_LIFESPAN_SECS", "600");
    env::set_var("TESSERA_REFRESH_TOKEN_LIFESPAN_SECS", "never");
    env::set_var("TESSERA_TOKEN_PREFIXES", "false");
    env::set_var("TESSERA_REFRESH_TOKEN_SCOPES", "offline_access, offline");
    env::set_var("TESSERA_ACCESS_TOKEN_FORMAT", "JWT");
    env::set_var("TESSERA_JWT_ISSUER", "https://auth.example");
    env::set_var("TESSERA_JWT_REVOCATION_CHECK", "true");
    env::set_var("TESSERA_SCOPE_STRATEGY", "exact");
    env::set_var("TESSERA_AUDIENCE_STRATEGY", "url-prefix");
    env::set_var("TESSERA_NETWORK_ID", "tenant-7");
    env::set_var("TESSERA_LOGIN_MAX_AGE_SECS", "120");
    env::set_var("TESSERA_FLOW_CIPHER", "aes-256-gcm");

    let config = OAuth2Config::from_env().unwrap();
    let flow = FlowConfig::from_env().unwrap();
    clear_env();

    assert_eq!(config.access_token_lifespan, Duration::minutes(10));
    assert_eq!(config.refresh_token_lifespan, None);
    assert!(!config.token_prefixes);
    assert_eq!(config.refresh_token_scopes, vec!["offline_access", "offline"]);
    assert_eq!(config.access_token_format, AccessTokenFormat::Jwt);
    assert_eq!(config.jwt_issuer, "https://auth.example");
    assert!(config.jwt_revocation_check);
    assert_eq!(config.scope_strategy, ScopeStrategy::Exact);
    assert_eq!(config.audience_strategy, AudienceStrategy::UrlPrefix);

    assert_eq!(flow.network_id, "tenant-7");
    assert_eq!(flow.login_max_age, Duration::minutes(2));
    assert_eq!(flow.cipher, CipherKind::Aes256Gcm);
}

#[test]
#[serial]
fn test_malformed_values_are_rejected() {
    clear_env();

    env::set_var("TESSERA_ACCESS_TOKEN_LIFESPAN_SECS", "soon");
    let err = OAuth2Config::from_env().unwrap_err();
    assert_eq!(err.code, ErrorCode::ConfigInvalid);
    assert!(err.message.contains("TESSERA_ACCESS_TOKEN_LIFESPAN_SECS"));

    env::set_var("TESSERA_ACCESS_TOKEN_LIFESPAN_SECS", "0");
    assert!(OAuth2Config::from_env().is_err());
    env::remove_var("TESSERA_ACCESS_TOKEN_LIFESPAN_SECS");

    env::set_var("TESSERA_TOKEN_ENTROPY", "16");
    assert!(OAuth2Config::from_env().is_err());
    env::remove_var("TESSERA_TOKEN_ENTROPY");

    env::set_var("TESSERA_SCOPE_STRATEGY", "fuzzy");
    assert!(OAuth2Config::from_env().is_err());
    env::remove_var("TESSERA_SCOPE_STRATEGY");

    env::set_var("TESSERA_FLOW_CIPHER", "rot13");
    assert!(FlowConfig::from_env().is_err());
    clear_env();
}

#[test]
#[serial]
fn test_secrets_rotation_order() {
    clear_env();
    let primary = "p".repeat(32);
    let rotated = "r".repeat(40);
    env::set_var("TESSERA_SECRETS_SYSTEM", format!("{primary}, {rotated}"));

    let secrets = SecretsConfig::from_env().unwrap();
    clear_env();

    assert_eq!(secrets.rotated_count(), 1);
    assert_eq!(secrets.primary_secret().unwrap().as_slice(), primary.as_bytes());
    assert_eq!(secrets.rotated_secrets()[0].as_slice(), rotated.as_bytes());
    assert!(!format!("{secrets:?}").contains(&primary));
}

#[test]
#[serial]
fn test_secrets_are_required_and_long_enough() {
    clear_env();
    let err = ServerConfig::from_env().unwrap_err();
    assert_eq!(err.code, ErrorCode::ConfigMissing);

    env::set_var("TESSERA_SECRETS_SYSTEM", "too-short");
    let err = SecretsConfig::from_env().unwrap_err();
    assert_eq!(err.code, ErrorCode::ConfigInvalid);

    env::set_var("TESSERA_SECRETS_SYSTEM", " , ");
    assert!(SecretsConfig::from_env().is_err());
    clear_env();
}

#[test]
#[serial]
fn test_server_config_loads_every_section() {
    clear_env();
    env::set_var("TESSERA_SECRETS_SYSTEM", "s".repeat(48));
    env::set_var("TESSERA_NETWORK_ID", "tenant-9");

    let config = ServerConfig::from_env().unwrap();
    clear_env();

    assert_eq!(config.flow.network_id, "tenant-9");
    assert_eq!(config.secrets.rotated_count(), 0);
    assert!(config.oauth2.token_prefixes);
}
