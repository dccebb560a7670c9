// ABOUTME: Configuration management for the authorization core loaded from the environment
// ABOUTME: Bundles OAuth 2.0 grant settings, flow codec settings and system secrets
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Configuration module
//!
//! - **oauth2**: token lifespans, strategies, PKCE and scope policy
//! - **flow**: login/consent/device codec settings
//! - **secrets**: primary and rotated system secrets

use std::env;
use std::fmt::Display;
use std::str::FromStr;

use chrono::Duration;
use tracing::info;

use crate::errors::{AppError, AppResult};

/// Login, consent and device flow codec settings
pub mod flow;
/// OAuth 2.0 token endpoint and strategy settings
pub mod oauth2;
/// System secrets used by the cipher and HMAC strategy
pub mod secrets;

pub use flow::FlowConfig;
pub use oauth2::{AccessTokenFormat, OAuth2Config};
pub use secrets::SecretsConfig;

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Grant handler settings
    pub oauth2: OAuth2Config,
    /// Flow codec settings
    pub flow: FlowConfig,
    /// System secrets
    pub secrets: SecretsConfig,
}

impl ServerConfig {
    /// Load the complete configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is malformed or `TESSERA_SECRETS_SYSTEM` is missing
    pub fn from_env() -> AppResult<Self> {
        let config = Self {
            oauth2: OAuth2Config::from_env()?,
            flow: FlowConfig::from_env()?,
            secrets: SecretsConfig::from_env()?,
        };

        info!(
            access_token_format = ?config.oauth2.access_token_format,
            network_id = %config.flow.network_id,
            rotated_secrets = config.secrets.rotated_count(),
            "Configuration loaded"
        );
        Ok(config)
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Parse an optional variable, failing loudly on malformed values
fn parse_env<T>(key: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::config_invalid(format!("Invalid {key} value: {e}"))),
        Err(_) => Ok(default),
    }
}

/// Parse a lifespan given in seconds
fn parse_secs(key: &str, default_secs: i64) -> AppResult<Duration> {
    let secs: i64 = parse_env(key, default_secs)?;
    if secs <= 0 {
        return Err(AppError::config_invalid(format!(
            "{key} must be a positive number of seconds, got {secs}"
        )));
    }
    Ok(Duration::seconds(secs))
}

/// Parse a comma separated list, dropping blank entries
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}
