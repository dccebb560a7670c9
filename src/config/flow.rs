// ABOUTME: Flow codec configuration for login, consent and device challenges
// ABOUTME: Network binding, per-purpose maximum ages and AEAD cipher selection
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::Duration;

use super::{env_var_or, parse_env, parse_secs};
use crate::constants::lifespans;
use crate::crypto::CipherKind;
use crate::errors::AppResult;

/// Flow codec configuration
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Network (tenant) the codec serves; flows from other networks are rejected
    pub network_id: String,
    /// Maximum age of login challenges and verifiers
    pub login_max_age: Duration,
    /// Maximum age of consent challenges and verifiers
    pub consent_max_age: Duration,
    /// Maximum age of device challenges and verifiers
    pub device_max_age: Duration,
    /// AEAD used to seal flow tokens
    pub cipher: CipherKind,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            network_id: "default".into(),
            login_max_age: Duration::seconds(lifespans::LOGIN_MAX_AGE_SECS),
            consent_max_age: Duration::seconds(lifespans::CONSENT_MAX_AGE_SECS),
            device_max_age: Duration::seconds(lifespans::DEVICE_MAX_AGE_SECS),
            cipher: CipherKind::default(),
        }
    }
}

impl FlowConfig {
    /// Load flow configuration from environment
    ///
    /// # Errors
    ///
    /// Returns an error if a lifespan or the cipher name is malformed
    pub fn from_env() -> AppResult<Self> {
        Ok(Self {
            network_id: env_var_or("TESSERA_NETWORK_ID", "default"),
            login_max_age: parse_secs("TESSERA_LOGIN_MAX_AGE_SECS", lifespans::LOGIN_MAX_AGE_SECS)?,
            consent_max_age: parse_secs(
                "TESSERA_CONSENT_MAX_AGE_SECS",
                lifespans::CONSENT_MAX_AGE_SECS,
            )?,
            device_max_age: parse_secs(
                "TESSERA_DEVICE_MAX_AGE_SECS",
                lifespans::DEVICE_MAX_AGE_SECS,
            )?,
            cipher: parse_env("TESSERA_FLOW_CIPHER", CipherKind::default())?,
        })
    }
}
