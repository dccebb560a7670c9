// ABOUTME: OAuth 2.0 grant handler configuration with token lifespans and strategy selection
// ABOUTME: Covers PKCE enforcement, refresh token scopes, scope/audience matching and debug exposure
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::env;
use std::str::FromStr;

use chrono::Duration;

use super::{env_var_or, parse_env, parse_list, parse_secs};
use crate::constants::{lifespans, scopes, tokens};
use crate::errors::{AppError, AppResult};
use crate::models::Arguments;
use crate::oauth2_server::scope::{AudienceStrategy, ScopeStrategy};

/// Encoding of issued access tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessTokenFormat {
    /// Random secret plus HMAC signature, validated against storage
    #[default]
    Opaque,
    /// Signed JWT, validated statelessly
    Jwt,
}

impl FromStr for AccessTokenFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "opaque" => Ok(Self::Opaque),
            "jwt" => Ok(Self::Jwt),
            other => Err(format!("unknown access token format: {other}")),
        }
    }
}

/// OAuth 2.0 grant handler configuration
#[derive(Debug, Clone)]
pub struct OAuth2Config {
    /// Default access token lifespan
    pub access_token_lifespan: Duration,
    /// Default refresh token lifespan, `None` means refresh tokens never expire
    pub refresh_token_lifespan: Option<Duration>,
    /// Default authorization code lifespan
    pub authorize_code_lifespan: Duration,
    /// Random bytes per opaque token
    pub token_entropy: usize,
    /// Emit `ory_at_`/`ory_rt_`/`ory_ac_` prefixes on opaque tokens
    pub token_prefixes: bool,
    /// Scopes that must be granted for a refresh token to be issued; empty means always
    pub refresh_token_scopes: Vec<String>,
    /// Access token encoding
    pub access_token_format: AccessTokenFormat,
    /// Issuer written into JWT access tokens
    pub jwt_issuer: String,
    /// Introspect JWT access tokens statelessly instead of looking them up
    pub disable_refresh_token_validation: bool,
    /// Consult storage for revocation when introspecting JWT access tokens
    pub jwt_revocation_check: bool,
    /// Require PKCE for every client
    pub enforce_pkce: bool,
    /// Require PKCE for public clients
    pub enforce_pkce_for_public_clients: bool,
    /// Accept the `plain` PKCE method
    pub enable_pkce_plain: bool,
    /// Minimum length of the `state` parameter
    pub min_state_entropy: usize,
    /// Render `error_debug` in error responses
    pub expose_debug: bool,
    /// Scope matching strategy
    pub scope_strategy: ScopeStrategy,
    /// Audience matching strategy
    pub audience_strategy: AudienceStrategy,
    /// Form parameters retained on sanitized requests
    pub sanitation_allow_list: Vec<String>,
}

impl Default for OAuth2Config {
    fn default() -> Self {
        Self {
            access_token_lifespan: Duration::seconds(lifespans::ACCESS_TOKEN_SECS),
            refresh_token_lifespan: Some(Duration::seconds(lifespans::REFRESH_TOKEN_SECS)),
            authorize_code_lifespan: Duration::seconds(lifespans::AUTHORIZE_CODE_SECS),
            token_entropy: tokens::DEFAULT_ENTROPY_BYTES,
            token_prefixes: true,
            refresh_token_scopes: scopes::DEFAULT_REFRESH_TOKEN_SCOPES
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            access_token_format: AccessTokenFormat::Opaque,
            jwt_issuer: String::new(),
            disable_refresh_token_validation: false,
            jwt_revocation_check: false,
            enforce_pkce: false,
            enforce_pkce_for_public_clients: false,
            enable_pkce_plain: false,
            min_state_entropy: scopes::MIN_STATE_ENTROPY,
            expose_debug: false,
            scope_strategy: ScopeStrategy::default(),
            audience_strategy: AudienceStrategy::default(),
            sanitation_allow_list: Vec::new(),
        }
    }
}

impl OAuth2Config {
    /// Load OAuth 2.0 configuration from environment
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is malformed or token entropy is below 32 bytes
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();

        // "0" or "never" disables refresh token expiry
        let refresh_token_lifespan = match env::var("TESSERA_REFRESH_TOKEN_LIFESPAN_SECS") {
            Ok(raw) if raw == "0" || raw.eq_ignore_ascii_case("never") => None,
            Ok(_) => Some(parse_secs(
                "TESSERA_REFRESH_TOKEN_LIFESPAN_SECS",
                lifespans::REFRESH_TOKEN_SECS,
            )?),
            Err(_) => defaults.refresh_token_lifespan,
        };

        let token_entropy = parse_env("TESSERA_TOKEN_ENTROPY", defaults.token_entropy)?;
        if token_entropy < tokens::MIN_SECRET_BYTES {
            return Err(AppError::config_invalid(format!(
                "TESSERA_TOKEN_ENTROPY must be at least {} bytes, got {token_entropy}",
                tokens::MIN_SECRET_BYTES
            )));
        }

        let refresh_token_scopes = env::var("TESSERA_REFRESH_TOKEN_SCOPES")
            .map_or(defaults.refresh_token_scopes, |raw| parse_list(&raw));

        Ok(Self {
            access_token_lifespan: parse_secs(
                "TESSERA_ACCESS_TOKEN_LIFESPAN_SECS",
                lifespans::ACCESS_TOKEN_SECS,
            )?,
            refresh_token_lifespan,
            authorize_code_lifespan: parse_secs(
                "TESSERA_AUTHORIZE_CODE_LIFESPAN_SECS",
                lifespans::AUTHORIZE_CODE_SECS,
            )?,
            token_entropy,
            token_prefixes: parse_env("TESSERA_TOKEN_PREFIXES", true)?,
            refresh_token_scopes,
            access_token_format: parse_env("TESSERA_ACCESS_TOKEN_FORMAT", AccessTokenFormat::Opaque)?,
            jwt_issuer: env_var_or("TESSERA_JWT_ISSUER", ""),
            disable_refresh_token_validation: parse_env(
                "TESSERA_DISABLE_REFRESH_TOKEN_VALIDATION",
                false,
            )?,
            jwt_revocation_check: parse_env("TESSERA_JWT_REVOCATION_CHECK", false)?,
            enforce_pkce: parse_env("TESSERA_ENFORCE_PKCE", false)?,
            enforce_pkce_for_public_clients: parse_env(
                "TESSERA_ENFORCE_PKCE_FOR_PUBLIC_CLIENTS",
                false,
            )?,
            enable_pkce_plain: parse_env("TESSERA_ENABLE_PKCE_PLAIN", false)?,
            min_state_entropy: parse_env("TESSERA_MIN_STATE_ENTROPY", defaults.min_state_entropy)?,
            expose_debug: parse_env("TESSERA_EXPOSE_DEBUG", false)?,
            scope_strategy: parse_env("TESSERA_SCOPE_STRATEGY", ScopeStrategy::default())?,
            audience_strategy: parse_env("TESSERA_AUDIENCE_STRATEGY", AudienceStrategy::default())?,
            sanitation_allow_list: parse_list(&env_var_or("TESSERA_SANITATION_ALLOW_LIST", "")),
        })
    }

    /// True if a refresh token may be issued for `granted` scopes
    #[must_use]
    pub fn allows_refresh_token(&self, granted: &Arguments) -> bool {
        self.refresh_token_scopes.is_empty() || granted.has_one_of(&self.refresh_token_scopes)
    }
}
