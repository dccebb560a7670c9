// ABOUTME: Protocol constants for token formats, lifespans, flow purposes, and form parameters
// ABOUTME: Single source of truth for wire-visible strings used by handlers and codecs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Protocol constants organized by domain

/// Opaque token format
pub mod tokens {
    /// Human-readable prefix for opaque access tokens
    pub const ACCESS_TOKEN_PREFIX: &str = "ory_at_";
    /// Human-readable prefix for opaque refresh tokens
    pub const REFRESH_TOKEN_PREFIX: &str = "ory_rt_";
    /// Human-readable prefix for opaque authorization codes
    pub const AUTHORIZE_CODE_PREFIX: &str = "ory_ac_";
    /// Separator between the random key part and the signature part
    pub const SIGNATURE_SEPARATOR: char = '.';
    /// Default number of random bytes in an opaque token
    pub const DEFAULT_ENTROPY_BYTES: usize = 32;
    /// Minimum accepted secret length in bytes (256 bits)
    pub const MIN_SECRET_BYTES: usize = 32;
    /// Token type reported in token responses
    pub const BEARER: &str = "bearer";
}

/// Default lifespans in seconds
pub mod lifespans {
    /// Access token lifespan (1 hour)
    pub const ACCESS_TOKEN_SECS: i64 = 3600;
    /// Refresh token lifespan (30 days)
    pub const REFRESH_TOKEN_SECS: i64 = 720 * 3600;
    /// Authorization code lifespan (15 minutes)
    pub const AUTHORIZE_CODE_SECS: i64 = 15 * 60;
    /// Maximum age of a login challenge or verifier (30 minutes)
    pub const LOGIN_MAX_AGE_SECS: i64 = 30 * 60;
    /// Maximum age of a consent challenge or verifier (30 minutes)
    pub const CONSENT_MAX_AGE_SECS: i64 = 30 * 60;
    /// Maximum age of a device challenge or verifier (10 minutes)
    pub const DEVICE_MAX_AGE_SECS: i64 = 10 * 60;
}

/// AEAD additional-data tags binding a flow token to its purpose
pub mod flow_purposes {
    /// Login challenge handed to the login UI
    pub const LOGIN_CHALLENGE: &str = "login_challenge";
    /// Login verifier returned to the authorization endpoint
    pub const LOGIN_VERIFIER: &str = "login_verifier";
    /// Consent challenge handed to the consent UI
    pub const CONSENT_CHALLENGE: &str = "consent_challenge";
    /// Consent verifier returned to the authorization endpoint
    pub const CONSENT_VERIFIER: &str = "consent_verifier";
    /// Device challenge handed to the device verification UI
    pub const DEVICE_CHALLENGE: &str = "device_challenge";
    /// Device verifier returned to the device endpoint
    pub const DEVICE_VERIFIER: &str = "device_verifier";
}

/// Request form parameter names
pub mod params {
    /// `grant_type`
    pub const GRANT_TYPE: &str = "grant_type";
    /// `response_type`
    pub const RESPONSE_TYPE: &str = "response_type";
    /// `code`
    pub const CODE: &str = "code";
    /// `redirect_uri`
    pub const REDIRECT_URI: &str = "redirect_uri";
    /// `refresh_token`
    pub const REFRESH_TOKEN: &str = "refresh_token";
    /// `scope`
    pub const SCOPE: &str = "scope";
    /// `audience`
    pub const AUDIENCE: &str = "audience";
    /// `state`
    pub const STATE: &str = "state";
    /// `username`
    pub const USERNAME: &str = "username";
    /// `password`
    pub const PASSWORD: &str = "password";
    /// `code_challenge`
    pub const CODE_CHALLENGE: &str = "code_challenge";
    /// `code_challenge_method`
    pub const CODE_CHALLENGE_METHOD: &str = "code_challenge_method";
    /// `code_verifier`
    pub const CODE_VERIFIER: &str = "code_verifier";
}

/// PKCE (RFC 7636) limits
pub mod pkce {
    /// Minimum code verifier length
    pub const VERIFIER_MIN_LEN: usize = 43;
    /// Maximum code verifier length
    pub const VERIFIER_MAX_LEN: usize = 128;
    /// SHA-256 challenge method
    pub const METHOD_S256: &str = "S256";
    /// Plain challenge method
    pub const METHOD_PLAIN: &str = "plain";
}

/// Scopes and defaults
pub mod scopes {
    /// Scopes that allow refresh token issuance by default
    pub const DEFAULT_REFRESH_TOKEN_SCOPES: &[&str] = &["offline", "offline_access"];
    /// Minimum length of the `state` parameter
    pub const MIN_STATE_ENTROPY: usize = 8;
}

/// Service identity
pub mod service_names {
    /// Service name used in structured logs
    pub const TESSERA: &str = "tessera";
}
