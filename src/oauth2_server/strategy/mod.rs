// ABOUTME: Token strategy contracts shared by opaque HMAC tokens and signed JWT access tokens
// ABOUTME: Callers stay strategy-agnostic: signature, generate and validate per token kind
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Token strategies
//!
//! Each token kind exposes the same three operations. The signature is the
//! storage key of a token; it is derived from the token string alone, so a
//! lookup never needs the full secret.

/// HMAC-signed opaque tokens with optional type prefixes
pub mod hmac;
/// JWT access tokens, opaque refresh tokens and codes
pub mod jwt;

pub use hmac::HmacStrategy;
pub use jwt::{JwtAccessClaims, JwtSigningKey, JwtStrategy};

use std::sync::Arc;

use super::request::Request;
use crate::config::{AccessTokenFormat, OAuth2Config};
use crate::crypto::SecretProvider;
use crate::errors::{AppError, AppResult, OAuth2Error};

/// Access token generation and validation
pub trait AccessTokenStrategy: Send + Sync {
    /// Storage key of `token`
    fn access_token_signature(&self, token: &str) -> String;

    /// Mint an access token for `request`, returning the token and its signature
    ///
    /// # Errors
    ///
    /// Returns `server_error` when key material or signing fails
    fn generate_access_token(&self, request: &Request) -> Result<(String, String), OAuth2Error>;

    /// Check the token's expiry and signature
    ///
    /// # Errors
    ///
    /// Returns `token_expired`, `token_signature_mismatch` or `invalid_token_format`
    fn validate_access_token(&self, request: &Request, token: &str) -> Result<(), OAuth2Error>;
}

/// Refresh token generation and validation
pub trait RefreshTokenStrategy: Send + Sync {
    /// Storage key of `token`
    fn refresh_token_signature(&self, token: &str) -> String;

    /// Mint a refresh token for `request`, returning the token and its signature
    ///
    /// # Errors
    ///
    /// Returns `server_error` when key material fails
    fn generate_refresh_token(&self, request: &Request) -> Result<(String, String), OAuth2Error>;

    /// Check the token's expiry and signature
    ///
    /// # Errors
    ///
    /// Returns `token_expired`, `token_signature_mismatch` or `invalid_token_format`
    fn validate_refresh_token(&self, request: &Request, token: &str) -> Result<(), OAuth2Error>;
}

/// Authorization code generation and validation
pub trait AuthorizeCodeStrategy: Send + Sync {
    /// Storage key of `code`
    fn authorize_code_signature(&self, code: &str) -> String;

    /// Mint a code for `request`, returning the code and its signature
    ///
    /// # Errors
    ///
    /// Returns `server_error` when key material fails
    fn generate_authorize_code(&self, request: &Request) -> Result<(String, String), OAuth2Error>;

    /// Check the code's expiry and signature
    ///
    /// # Errors
    ///
    /// Returns `token_expired`, `token_signature_mismatch` or `invalid_token_format`
    fn validate_authorize_code(&self, request: &Request, code: &str) -> Result<(), OAuth2Error>;
}

/// All three token kinds behind one object
pub trait CoreStrategy: AccessTokenStrategy + RefreshTokenStrategy + AuthorizeCodeStrategy {}

impl<T> CoreStrategy for T where T: AccessTokenStrategy + RefreshTokenStrategy + AuthorizeCodeStrategy {}

/// The strategy selected by [`OAuth2Config::access_token_format`]
#[derive(Clone)]
pub enum ConfiguredStrategy {
    /// Opaque HMAC tokens of every kind
    Opaque(Arc<HmacStrategy>),
    /// JWT access tokens with opaque refresh tokens and codes
    Jwt(Arc<JwtStrategy>),
}

impl ConfiguredStrategy {
    /// Build the strategy the configuration asks for
    ///
    /// # Errors
    ///
    /// Returns a configuration error if JWT access tokens are selected without `jwt_key`
    pub fn from_config(
        secrets: Arc<dyn SecretProvider>,
        config: Arc<OAuth2Config>,
        jwt_key: Option<JwtSigningKey>,
    ) -> AppResult<Self> {
        let opaque = HmacStrategy::new(secrets, Arc::clone(&config));
        match (config.access_token_format, jwt_key) {
            (AccessTokenFormat::Opaque, _) => Ok(Self::Opaque(Arc::new(opaque))),
            (AccessTokenFormat::Jwt, Some(key)) => {
                Ok(Self::Jwt(Arc::new(JwtStrategy::new(opaque, key, config))))
            }
            (AccessTokenFormat::Jwt, None) => Err(AppError::config_invalid(
                "TESSERA_ACCESS_TOKEN_FORMAT=jwt requires a JWT signing key",
            )),
        }
    }

    /// The strategy handed to grant handlers and revocation
    #[must_use]
    pub fn core(&self) -> Arc<dyn CoreStrategy> {
        match self {
            Self::Opaque(strategy) => Arc::clone(strategy) as Arc<dyn CoreStrategy>,
            Self::Jwt(strategy) => Arc::clone(strategy) as Arc<dyn CoreStrategy>,
        }
    }

    /// The JWT strategy, for wiring a stateless introspector
    #[must_use]
    pub fn jwt(&self) -> Option<Arc<JwtStrategy>> {
        match self {
            Self::Opaque(_) => None,
            Self::Jwt(strategy) => Some(Arc::clone(strategy)),
        }
    }
}
