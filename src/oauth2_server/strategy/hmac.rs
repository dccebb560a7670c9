// ABOUTME: Opaque token strategy: random secret plus HMAC signature with ory_at_/ory_rt_/ory_ac_ prefixes
// ABOUTME: Prefixes are stripped before verification; session expiries override configured lifespans
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use super::{AccessTokenStrategy, AuthorizeCodeStrategy, RefreshTokenStrategy};
use crate::config::OAuth2Config;
use crate::constants::tokens::{ACCESS_TOKEN_PREFIX, AUTHORIZE_CODE_PREFIX, REFRESH_TOKEN_PREFIX};
use crate::crypto::{HmacTokenGenerator, SecretProvider};
use crate::errors::{OAuth2Error, OAuth2ErrorKind};
use crate::models::TokenType;
use crate::oauth2_server::request::Request;

/// Opaque HMAC token strategy for all three token kinds
#[derive(Clone)]
pub struct HmacStrategy {
    generator: HmacTokenGenerator,
    config: Arc<OAuth2Config>,
}

impl HmacStrategy {
    /// Create a strategy signing with `secrets`
    #[must_use]
    pub fn new(secrets: Arc<dyn SecretProvider>, config: Arc<OAuth2Config>) -> Self {
        Self {
            generator: HmacTokenGenerator::new(secrets).with_entropy(config.token_entropy),
            config,
        }
    }

    const fn prefix(token_type: TokenType) -> &'static str {
        match token_type {
            TokenType::AccessToken => ACCESS_TOKEN_PREFIX,
            TokenType::RefreshToken => REFRESH_TOKEN_PREFIX,
            TokenType::AuthorizeCode => AUTHORIZE_CODE_PREFIX,
        }
    }

    fn lifespan(&self, token_type: TokenType) -> Option<Duration> {
        match token_type {
            TokenType::AccessToken => Some(self.config.access_token_lifespan),
            TokenType::RefreshToken => self.config.refresh_token_lifespan,
            TokenType::AuthorizeCode => Some(self.config.authorize_code_lifespan),
        }
    }

    fn signature(token_type: TokenType, token: &str) -> String {
        let bare = token.strip_prefix(Self::prefix(token_type)).unwrap_or(token);
        HmacTokenGenerator::signature(bare).to_owned()
    }

    fn generate(&self, token_type: TokenType) -> Result<(String, String), OAuth2Error> {
        let (token, signature) = self.generator.generate()?;
        if self.config.token_prefixes {
            Ok((format!("{}{token}", Self::prefix(token_type)), signature))
        } else {
            Ok((token, signature))
        }
    }

    /// Expiry of `token_type` for `request`: session value first, then `requested_at + lifespan`
    #[must_use]
    pub fn expires_at(&self, request: &Request, token_type: TokenType) -> Option<DateTime<Utc>> {
        request
            .session
            .expires_at(token_type)
            .or_else(|| self.lifespan(token_type).map(|l| request.requested_at + l))
    }

    fn validate(
        &self,
        request: &Request,
        token_type: TokenType,
        token: &str,
    ) -> Result<(), OAuth2Error> {
        if let Some(expires_at) = self.expires_at(request, token_type) {
            if expires_at < Utc::now() {
                return Err(OAuth2Error::new(OAuth2ErrorKind::TokenExpired).with_hint(format!(
                    "{} expired at '{}'.",
                    display_name(token_type),
                    expires_at.to_rfc3339()
                )));
            }
        }

        let bare = token.strip_prefix(Self::prefix(token_type)).unwrap_or(token);
        self.generator.validate(bare)
    }
}

const fn display_name(token_type: TokenType) -> &'static str {
    match token_type {
        TokenType::AccessToken => "Access token",
        TokenType::RefreshToken => "Refresh token",
        TokenType::AuthorizeCode => "Authorize code",
    }
}

impl AccessTokenStrategy for HmacStrategy {
    fn access_token_signature(&self, token: &str) -> String {
        Self::signature(TokenType::AccessToken, token)
    }

    fn generate_access_token(&self, _request: &Request) -> Result<(String, String), OAuth2Error> {
        self.generate(TokenType::AccessToken)
    }

    fn validate_access_token(&self, request: &Request, token: &str) -> Result<(), OAuth2Error> {
        self.validate(request, TokenType::AccessToken, token)
    }
}

impl RefreshTokenStrategy for HmacStrategy {
    fn refresh_token_signature(&self, token: &str) -> String {
        Self::signature(TokenType::RefreshToken, token)
    }

    fn generate_refresh_token(&self, _request: &Request) -> Result<(String, String), OAuth2Error> {
        self.generate(TokenType::RefreshToken)
    }

    fn validate_refresh_token(&self, request: &Request, token: &str) -> Result<(), OAuth2Error> {
        self.validate(request, TokenType::RefreshToken, token)
    }
}

impl AuthorizeCodeStrategy for HmacStrategy {
    fn authorize_code_signature(&self, code: &str) -> String {
        Self::signature(TokenType::AuthorizeCode, code)
    }

    fn generate_authorize_code(&self, _request: &Request) -> Result<(String, String), OAuth2Error> {
        self.generate(TokenType::AuthorizeCode)
    }

    fn validate_authorize_code(&self, request: &Request, code: &str) -> Result<(), OAuth2Error> {
        self.validate(request, TokenType::AuthorizeCode, code)
    }
}
