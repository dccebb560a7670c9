// ABOUTME: JWT access token strategy with HS256 or RS256 signing via jsonwebtoken
// ABOUTME: Validation is stateless; refresh tokens and authorization codes stay opaque HMAC tokens
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use super::{AccessTokenStrategy, AuthorizeCodeStrategy, HmacStrategy, RefreshTokenStrategy};
use crate::config::OAuth2Config;
use crate::errors::{OAuth2Error, OAuth2ErrorKind};
use crate::models::TokenType;
use crate::oauth2_server::request::Request;

/// Claims of a JWT access token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JwtAccessClaims {
    /// Token identifier
    pub jti: String,
    /// Issuer
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub iss: String,
    /// Subject
    #[serde(default)]
    pub sub: String,
    /// Granted audiences
    #[serde(default)]
    pub aud: Vec<String>,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Not before (unix seconds)
    pub nbf: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
    /// Client the token was issued to
    pub client_id: String,
    /// Granted scopes
    #[serde(default)]
    pub scp: Vec<String>,
    /// Extra claims from the session
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub ext: Map<String, Value>,
}

/// Signing material for JWT access tokens
#[derive(Clone)]
pub struct JwtSigningKey {
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
    key_id: Option<String>,
}

impl JwtSigningKey {
    /// HS256 key from a shared secret
    #[must_use]
    pub fn hs256(secret: &[u8]) -> Self {
        Self {
            algorithm: Algorithm::HS256,
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            key_id: None,
        }
    }

    /// RS256 key from PEM encoded private and public keys
    ///
    /// # Errors
    ///
    /// Returns `server_error` if either PEM document cannot be parsed
    pub fn rs256(private_pem: &[u8], public_pem: &[u8]) -> Result<Self, OAuth2Error> {
        let encoding = EncodingKey::from_rsa_pem(private_pem)
            .map_err(|e| OAuth2Error::server_error(format!("invalid RSA private key: {e}")))?;
        let decoding = DecodingKey::from_rsa_pem(public_pem)
            .map_err(|e| OAuth2Error::server_error(format!("invalid RSA public key: {e}")))?;
        Ok(Self {
            algorithm: Algorithm::RS256,
            encoding,
            decoding,
            key_id: None,
        })
    }

    /// Set the default `kid` header
    #[must_use]
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }
}

/// JWT access tokens, opaque refresh tokens and authorization codes
#[derive(Clone)]
pub struct JwtStrategy {
    opaque: HmacStrategy,
    key: JwtSigningKey,
    config: Arc<OAuth2Config>,
}

impl JwtStrategy {
    /// Create a strategy signing access tokens with `key`
    #[must_use]
    pub const fn new(opaque: HmacStrategy, key: JwtSigningKey, config: Arc<OAuth2Config>) -> Self {
        Self {
            opaque,
            key,
            config,
        }
    }

    /// Decode and verify an access token
    ///
    /// # Errors
    ///
    /// Returns `token_expired`, `token_signature_mismatch` or `invalid_token_format`
    pub fn decode_access_token(&self, token: &str) -> Result<JwtAccessClaims, OAuth2Error> {
        let mut validation = Validation::new(self.key.algorithm);
        validation.validate_aud = false;
        validation.validate_nbf = true;
        validation.leeway = 0;
        if !self.config.jwt_issuer.is_empty() {
            validation.set_issuer(&[self.config.jwt_issuer.as_str()]);
        }

        decode::<JwtAccessClaims>(token, &self.key.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| convert_jwt_error(&e))
    }
}

fn convert_jwt_error(e: &JwtError) -> OAuth2Error {
    debug!(error = ?e, "JWT access token rejected");
    match e.kind() {
        JwtErrorKind::ExpiredSignature => OAuth2Error::new(OAuth2ErrorKind::TokenExpired)
            .with_hint("Access token expired."),
        JwtErrorKind::InvalidSignature => OAuth2Error::new(OAuth2ErrorKind::TokenSignatureMismatch),
        JwtErrorKind::ImmatureSignature => OAuth2Error::new(OAuth2ErrorKind::TokenInactive)
            .with_hint("Access token is not valid yet."),
        _ => OAuth2Error::new(OAuth2ErrorKind::InvalidTokenFormat).with_debug(e.to_string()),
    }
}

impl AccessTokenStrategy for JwtStrategy {
    fn access_token_signature(&self, token: &str) -> String {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() == 3 {
            parts[2].to_owned()
        } else {
            String::new()
        }
    }

    fn generate_access_token(&self, request: &Request) -> Result<(String, String), OAuth2Error> {
        let now = Utc::now();
        let expires_at = request
            .session
            .expires_at(TokenType::AccessToken)
            .unwrap_or_else(|| now + self.config.access_token_lifespan);
        let template = request.session.jwt_claims();

        let claims = JwtAccessClaims {
            jti: Uuid::new_v4().to_string(),
            iss: self.config.jwt_issuer.clone(),
            sub: request.session.subject().to_owned(),
            aud: request.granted_audience.iter().map(str::to_owned).collect(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: expires_at.timestamp(),
            client_id: request.client.id.clone(),
            scp: request.granted_scope.iter().map(str::to_owned).collect(),
            ext: template.map(|t| t.extra.clone()).unwrap_or_default(),
        };

        let mut header = Header::new(self.key.algorithm);
        header.kid = template
            .and_then(|t| t.key_id.clone())
            .or_else(|| self.key.key_id.clone());

        let token = encode(&header, &claims, &self.key.encoding)
            .map_err(|e| OAuth2Error::server_error(format!("failed to sign access token: {e}")))?;
        let signature = self.access_token_signature(&token);
        Ok((token, signature))
    }

    fn validate_access_token(&self, _request: &Request, token: &str) -> Result<(), OAuth2Error> {
        self.decode_access_token(token).map(|_| ())
    }
}

impl RefreshTokenStrategy for JwtStrategy {
    fn refresh_token_signature(&self, token: &str) -> String {
        self.opaque.refresh_token_signature(token)
    }

    fn generate_refresh_token(&self, request: &Request) -> Result<(String, String), OAuth2Error> {
        self.opaque.generate_refresh_token(request)
    }

    fn validate_refresh_token(&self, request: &Request, token: &str) -> Result<(), OAuth2Error> {
        self.opaque.validate_refresh_token(request, token)
    }
}

impl AuthorizeCodeStrategy for JwtStrategy {
    fn authorize_code_signature(&self, code: &str) -> String {
        self.opaque.authorize_code_signature(code)
    }

    fn generate_authorize_code(&self, request: &Request) -> Result<(String, String), OAuth2Error> {
        self.opaque.generate_authorize_code(request)
    }

    fn validate_authorize_code(&self, request: &Request, code: &str) -> Result<(), OAuth2Error> {
        self.opaque.validate_authorize_code(request, code)
    }
}
