// ABOUTME: Token introspection (RFC 7662) with storage-backed and stateless JWT validators
// ABOUTME: A found token's stored request is merged into the caller's accumulator request
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::{json, Map, Value};

use super::request::Request;
use super::session::DefaultSession;
use super::storage::{AccessTokenStorage, RefreshTokenStorage};
use super::strategy::{AccessTokenStrategy, CoreStrategy, JwtStrategy};
use crate::config::OAuth2Config;
use crate::context::RequestContext;
use crate::errors::{OAuth2Error, OAuth2ErrorKind};
use crate::models::{Arguments, Client, TokenType};

fn inactive_token() -> OAuth2Error {
    OAuth2Error::new(OAuth2ErrorKind::RequestUnauthorized).with_hint(
        "Token is inactive because it is malformed, expired or otherwise invalid. Token validation failed.",
    )
}

/// A validator able to recognize some kinds of tokens
#[async_trait]
pub trait TokenIntrospector: Send + Sync {
    /// Validate `token`, merge its request into `accumulator` and report its kind
    ///
    /// # Errors
    ///
    /// Returns `unknown_request` if the token is not in a format this validator
    /// handles, `request_unauthorized` if it is inactive and `invalid_scope` if
    /// it lacks one of `scopes`
    async fn introspect_token(
        &self,
        ctx: &RequestContext,
        token: &str,
        hint: Option<TokenType>,
        accumulator: &mut Request,
        scopes: &Arguments,
    ) -> Result<TokenType, OAuth2Error>;
}

/// Require every scope of `scopes` to be satisfied by `granted`
fn check_scopes(config: &OAuth2Config, granted: &Arguments, scopes: &Arguments) -> Result<(), OAuth2Error> {
    for scope in scopes.iter() {
        if !config.scope_strategy.matches(granted, scope) {
            return Err(OAuth2Error::invalid_scope(format!(
                "The request scope '{scope}' has not been granted or is not allowed to be requested."
            )));
        }
    }
    Ok(())
}

/// Looks tokens up in storage and validates them with the token strategy
pub struct CoreValidator<S> {
    strategy: Arc<dyn CoreStrategy>,
    storage: Arc<S>,
    config: Arc<OAuth2Config>,
}

impl<S> CoreValidator<S>
where
    S: AccessTokenStorage + RefreshTokenStorage,
{
    /// Create a validator over `storage`
    #[must_use]
    pub fn new(strategy: Arc<dyn CoreStrategy>, storage: Arc<S>, config: Arc<OAuth2Config>) -> Self {
        Self {
            strategy,
            storage,
            config,
        }
    }

    async fn introspect_access_token(
        &self,
        ctx: &RequestContext,
        token: &str,
        accumulator: &mut Request,
        scopes: &Arguments,
    ) -> Result<(), OAuth2Error> {
        let signature = self.strategy.access_token_signature(token);
        let stored = self
            .storage
            .get_access_token_session(ctx, &signature)
            .await
            .map_err(|e| inactive_token().with_source(e))?;
        self.strategy.validate_access_token(&stored, token)?;
        check_scopes(&self.config, &stored.granted_scope, scopes)?;
        accumulator.merge(&stored);
        Ok(())
    }

    async fn introspect_refresh_token(
        &self,
        ctx: &RequestContext,
        token: &str,
        accumulator: &mut Request,
        scopes: &Arguments,
    ) -> Result<(), OAuth2Error> {
        let signature = self.strategy.refresh_token_signature(token);
        let stored = self
            .storage
            .get_refresh_token_session(ctx, &signature)
            .await
            .map_err(|e| inactive_token().with_source(e))?;
        if !stored.active {
            return Err(inactive_token());
        }
        self.strategy.validate_refresh_token(&stored.request, token)?;
        check_scopes(&self.config, &stored.request.granted_scope, scopes)?;
        accumulator.merge(&stored.request);
        Ok(())
    }
}

#[async_trait]
impl<S> TokenIntrospector for CoreValidator<S>
where
    S: AccessTokenStorage + RefreshTokenStorage + 'static,
{
    async fn introspect_token(
        &self,
        ctx: &RequestContext,
        token: &str,
        hint: Option<TokenType>,
        accumulator: &mut Request,
        scopes: &Arguments,
    ) -> Result<TokenType, OAuth2Error> {
        if self.config.disable_refresh_token_validation {
            self.introspect_access_token(ctx, token, accumulator, scopes)
                .await?;
            return Ok(TokenType::AccessToken);
        }

        if hint == Some(TokenType::RefreshToken) {
            return match self
                .introspect_refresh_token(ctx, token, accumulator, scopes)
                .await
            {
                Ok(()) => Ok(TokenType::RefreshToken),
                Err(refresh_error) => self
                    .introspect_access_token(ctx, token, accumulator, scopes)
                    .await
                    .map(|()| TokenType::AccessToken)
                    .map_err(|_| refresh_error),
            };
        }

        match self
            .introspect_access_token(ctx, token, accumulator, scopes)
            .await
        {
            Ok(()) => Ok(TokenType::AccessToken),
            Err(access_error) => self
                .introspect_refresh_token(ctx, token, accumulator, scopes)
                .await
                .map(|()| TokenType::RefreshToken)
                .map_err(|_| access_error),
        }
    }
}

/// Validates JWT access tokens from their claims alone
///
/// With `jwt_revocation_check` enabled the token's session must also still
/// exist in storage, so revoked tokens stop introspecting as active.
pub struct StatelessJwtIntrospector {
    jwt: Arc<JwtStrategy>,
    revocations: Option<Arc<dyn AccessTokenStorage>>,
    config: Arc<OAuth2Config>,
}

impl StatelessJwtIntrospector {
    /// Create an introspector; `revocations` is consulted when `jwt_revocation_check` is set
    #[must_use]
    pub fn new(
        jwt: Arc<JwtStrategy>,
        revocations: Option<Arc<dyn AccessTokenStorage>>,
        config: Arc<OAuth2Config>,
    ) -> Self {
        Self {
            jwt,
            revocations,
            config,
        }
    }
}

#[async_trait]
impl TokenIntrospector for StatelessJwtIntrospector {
    async fn introspect_token(
        &self,
        ctx: &RequestContext,
        token: &str,
        _hint: Option<TokenType>,
        accumulator: &mut Request,
        scopes: &Arguments,
    ) -> Result<TokenType, OAuth2Error> {
        // Opaque tokens are left to the storage-backed validator
        if token.split('.').count() != 3 {
            return Err(OAuth2Error::unknown_request());
        }

        let claims = self.jwt.decode_access_token(token)?;

        if self.config.jwt_revocation_check {
            if let Some(revocations) = &self.revocations {
                let signature = self.jwt.access_token_signature(token);
                revocations
                    .get_access_token_session(ctx, &signature)
                    .await
                    .map_err(|e| {
                        OAuth2Error::new(OAuth2ErrorKind::RequestUnauthorized)
                            .with_hint("Token has been revoked.")
                            .with_source(e)
                    })?;
            }
        }

        let granted_scope: Arguments = claims.scp.iter().map(String::as_str).collect();
        check_scopes(&self.config, &granted_scope, scopes)?;

        let mut session = DefaultSession::new(claims.sub.clone());
        session.extra = claims.ext.clone();
        session.expires_at.insert(
            TokenType::AccessToken,
            Utc.timestamp_opt(claims.exp, 0)
                .single()
                .unwrap_or_else(Utc::now),
        );

        let mut decoded = Request::new(Arc::new(Client::new(claims.client_id.clone())))
            .with_session(Box::new(session));
        decoded.requested_at = Utc
            .timestamp_opt(claims.iat, 0)
            .single()
            .unwrap_or(decoded.requested_at);
        decoded.id = accumulator.id;
        for scope in granted_scope.iter() {
            decoded.requested_scope.append(scope);
            decoded.grant_scope(scope);
        }
        for audience in &claims.aud {
            decoded.requested_audience.append(audience.as_str());
            decoded.grant_audience(audience);
        }

        accumulator.merge(&decoded);
        Ok(TokenType::AccessToken)
    }
}

/// RFC 7662 introspection result
#[derive(Debug, Clone)]
pub struct IntrospectionResponse {
    /// Whether the token is active
    pub active: bool,
    /// Kind of the introspected token
    pub token_use: Option<TokenType>,
    /// Request the token was issued for
    pub request: Option<Request>,
}

impl IntrospectionResponse {
    /// Response for a token that is not active
    #[must_use]
    pub const fn inactive() -> Self {
        Self {
            active: false,
            token_use: None,
            request: None,
        }
    }

    /// Response for an active token
    #[must_use]
    pub const fn active(token_use: TokenType, request: Request) -> Self {
        Self {
            active: true,
            token_use: Some(token_use),
            request: Some(request),
        }
    }

    /// Render the RFC 7662 JSON body
    #[must_use]
    pub fn to_json(&self) -> Value {
        let (true, Some(token_use), Some(request)) = (self.active, self.token_use, &self.request)
        else {
            return json!({ "active": false });
        };

        let mut body = Map::new();
        body.insert("active".into(), Value::Bool(true));
        body.insert("client_id".into(), json!(request.client.id));
        body.insert("scope".into(), json!(request.granted_scope.join()));
        body.insert("iat".into(), json!(request.requested_at.timestamp()));
        body.insert("token_use".into(), json!(token_use.as_str()));
        if token_use == TokenType::AccessToken {
            body.insert("token_type".into(), json!("Bearer"));
        }

        let session = &request.session;
        if !session.subject().is_empty() {
            body.insert("sub".into(), json!(session.subject()));
        }
        if !session.username().is_empty() {
            body.insert("username".into(), json!(session.username()));
        }
        if let Some(expires_at) = session.expires_at(token_use) {
            body.insert("exp".into(), json!(expires_at.timestamp()));
        }
        if !request.granted_audience.is_empty() {
            body.insert(
                "aud".into(),
                json!(request.granted_audience.iter().collect::<Vec<_>>()),
            );
        }
        if !session.extra().is_empty() {
            body.insert("ext".into(), Value::Object(session.extra().clone()));
        }
        Value::Object(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_renders_only_active_flag() {
        assert_eq!(IntrospectionResponse::inactive().to_json(), json!({ "active": false }));
    }

    #[test]
    fn test_active_renders_claims() {
        let mut request = Request::new(Arc::new(Client::new("app")))
            .with_session(Box::new(DefaultSession::new("alice")));
        request.grant_scope("read");
        let body = IntrospectionResponse::active(TokenType::AccessToken, request).to_json();

        assert_eq!(body["active"], json!(true));
        assert_eq!(body["client_id"], json!("app"));
        assert_eq!(body["sub"], json!("alice"));
        assert_eq!(body["scope"], json!("read"));
        assert_eq!(body["token_use"], json!("access_token"));
    }
}
