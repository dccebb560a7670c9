// ABOUTME: OAuth 2.0 provider dispatching requests across registered grant handlers
// ABOUTME: Handlers answering unknown_request are skipped; any other error stops the chain
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use tracing::{debug, warn};

use super::handlers::{AuthorizeEndpointHandler, TokenEndpointHandler};
use super::introspection::{IntrospectionResponse, TokenIntrospector};
use super::request::{AccessRequest, AuthorizeRequest, Request};
use super::response::{AccessResponse, AuthorizeResponse};
use super::revocation::RevocationHandler;
use super::session::Session;
use crate::config::OAuth2Config;
use crate::context::RequestContext;
use crate::errors::{OAuth2Error, OAuth2ErrorKind, OAuth2ErrorResponse};
use crate::models::{Arguments, Client, TokenType};

/// Registered handler chains for every endpoint
pub struct OAuth2Provider {
    config: Arc<OAuth2Config>,
    token_handlers: Vec<Arc<dyn TokenEndpointHandler>>,
    authorize_handlers: Vec<Arc<dyn AuthorizeEndpointHandler>>,
    introspectors: Vec<Arc<dyn TokenIntrospector>>,
    revocation_handlers: Vec<Arc<dyn RevocationHandler>>,
}

impl OAuth2Provider {
    /// Provider without handlers
    #[must_use]
    pub fn new(config: Arc<OAuth2Config>) -> Self {
        Self {
            config,
            token_handlers: Vec::new(),
            authorize_handlers: Vec::new(),
            introspectors: Vec::new(),
            revocation_handlers: Vec::new(),
        }
    }

    /// Append a token endpoint handler
    #[must_use]
    pub fn with_token_handler(mut self, handler: Arc<dyn TokenEndpointHandler>) -> Self {
        self.token_handlers.push(handler);
        self
    }

    /// Append an authorization endpoint handler
    #[must_use]
    pub fn with_authorize_handler(mut self, handler: Arc<dyn AuthorizeEndpointHandler>) -> Self {
        self.authorize_handlers.push(handler);
        self
    }

    /// Append a token introspector
    #[must_use]
    pub fn with_introspector(mut self, introspector: Arc<dyn TokenIntrospector>) -> Self {
        self.introspectors.push(introspector);
        self
    }

    /// Append a revocation handler
    #[must_use]
    pub fn with_revocation_handler(mut self, handler: Arc<dyn RevocationHandler>) -> Self {
        self.revocation_handlers.push(handler);
        self
    }

    /// Provider configuration
    #[must_use]
    pub fn config(&self) -> &OAuth2Config {
        &self.config
    }

    /// Render `error` as an RFC 6749 error body
    ///
    /// `error_debug` is only included when `expose_debug` is configured.
    #[must_use]
    pub fn error_response(&self, error: &OAuth2Error) -> OAuth2ErrorResponse {
        if error.is(OAuth2ErrorKind::ServerError) {
            warn!(error = %error, "Answering with server_error");
        }
        error.to_response(self.config.expose_debug)
    }

    /// Run the validation phase of every token handler
    ///
    /// # Errors
    ///
    /// Returns the first handler failure, or `unsupported_grant_type` if no
    /// handler accepted the request
    pub async fn handle_access_request(
        &self,
        ctx: &RequestContext,
        request: &mut AccessRequest,
    ) -> Result<(), OAuth2Error> {
        let mut found = false;
        for handler in &self.token_handlers {
            match handler.handle_token_endpoint_request(ctx, request).await {
                Ok(()) => found = true,
                Err(e) if e.is(OAuth2ErrorKind::UnknownRequest) => {}
                Err(e) => {
                    debug!(error = %e, client_id = %request.request.client.id, "Token request rejected");
                    return Err(e);
                }
            }
        }

        if found {
            Ok(())
        } else {
            Err(OAuth2Error::unsupported_grant_type().with_hint(format!(
                "The handler chain does not support grant_type '{}'.",
                request.grant_types.join()
            )))
        }
    }

    /// Run the issuance phase of every token handler
    ///
    /// # Errors
    ///
    /// Returns the first handler failure, or `server_error` if no handler
    /// populated the response
    pub async fn new_access_response(
        &self,
        ctx: &RequestContext,
        request: &AccessRequest,
    ) -> Result<AccessResponse, OAuth2Error> {
        let mut response = AccessResponse::new();
        let mut found = false;
        for handler in &self.token_handlers {
            match handler
                .populate_token_endpoint_response(ctx, request, &mut response)
                .await
            {
                Ok(()) => found = true,
                Err(e) if e.is(OAuth2ErrorKind::UnknownRequest) => {}
                Err(e) => return Err(e),
            }
        }

        if found && !response.access_token.is_empty() {
            Ok(response)
        } else {
            Err(OAuth2Error::server_error(
                "no token handler populated the token response",
            ))
        }
    }

    /// Validate a token request and issue its tokens
    ///
    /// # Errors
    ///
    /// Returns any error of [`Self::handle_access_request`] or [`Self::new_access_response`]
    pub async fn exchange(
        &self,
        ctx: &RequestContext,
        request: &mut AccessRequest,
    ) -> Result<AccessResponse, OAuth2Error> {
        self.handle_access_request(ctx, request).await?;
        self.new_access_response(ctx, request).await
    }

    /// Run every authorization handler and require all response types be handled
    ///
    /// # Errors
    ///
    /// Returns the first handler failure, or `unsupported_response_type` if a
    /// requested response type was left unhandled
    pub async fn new_authorize_response(
        &self,
        ctx: &RequestContext,
        request: &mut AuthorizeRequest,
    ) -> Result<AuthorizeResponse, OAuth2Error> {
        let mut response = AuthorizeResponse::new();
        for handler in &self.authorize_handlers {
            handler
                .handle_authorize_endpoint_request(ctx, request, &mut response)
                .await?;
        }

        if request.did_handle_all_response_types() {
            Ok(response)
        } else {
            Err(OAuth2Error::new(OAuth2ErrorKind::UnsupportedResponseType).with_hint(format!(
                "The authorization server does not support response_type '{}'.",
                request.response_types.join()
            )))
        }
    }

    /// Introspect `token`, requiring every scope in `scopes`
    ///
    /// # Errors
    ///
    /// Returns `request_unauthorized` if no introspector recognized the token,
    /// or the first introspector failure
    pub async fn introspect_token(
        &self,
        ctx: &RequestContext,
        token: &str,
        hint: Option<TokenType>,
        scopes: &Arguments,
        session: Box<dyn Session>,
    ) -> Result<IntrospectionResponse, OAuth2Error> {
        let mut accumulator = Request::new(Arc::new(Client::new(""))).with_session(session);

        for introspector in &self.introspectors {
            match introspector
                .introspect_token(ctx, token, hint, &mut accumulator, scopes)
                .await
            {
                Ok(token_use) => return Ok(IntrospectionResponse::active(token_use, accumulator)),
                Err(e) if e.is(OAuth2ErrorKind::UnknownRequest) => {}
                Err(e) => return Err(e),
            }
        }

        Err(OAuth2Error::new(OAuth2ErrorKind::RequestUnauthorized).with_hint(
            "Unable to find a suitable validation strategy for the token, thus it is invalid.",
        ))
    }

    /// Introspect `token`, rendering any failure as an inactive response
    pub async fn introspect_or_inactive(
        &self,
        ctx: &RequestContext,
        token: &str,
        hint: Option<TokenType>,
        scopes: &Arguments,
        session: Box<dyn Session>,
    ) -> IntrospectionResponse {
        match self.introspect_token(ctx, token, hint, scopes, session).await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "Token introspected as inactive");
                IntrospectionResponse::inactive()
            }
        }
    }

    /// Revoke `token` on behalf of `client`
    ///
    /// # Errors
    ///
    /// Returns the first revocation failure
    pub async fn revoke_token(
        &self,
        ctx: &RequestContext,
        token: &str,
        hint: Option<TokenType>,
        client: &Client,
    ) -> Result<(), OAuth2Error> {
        if self.revocation_handlers.is_empty() {
            warn!("Revocation requested but no revocation handler is registered");
            return Err(OAuth2Error::server_error("no revocation handler registered"));
        }
        for handler in &self.revocation_handlers {
            match handler.revoke_token(ctx, token, hint, client).await {
                Ok(()) => {}
                Err(e) if e.is(OAuth2ErrorKind::UnknownRequest) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}
