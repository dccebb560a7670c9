// ABOUTME: Implicit grant returning an access token in the redirect fragment
// ABOUTME: Only handles response_type=token exactly; no refresh token is ever issued
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use super::{
    expires_in, grant_not_allowed, storage_fault, validate_granted, validate_requested,
    AuthorizeEndpointHandler,
};
use crate::config::OAuth2Config;
use crate::constants::{params, tokens::BEARER};
use crate::context::RequestContext;
use crate::errors::{OAuth2Error, OAuth2ErrorKind};
use crate::models::{GrantType, ResponseMode, TokenType};
use crate::oauth2_server::request::AuthorizeRequest;
use crate::oauth2_server::response::AuthorizeResponse;
use crate::oauth2_server::storage::AccessTokenStorage;
use crate::oauth2_server::strategy::CoreStrategy;

const RESPONSE_TYPE_TOKEN: &str = "token";

/// Handles `response_type=token`
pub struct ImplicitHandler<S> {
    strategy: Arc<dyn CoreStrategy>,
    storage: Arc<S>,
    config: Arc<OAuth2Config>,
}

impl<S> ImplicitHandler<S>
where
    S: AccessTokenStorage,
{
    /// Create a handler persisting through `storage`
    #[must_use]
    pub fn new(strategy: Arc<dyn CoreStrategy>, storage: Arc<S>, config: Arc<OAuth2Config>) -> Self {
        Self {
            strategy,
            storage,
            config,
        }
    }
}

#[async_trait]
impl<S> AuthorizeEndpointHandler for ImplicitHandler<S>
where
    S: AccessTokenStorage + 'static,
{
    async fn handle_authorize_endpoint_request(
        &self,
        ctx: &RequestContext,
        request: &mut AuthorizeRequest,
        response: &mut AuthorizeResponse,
    ) -> Result<(), OAuth2Error> {
        if !request.response_types.exact_one(RESPONSE_TYPE_TOKEN) {
            return Ok(());
        }
        request.set_response_type_handled(RESPONSE_TYPE_TOKEN);
        request.response_mode = ResponseMode::Fragment;

        let client = Arc::clone(&request.request.client);
        if !client.has_grant_type(GrantType::Implicit) {
            return Err(grant_not_allowed(GrantType::Implicit));
        }
        if !client.has_response_type(RESPONSE_TYPE_TOKEN) {
            return Err(OAuth2Error::new(OAuth2ErrorKind::UnsupportedResponseType)
                .with_hint("The client is not allowed to request response_type \"token\"."));
        }
        validate_requested(&self.config, &request.request)?;
        validate_granted(&self.config, &request.request)?;

        let now = Utc::now();
        let lifespan = client.effective_lifespan(
            GrantType::Implicit,
            TokenType::AccessToken,
            self.config.access_token_lifespan,
        );
        request
            .request
            .session
            .set_expires_at(TokenType::AccessToken, Some(now + lifespan));

        let (access_token, signature) = self.strategy.generate_access_token(&request.request)?;
        ctx.ensure_active().map_err(storage_fault)?;
        self.storage
            .create_access_token_session(
                ctx,
                &signature,
                &request.request.sanitize(&self.config.sanitation_allow_list),
            )
            .await
            .map_err(storage_fault)?;

        debug!(client_id = %client.id, request_id = %request.request.id, "Implicit access token issued");

        response.add_fragment("access_token", access_token);
        response.add_fragment(
            "expires_in",
            expires_in(&request.request, lifespan, now).to_string(),
        );
        response.add_fragment("token_type", BEARER);
        response.add_fragment(params::STATE, request.state.clone());
        response.add_fragment(params::SCOPE, request.request.granted_scope.join());
        Ok(())
    }
}
