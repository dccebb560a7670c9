// ABOUTME: Client credentials grant issuing an access token to a confidential client for itself
// ABOUTME: Public clients are refused before any token is generated; no refresh token is issued
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use super::{
    fill_access_response, grant_not_allowed, set_token_expiries, storage_fault, validate_requested,
    TokenEndpointHandler,
};
use crate::config::OAuth2Config;
use crate::context::RequestContext;
use crate::errors::OAuth2Error;
use crate::models::{GrantType, TokenType};
use crate::oauth2_server::request::AccessRequest;
use crate::oauth2_server::response::AccessResponse;
use crate::oauth2_server::storage::AccessTokenStorage;
use crate::oauth2_server::strategy::CoreStrategy;
use crate::oauth2_server::transaction::TransactionCoordinator;

/// Handles `grant_type=client_credentials`
pub struct ClientCredentialsHandler<S> {
    strategy: Arc<dyn CoreStrategy>,
    storage: Arc<S>,
    transactions: TransactionCoordinator,
    config: Arc<OAuth2Config>,
}

impl<S> ClientCredentialsHandler<S>
where
    S: AccessTokenStorage,
{
    /// Create a handler persisting through `storage`
    #[must_use]
    pub fn new(
        strategy: Arc<dyn CoreStrategy>,
        storage: Arc<S>,
        transactions: TransactionCoordinator,
        config: Arc<OAuth2Config>,
    ) -> Self {
        Self {
            strategy,
            storage,
            transactions,
            config,
        }
    }
}

#[async_trait]
impl<S> TokenEndpointHandler for ClientCredentialsHandler<S>
where
    S: AccessTokenStorage + 'static,
{
    fn can_handle_token_endpoint_request(&self, request: &AccessRequest) -> bool {
        request.is_grant_type(GrantType::ClientCredentials.as_str())
    }

    async fn handle_token_endpoint_request(
        &self,
        _ctx: &RequestContext,
        request: &mut AccessRequest,
    ) -> Result<(), OAuth2Error> {
        if !self.can_handle_token_endpoint_request(request) {
            return Err(OAuth2Error::unknown_request());
        }

        let client = Arc::clone(&request.request.client);
        if client.public {
            return Err(OAuth2Error::unauthorized_client(
                "The OAuth 2.0 Client is marked as public and is thus not allowed to use authorization grant \"client_credentials\".",
            ));
        }
        if !client.has_grant_type(GrantType::ClientCredentials) {
            return Err(grant_not_allowed(GrantType::ClientCredentials));
        }

        let granted = &mut request.request;
        validate_requested(&self.config, granted)?;

        // Requested scopes and audiences are granted in full
        let scopes: Vec<String> = granted.requested_scope.iter().map(str::to_owned).collect();
        for scope in &scopes {
            granted.grant_scope(scope);
        }
        let audiences: Vec<String> = granted.requested_audience.iter().map(str::to_owned).collect();
        for audience in &audiences {
            granted.grant_audience(audience);
        }

        set_token_expiries(&self.config, granted, GrantType::ClientCredentials, Utc::now());
        granted
            .session
            .set_expires_at(TokenType::RefreshToken, None);

        request
            .handled_grant_types
            .append(GrantType::ClientCredentials.as_str());
        Ok(())
    }

    async fn populate_token_endpoint_response(
        &self,
        ctx: &RequestContext,
        request: &AccessRequest,
        response: &mut AccessResponse,
    ) -> Result<(), OAuth2Error> {
        if !self.can_handle_token_endpoint_request(request) {
            return Err(OAuth2Error::unknown_request());
        }
        if !request.request.client.has_grant_type(GrantType::ClientCredentials) {
            return Err(grant_not_allowed(GrantType::ClientCredentials));
        }

        let issued = &request.request;
        let (access_token, access_signature) = self.strategy.generate_access_token(issued)?;

        let tx = self.transactions.begin(ctx).await?;
        let result = self
            .storage
            .create_access_token_session(
                &tx,
                &access_signature,
                &issued.sanitize(&self.config.sanitation_allow_list),
            )
            .await
            .map_err(storage_fault);
        self.transactions.finish(&tx, result).await?;

        info!(client_id = %issued.client.id, "Client credentials access token issued");

        fill_access_response(&self.config, issued, access_token, None, response);
        Ok(())
    }
}
