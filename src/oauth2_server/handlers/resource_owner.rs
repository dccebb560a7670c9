// ABOUTME: Resource owner password credentials grant backed by a pluggable authenticator
// ABOUTME: The password is stripped from the request before anything is persisted
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use super::{
    fill_access_response, grant_not_allowed, set_token_expiries, storage_fault, validate_requested,
    TokenEndpointHandler,
};
use crate::config::OAuth2Config;
use crate::constants::params;
use crate::context::RequestContext;
use crate::errors::{OAuth2Error, StorageError};
use crate::models::GrantType;
use crate::oauth2_server::request::{AccessRequest, Request};
use crate::oauth2_server::response::AccessResponse;
use crate::oauth2_server::storage::{
    AccessTokenStorage, RefreshTokenStorage, ResourceOwnerAuthenticator,
};
use crate::oauth2_server::strategy::CoreStrategy;
use crate::oauth2_server::transaction::TransactionCoordinator;

/// Handles `grant_type=password`
pub struct ResourceOwnerPasswordHandler<S> {
    strategy: Arc<dyn CoreStrategy>,
    storage: Arc<S>,
    transactions: TransactionCoordinator,
    config: Arc<OAuth2Config>,
}

impl<S> ResourceOwnerPasswordHandler<S>
where
    S: ResourceOwnerAuthenticator + AccessTokenStorage + RefreshTokenStorage,
{
    /// Create a handler authenticating and persisting through `storage`
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

    async fn persist(
        &self,
        ctx: &RequestContext,
        access_signature: &str,
        refresh_signature: Option<&str>,
        request: &Request,
    ) -> Result<(), OAuth2Error> {
        let sanitized = request.sanitize(&self.config.sanitation_allow_list);
        self.storage
            .create_access_token_session(ctx, access_signature, &sanitized)
            .await
            .map_err(storage_fault)?;
        if let Some(refresh_signature) = refresh_signature {
            self.storage
                .create_refresh_token_session(ctx, refresh_signature, access_signature, &sanitized)
                .await
                .map_err(storage_fault)?;
        }
        Ok(())
    }
}

#[async_trait]
impl<S> TokenEndpointHandler for ResourceOwnerPasswordHandler<S>
where
    S: ResourceOwnerAuthenticator + AccessTokenStorage + RefreshTokenStorage + 'static,
{
    fn can_handle_token_endpoint_request(&self, request: &AccessRequest) -> bool {
        request.is_grant_type(GrantType::Password.as_str())
    }

    async fn handle_token_endpoint_request(
        &self,
        ctx: &RequestContext,
        request: &mut AccessRequest,
    ) -> Result<(), OAuth2Error> {
        if !self.can_handle_token_endpoint_request(request) {
            return Err(OAuth2Error::unknown_request());
        }
        if !request.request.client.has_grant_type(GrantType::Password) {
            return Err(grant_not_allowed(GrantType::Password));
        }
        validate_requested(&self.config, &request.request)?;

        let form = &request.request.form;
        let username = form.get_or_empty(params::USERNAME).to_owned();
        let password = form.get_or_empty(params::PASSWORD).to_owned();
        if username.is_empty() || password.is_empty() {
            return Err(OAuth2Error::invalid_request(
                "Username or password are missing from the POST body.",
            ));
        }

        let subject = match self.storage.authenticate(ctx, &username, &password).await {
            Ok(subject) => subject,
            Err(StorageError::NotFound) => {
                warn!(client_id = %request.request.client.id, "Resource owner authentication failed");
                return Err(OAuth2Error::invalid_grant(
                    "Unable to authenticate the provided username and password credentials.",
                ));
            }
            Err(e) => return Err(storage_fault(e)),
        };

        let owner = &mut request.request;
        owner.form.remove(params::PASSWORD);
        owner.session.set_subject(subject);

        let scopes: Vec<String> = owner.requested_scope.iter().map(str::to_owned).collect();
        for scope in &scopes {
            owner.grant_scope(scope);
        }
        let audiences: Vec<String> = owner.requested_audience.iter().map(str::to_owned).collect();
        for audience in &audiences {
            owner.grant_audience(audience);
        }

        set_token_expiries(&self.config, owner, GrantType::Password, Utc::now());

        request.handled_grant_types.append(GrantType::Password.as_str());
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

        let owner = &request.request;
        let (access_token, access_signature) = self.strategy.generate_access_token(owner)?;
        let refresh = if self.config.allows_refresh_token(&owner.granted_scope) {
            Some(self.strategy.generate_refresh_token(owner)?)
        } else {
            None
        };

        let tx = self.transactions.begin(ctx).await?;
        let result = self
            .persist(
                &tx,
                &access_signature,
                refresh.as_ref().map(|(_, signature)| signature.as_str()),
                owner,
            )
            .await;
        self.transactions.finish(&tx, result).await?;

        info!(
            client_id = %owner.client.id,
            request_id = %owner.id,
            refresh_issued = refresh.is_some(),
            "Resource owner password grant completed"
        );

        fill_access_response(
            &self.config,
            owner,
            access_token,
            refresh.map(|(token, _)| token),
            response,
        );
        Ok(())
    }
}
