// ABOUTME: Refresh token grant with rotation inside one transaction and reuse detection
// ABOUTME: Presenting a rotated refresh token revokes the whole token family and denies the request
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use super::{
    fill_access_response, grant_not_allowed, revoke_token_family, set_token_expiries,
    storage_fault, with_failures, TokenEndpointHandler,
};
use crate::config::OAuth2Config;
use crate::constants::params;
use crate::context::RequestContext;
use crate::errors::{MultiError, OAuth2Error, OAuth2ErrorKind, StorageError};
use crate::logging::AuditLogger;
use crate::models::{Arguments, GrantType, TokenType};
use crate::oauth2_server::request::{AccessRequest, Request};
use crate::oauth2_server::response::AccessResponse;
use crate::oauth2_server::storage::{AccessTokenStorage, RefreshTokenStorage, TokenRevocationStorage};
use crate::oauth2_server::strategy::CoreStrategy;
use crate::oauth2_server::transaction::{classify_storage_error, TransactionCoordinator};

fn refresh_token_not_found() -> OAuth2Error {
    OAuth2Error::invalid_grant("The refresh token has not been found.")
}

fn refresh_token_reused() -> OAuth2Error {
    OAuth2Error::invalid_grant("The refresh token was already used.")
}

fn concurrent_refresh() -> OAuth2Error {
    OAuth2Error::invalid_request(
        "Failed to refresh token because of multiple concurrent requests using the same token which is not allowed.",
    )
}

/// Exchanges a refresh token for a new access and refresh token pair
pub struct RefreshTokenHandler<S> {
    strategy: Arc<dyn CoreStrategy>,
    storage: Arc<S>,
    transactions: TransactionCoordinator,
    config: Arc<OAuth2Config>,
}

impl<S> RefreshTokenHandler<S>
where
    S: AccessTokenStorage + RefreshTokenStorage + TokenRevocationStorage,
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

    /// Delete the presented session and revoke the family it belongs to
    async fn handle_refresh_token_reuse(
        &self,
        ctx: &RequestContext,
        signature: &str,
        original: &Request,
    ) -> OAuth2Error {
        let mut failures = MultiError::new();

        let tx = match self.transactions.begin(ctx).await {
            Ok(tx) => Some(tx),
            Err(e) => {
                warn!(error = %e, "Could not open transaction for refresh token reuse compensation");
                None
            }
        };
        let write_ctx = tx.as_ref().unwrap_or(ctx);

        failures.record_ignoring_missing(
            "delete_refresh_token_session",
            self.storage
                .delete_refresh_token_session(write_ctx, signature)
                .await,
        );
        revoke_token_family(self.storage.as_ref(), write_ctx, original.id, &mut failures).await;

        if let Some(tx) = &tx {
            if let Err(e) = self.transactions.commit(tx).await {
                failures.record("commit", Err(StorageError::backend(e.to_string())));
            }
        }

        AuditLogger::token_reuse_detected(
            TokenType::RefreshToken,
            original.id,
            &original.client.id,
            failures.len(),
        );
        with_failures(refresh_token_reused(), failures)
    }

    /// Resolve the scopes of the refreshed grant
    ///
    /// Without a `scope` parameter the original grant carries over. With one,
    /// the request narrows the grant and may not add scopes.
    fn refreshed_scopes(
        &self,
        original: &Request,
        presented: &Arguments,
    ) -> Result<(Arguments, Arguments), OAuth2Error> {
        let strategy = self.config.scope_strategy;
        let client = &original.client;

        if presented.is_empty() {
            for scope in original.granted_scope.iter() {
                if !strategy.matches(&client.scopes, scope) {
                    return Err(OAuth2Error::invalid_scope(format!(
                        "The OAuth 2.0 Client is not allowed to request scope '{scope}'."
                    )));
                }
            }
            return Ok((
                original.requested_scope.clone(),
                original.granted_scope.clone(),
            ));
        }

        for scope in presented.iter() {
            if !original.granted_scope.has(scope) {
                return Err(OAuth2Error::invalid_scope(format!(
                    "The requested scope '{scope}' was not originally granted by the resource owner."
                )));
            }
            if !strategy.matches(&client.scopes, scope) {
                return Err(OAuth2Error::invalid_scope(format!(
                    "The OAuth 2.0 Client is not allowed to request scope '{scope}'."
                )));
            }
        }
        Ok((presented.clone(), presented.clone()))
    }

    async fn persist_rotation(
        &self,
        ctx: &RequestContext,
        presented_signature: &str,
        access_signature: &str,
        refresh_signature: &str,
        request: &Request,
    ) -> Result<(), OAuth2Error> {
        let current = self
            .storage
            .get_refresh_token_session(ctx, presented_signature)
            .await
            .map_err(|e| classify_storage_error(e, concurrent_refresh))?;
        if !current.active {
            return Err(concurrent_refresh());
        }

        self.storage
            .rotate_refresh_token(ctx, current.request.id, presented_signature)
            .await
            .map_err(|e| classify_storage_error(e, concurrent_refresh))?;

        let sanitized = request.sanitize(&self.config.sanitation_allow_list);
        self.storage
            .create_access_token_session(ctx, access_signature, &sanitized)
            .await
            .map_err(storage_fault)?;
        self.storage
            .create_refresh_token_session(ctx, refresh_signature, access_signature, &sanitized)
            .await
            .map_err(storage_fault)?;
        Ok(())
    }
}

#[async_trait]
impl<S> TokenEndpointHandler for RefreshTokenHandler<S>
where
    S: AccessTokenStorage + RefreshTokenStorage + TokenRevocationStorage + 'static,
{
    fn can_handle_token_endpoint_request(&self, request: &AccessRequest) -> bool {
        request.is_grant_type(GrantType::RefreshToken.as_str())
    }

    async fn handle_token_endpoint_request(
        &self,
        ctx: &RequestContext,
        request: &mut AccessRequest,
    ) -> Result<(), OAuth2Error> {
        if !self.can_handle_token_endpoint_request(request) {
            return Err(OAuth2Error::unknown_request());
        }
        if !request.request.client.has_grant_type(GrantType::RefreshToken) {
            return Err(grant_not_allowed(GrantType::RefreshToken));
        }

        let token = request.request.form.get_or_empty(params::REFRESH_TOKEN).to_owned();
        let signature = self.strategy.refresh_token_signature(&token);
        let stored = self
            .storage
            .get_refresh_token_session(ctx, &signature)
            .await
            .map_err(|e| classify_storage_error(e, refresh_token_not_found))?;

        if !stored.active {
            return Err(self
                .handle_refresh_token_reuse(ctx, &signature, &stored.request)
                .await);
        }
        let original = stored.request;

        if let Err(e) = self.strategy.validate_refresh_token(&original, &token) {
            if e.is(OAuth2ErrorKind::TokenExpired) {
                let hint = e.hint().unwrap_or("The refresh token expired.").to_owned();
                return Err(OAuth2Error::invalid_grant(hint).with_source(e));
            }
            return Err(OAuth2Error::invalid_request("The refresh token is malformed or invalid.")
                .with_source(e));
        }

        if !self.config.allows_refresh_token(&original.granted_scope) {
            return Err(OAuth2Error::new(OAuth2ErrorKind::ScopeNotGranted).with_hint(format!(
                "The OAuth 2.0 Client was not granted scope {} and may thus not perform the 'refresh_token' authorization grant.",
                self.config.refresh_token_scopes.join(" or ")
            )));
        }

        if original.client.id != request.request.client.id {
            return Err(OAuth2Error::invalid_grant(
                "The OAuth 2.0 Client ID from this request does not match the ID during the initial token issuance.",
            ));
        }

        let (requested_scope, granted_scope) =
            self.refreshed_scopes(&original, &request.request.requested_scope)?;
        self.config
            .audience_strategy
            .validate(&request.request.client.audience, &original.granted_audience)?;

        let refreshed = &mut request.request;
        refreshed.id = original.id;
        refreshed.session = original.session.clone();
        refreshed.requested_scope = requested_scope;
        refreshed.granted_scope = granted_scope;
        refreshed.requested_audience = original.requested_audience.clone();
        refreshed.granted_audience = original.granted_audience.clone();
        set_token_expiries(&self.config, refreshed, GrantType::RefreshToken, Utc::now());

        request
            .handled_grant_types
            .append(GrantType::RefreshToken.as_str());
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

        let refreshed = &request.request;
        let presented = refreshed.form.get_or_empty(params::REFRESH_TOKEN);
        let presented_signature = self.strategy.refresh_token_signature(presented);

        let (access_token, access_signature) = self.strategy.generate_access_token(refreshed)?;
        let (refresh_token, refresh_signature) = self.strategy.generate_refresh_token(refreshed)?;

        let tx = self.transactions.begin(ctx).await?;
        let result = self
            .persist_rotation(
                &tx,
                &presented_signature,
                &access_signature,
                &refresh_signature,
                refreshed,
            )
            .await;
        self.transactions.finish(&tx, result).await?;

        info!(
            client_id = %refreshed.client.id,
            request_id = %refreshed.id,
            "Refresh token rotated"
        );

        fill_access_response(
            &self.config,
            refreshed,
            access_token,
            Some(refresh_token),
            response,
        );
        Ok(())
    }
}
