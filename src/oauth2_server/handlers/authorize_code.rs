// ABOUTME: Authorization code grant: front-channel code issuance and back-channel code exchange
// ABOUTME: A replayed code revokes every token minted from it before the request is denied
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use super::{
    can_issue_refresh_token, fill_access_response, grant_not_allowed, invalid_grant_from,
    revoke_token_family, set_token_expiries, storage_fault, validate_granted, validate_requested,
    with_failures, AuthorizeEndpointHandler, TokenEndpointHandler,
};
use crate::config::OAuth2Config;
use crate::constants::params;
use crate::context::RequestContext;
use crate::errors::{MultiError, OAuth2Error, OAuth2ErrorKind, StorageError};
use crate::logging::AuditLogger;
use crate::models::{GrantType, TokenType};
use crate::oauth2_server::request::{AccessRequest, AuthorizeRequest, Request};
use crate::oauth2_server::response::{AccessResponse, AuthorizeResponse};
use crate::oauth2_server::storage::{
    AccessTokenStorage, AuthorizeCodeStorage, RefreshTokenStorage, TokenRevocationStorage,
};
use crate::oauth2_server::strategy::CoreStrategy;
use crate::oauth2_server::transaction::{classify_storage_error, TransactionCoordinator};

const RESPONSE_TYPE_CODE: &str = "code";

fn code_already_used() -> OAuth2Error {
    OAuth2Error::invalid_grant("The authorization code has already been used.")
}

fn code_not_found() -> OAuth2Error {
    OAuth2Error::invalid_grant("The authorization code is unknown or has been revoked.")
}

/// Issues authorization codes and exchanges them for tokens
pub struct AuthorizeCodeHandler<S> {
    strategy: Arc<dyn CoreStrategy>,
    storage: Arc<S>,
    transactions: TransactionCoordinator,
    config: Arc<OAuth2Config>,
}

impl<S> AuthorizeCodeHandler<S>
where
    S: AuthorizeCodeStorage + AccessTokenStorage + RefreshTokenStorage + TokenRevocationStorage,
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

    /// Form keys kept on the stored code session; `redirect_uri` is needed at exchange time
    fn code_allow_list(&self) -> Vec<&str> {
        let mut allowed = vec![params::REDIRECT_URI];
        allowed.extend(self.config.sanitation_allow_list.iter().map(String::as_str));
        allowed
    }

    /// Load the code session, running reuse compensation if the code was already redeemed
    async fn load_active_code(
        &self,
        ctx: &RequestContext,
        signature: &str,
    ) -> Result<Request, OAuth2Error> {
        let stored = self
            .storage
            .get_authorize_code_session(ctx, signature)
            .await
            .map_err(|e| classify_storage_error(e, code_not_found))?;

        if stored.active {
            return Ok(stored.request);
        }

        Err(self.revoke_code_family(ctx, &stored.request).await)
    }

    async fn revoke_code_family(&self, ctx: &RequestContext, stored: &Request) -> OAuth2Error {
        let mut failures = MultiError::new();

        match self.transactions.begin(ctx).await {
            Ok(tx) => {
                revoke_token_family(self.storage.as_ref(), &tx, stored.id, &mut failures).await;
                if let Err(e) = self.transactions.commit(&tx).await {
                    failures.record("commit", Err(StorageError::backend(e.to_string())));
                }
            }
            Err(e) => {
                warn!(error = %e, "Could not open transaction for code reuse compensation");
                revoke_token_family(self.storage.as_ref(), ctx, stored.id, &mut failures).await;
            }
        }

        AuditLogger::token_reuse_detected(
            TokenType::AuthorizeCode,
            stored.id,
            &stored.client.id,
            failures.len(),
        );
        with_failures(code_already_used(), failures)
    }

    async fn persist_exchange(
        &self,
        ctx: &RequestContext,
        code_signature: &str,
        access_signature: &str,
        refresh_signature: Option<&str>,
        request: &Request,
    ) -> Result<(), OAuth2Error> {
        self.storage
            .invalidate_authorize_code_session(ctx, code_signature)
            .await
            .map_err(|e| classify_storage_error(e, code_already_used))?;

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
impl<S> AuthorizeEndpointHandler for AuthorizeCodeHandler<S>
where
    S: AuthorizeCodeStorage
        + AccessTokenStorage
        + RefreshTokenStorage
        + TokenRevocationStorage
        + 'static,
{
    async fn handle_authorize_endpoint_request(
        &self,
        ctx: &RequestContext,
        request: &mut AuthorizeRequest,
        response: &mut AuthorizeResponse,
    ) -> Result<(), OAuth2Error> {
        if !request.response_types.exact_one(RESPONSE_TYPE_CODE) {
            return Ok(());
        }
        request.set_response_type_handled(RESPONSE_TYPE_CODE);

        if !request.request.client.has_response_type(RESPONSE_TYPE_CODE) {
            return Err(OAuth2Error::new(OAuth2ErrorKind::UnsupportedResponseType)
                .with_hint("The client is not allowed to request response_type \"code\"."));
        }
        validate_requested(&self.config, &request.request)?;
        validate_granted(&self.config, &request.request)?;

        let lifespan = request.request.client.effective_lifespan(
            GrantType::AuthorizationCode,
            TokenType::AuthorizeCode,
            self.config.authorize_code_lifespan,
        );
        request
            .request
            .session
            .set_expires_at(TokenType::AuthorizeCode, Some(Utc::now() + lifespan));

        let (code, signature) = self.strategy.generate_authorize_code(&request.request)?;
        let allowed = self.code_allow_list();
        self.storage
            .create_authorize_code_session(ctx, &signature, &request.request.sanitize(&allowed))
            .await
            .map_err(storage_fault)?;

        debug!(
            client_id = %request.request.client.id,
            request_id = %request.request.id,
            "Authorization code issued"
        );

        response.add_query(params::CODE, code);
        response.add_query(params::STATE, request.state.clone());
        response.add_query(params::SCOPE, request.request.granted_scope.join());
        Ok(())
    }
}

#[async_trait]
impl<S> TokenEndpointHandler for AuthorizeCodeHandler<S>
where
    S: AuthorizeCodeStorage
        + AccessTokenStorage
        + RefreshTokenStorage
        + TokenRevocationStorage
        + 'static,
{
    fn can_handle_token_endpoint_request(&self, request: &AccessRequest) -> bool {
        request.is_grant_type(GrantType::AuthorizationCode.as_str())
    }

    async fn handle_token_endpoint_request(
        &self,
        ctx: &RequestContext,
        request: &mut AccessRequest,
    ) -> Result<(), OAuth2Error> {
        if !self.can_handle_token_endpoint_request(request) {
            return Err(OAuth2Error::unknown_request());
        }
        if !request.request.client.has_grant_type(GrantType::AuthorizationCode) {
            return Err(grant_not_allowed(GrantType::AuthorizationCode));
        }

        let code = request.request.form.get_or_empty(params::CODE).to_owned();
        let signature = self.strategy.authorize_code_signature(&code);
        let stored = self.load_active_code(ctx, &signature).await?;

        self.strategy
            .validate_authorize_code(&stored, &code)
            .map_err(|e| invalid_grant_from(e, "The authorization code is malformed."))?;

        if stored.client.id != request.request.client.id {
            return Err(OAuth2Error::invalid_grant(
                "The OAuth 2.0 Client ID from this request does not match the one from the authorize request.",
            ));
        }

        let authorized_redirect = stored.form.get_or_empty(params::REDIRECT_URI);
        let presented_redirect = request.request.form.get_or_empty(params::REDIRECT_URI);
        if !authorized_redirect.is_empty() && authorized_redirect != presented_redirect {
            return Err(OAuth2Error::invalid_grant(
                "The \"redirect_uri\" from this request does not match the one from the authorize request.",
            ));
        }

        let exchange = &mut request.request;
        exchange.id = stored.id;
        exchange.session = stored.session.clone();
        exchange.requested_scope = stored.requested_scope.clone();
        exchange.granted_scope = stored.granted_scope.clone();
        exchange.requested_audience = stored.requested_audience.clone();
        exchange.granted_audience = stored.granted_audience.clone();
        set_token_expiries(&self.config, exchange, GrantType::AuthorizationCode, Utc::now());

        request
            .handled_grant_types
            .append(GrantType::AuthorizationCode.as_str());
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

        let code = request.request.form.get_or_empty(params::CODE);
        let code_signature = self.strategy.authorize_code_signature(code);
        let stored = self
            .storage
            .get_authorize_code_session(ctx, &code_signature)
            .await
            .map_err(|e| classify_storage_error(e, code_not_found))?;
        if !stored.active {
            return Err(code_already_used());
        }
        self.strategy
            .validate_authorize_code(&stored.request, code)
            .map_err(|e| invalid_grant_from(e, "The authorization code is malformed."))?;

        let exchange = &request.request;
        validate_granted(&self.config, exchange)?;

        let (access_token, access_signature) = self.strategy.generate_access_token(exchange)?;
        let refresh = if can_issue_refresh_token(&self.config, exchange) {
            Some(self.strategy.generate_refresh_token(exchange)?)
        } else {
            None
        };

        let tx = self.transactions.begin(ctx).await?;
        let result = self
            .persist_exchange(
                &tx,
                &code_signature,
                &access_signature,
                refresh.as_ref().map(|(_, signature)| signature.as_str()),
                exchange,
            )
            .await;
        self.transactions.finish(&tx, result).await?;

        info!(
            client_id = %exchange.client.id,
            request_id = %exchange.id,
            refresh_issued = refresh.is_some(),
            "Authorization code exchanged"
        );

        fill_access_response(
            &self.config,
            exchange,
            access_token,
            refresh.map(|(token, _)| token),
            response,
        );
        Ok(())
    }
}
