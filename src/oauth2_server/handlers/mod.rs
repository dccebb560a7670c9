// ABOUTME: Grant handler contracts for the token and authorization endpoints plus shared helpers
// ABOUTME: Handlers return unknown_request for requests they do not own so a dispatcher can fall through
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Grant handlers
//!
//! Token endpoint handlers run in two phases. `handle_token_endpoint_request`
//! validates the request and prepares its session; once every handler has
//! run, `populate_token_endpoint_response` mints and persists tokens.

/// Authorization code grant (RFC 6749 section 4.1)
pub mod authorize_code;
/// Client credentials grant (RFC 6749 section 4.4)
pub mod client_credentials;
/// Implicit grant (RFC 6749 section 4.2)
pub mod implicit;
/// Proof Key for Code Exchange (RFC 7636)
pub mod pkce;
/// Refresh token grant with rotation and reuse detection (RFC 6749 section 6)
pub mod refresh;
/// Resource owner password credentials grant (RFC 6749 section 4.3)
pub mod resource_owner;

pub use authorize_code::AuthorizeCodeHandler;
pub use client_credentials::ClientCredentialsHandler;
pub use implicit::ImplicitHandler;
pub use pkce::PkceHandler;
pub use refresh::RefreshTokenHandler;
pub use resource_owner::ResourceOwnerPasswordHandler;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::request::{AccessRequest, AuthorizeRequest, Request};
use super::response::{AccessResponse, AuthorizeResponse};
use super::storage::TokenRevocationStorage;
use super::transaction::classify_storage_error;
use crate::config::OAuth2Config;
use crate::constants::tokens::BEARER;
use crate::context::RequestContext;
use crate::errors::{MultiError, OAuth2Error, StorageError};
use crate::models::{GrantType, RequestId, TokenType};

/// Back-channel grant handler
#[async_trait]
pub trait TokenEndpointHandler: Send + Sync {
    /// True if the request may skip client authentication
    fn can_skip_client_auth(&self, _request: &AccessRequest) -> bool {
        false
    }

    /// True if this handler owns the request
    fn can_handle_token_endpoint_request(&self, request: &AccessRequest) -> bool;

    /// Validate the request and prepare its session
    ///
    /// # Errors
    ///
    /// Returns `unknown_request` for requests this handler does not own
    async fn handle_token_endpoint_request(
        &self,
        ctx: &RequestContext,
        request: &mut AccessRequest,
    ) -> Result<(), OAuth2Error>;

    /// Mint and persist tokens, filling `response`
    ///
    /// # Errors
    ///
    /// Returns `unknown_request` for requests this handler does not own
    async fn populate_token_endpoint_response(
        &self,
        ctx: &RequestContext,
        request: &AccessRequest,
        response: &mut AccessResponse,
    ) -> Result<(), OAuth2Error>;
}

/// Front-channel handler for the authorization endpoint
#[async_trait]
pub trait AuthorizeEndpointHandler: Send + Sync {
    /// Handle the response types this handler owns, leaving others untouched
    ///
    /// # Errors
    ///
    /// Returns a protocol error when an owned response type cannot be issued
    async fn handle_authorize_endpoint_request(
        &self,
        ctx: &RequestContext,
        request: &mut AuthorizeRequest,
        response: &mut AuthorizeResponse,
    ) -> Result<(), OAuth2Error>;
}

/// Set access and refresh expiries on the session from client or server lifespans
pub(crate) fn set_token_expiries(
    config: &OAuth2Config,
    request: &mut Request,
    grant_type: GrantType,
    now: DateTime<Utc>,
) {
    let access = request.client.effective_lifespan(
        grant_type,
        TokenType::AccessToken,
        config.access_token_lifespan,
    );
    request
        .session
        .set_expires_at(TokenType::AccessToken, Some(now + access));

    let refresh = config
        .refresh_token_lifespan
        .map(|fallback| {
            now + request
                .client
                .effective_lifespan(grant_type, TokenType::RefreshToken, fallback)
        });
    request
        .session
        .set_expires_at(TokenType::RefreshToken, refresh);
}

/// Seconds until the access token of `request` expires
pub(crate) fn expires_in(request: &Request, fallback: Duration, now: DateTime<Utc>) -> i64 {
    request
        .session
        .expires_at(TokenType::AccessToken)
        .map_or_else(|| fallback.num_seconds(), |at| (at - now).num_seconds())
}

/// True if a refresh token may accompany the access token for `request`
pub(crate) fn can_issue_refresh_token(config: &OAuth2Config, request: &Request) -> bool {
    config.allows_refresh_token(&request.granted_scope)
        && request.client.has_grant_type(GrantType::RefreshToken)
}

/// Validate requested scopes and audiences against the current client registration
pub(crate) fn validate_requested(config: &OAuth2Config, request: &Request) -> Result<(), OAuth2Error> {
    config
        .scope_strategy
        .validate(&request.client, &request.requested_scope)?;
    config
        .audience_strategy
        .validate(&request.client.audience, &request.requested_audience)
}

/// Validate granted scopes and audiences against the current client registration
pub(crate) fn validate_granted(config: &OAuth2Config, request: &Request) -> Result<(), OAuth2Error> {
    config
        .scope_strategy
        .validate(&request.client, &request.granted_scope)?;
    config
        .audience_strategy
        .validate(&request.client.audience, &request.granted_audience)
}

/// Fill the common members of a token response
pub(crate) fn fill_access_response(
    config: &OAuth2Config,
    request: &Request,
    access_token: String,
    refresh_token: Option<String>,
    response: &mut AccessResponse,
) {
    response.access_token = access_token;
    response.token_type = BEARER.to_owned();
    response.expires_in = Some(expires_in(request, config.access_token_lifespan, Utc::now()));
    response.scope = Some(request.granted_scope.join());
    response.refresh_token = refresh_token;
}

/// `unauthorized_client` for a client lacking `grant_type`
pub(crate) fn grant_not_allowed(grant_type: GrantType) -> OAuth2Error {
    OAuth2Error::unauthorized_client(format!(
        "The OAuth 2.0 Client is not allowed to use authorization grant \"{grant_type}\"."
    ))
}

/// Map a storage failure on a write that has no "gone" meaning
pub(crate) fn storage_fault(error: StorageError) -> OAuth2Error {
    classify_storage_error(error, || {
        OAuth2Error::server_error("record disappeared while it was being written")
    })
}

/// Turn a strategy validation failure into `invalid_grant`, keeping its hint
pub(crate) fn invalid_grant_from(error: OAuth2Error, fallback_hint: &str) -> OAuth2Error {
    let hint = error.hint().unwrap_or(fallback_hint).to_owned();
    OAuth2Error::invalid_grant(hint).with_source(error)
}

/// Revoke every access and refresh token of `request_id`, collecting failures
pub(crate) async fn revoke_token_family<S>(
    storage: &S,
    ctx: &RequestContext,
    request_id: RequestId,
    failures: &mut MultiError,
) where
    S: TokenRevocationStorage + ?Sized,
{
    failures.record_ignoring_missing(
        "revoke_refresh_token",
        storage.revoke_refresh_token(ctx, request_id).await,
    );
    failures.record_ignoring_missing(
        "revoke_access_token",
        storage.revoke_access_token(ctx, request_id).await,
    );
}

/// Attach collected compensation failures to `error`
pub(crate) fn with_failures(error: OAuth2Error, failures: MultiError) -> OAuth2Error {
    if failures.is_empty() {
        error
    } else {
        error.with_debug(failures.to_string()).with_source(failures)
    }
}
