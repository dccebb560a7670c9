// ABOUTME: Token revocation (RFC 7009) revoking the whole token family of a presented token
// ABOUTME: Unknown or already inactive tokens succeed silently; backend faults are retryable
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::handlers::revoke_token_family;
use super::request::Request;
use super::storage::{AccessTokenStorage, RefreshTokenStorage, TokenRevocationStorage};
use super::strategy::CoreStrategy;
use super::transaction::TransactionCoordinator;
use crate::context::RequestContext;
use crate::errors::{MultiError, OAuth2Error, OAuth2ErrorKind, StorageError};
use crate::logging::AuditLogger;
use crate::models::{Client, TokenType};

/// Revocation endpoint behavior
#[async_trait]
pub trait RevocationHandler: Send + Sync {
    /// Revoke `token` on behalf of `client`
    ///
    /// # Errors
    ///
    /// Returns `unauthorized_client` if the token belongs to another client
    /// and `temporarily_unavailable` if storage failed
    async fn revoke_token(
        &self,
        ctx: &RequestContext,
        token: &str,
        hint: Option<TokenType>,
        client: &Client,
    ) -> Result<(), OAuth2Error>;
}

/// Looks a token up as refresh and access token and revokes its family
pub struct TokenRevocationHandler<S> {
    strategy: Arc<dyn CoreStrategy>,
    storage: Arc<S>,
    transactions: TransactionCoordinator,
}

impl<S> TokenRevocationHandler<S>
where
    S: AccessTokenStorage + RefreshTokenStorage + TokenRevocationStorage,
{
    /// Create a handler revoking through `storage`
    #[must_use]
    pub fn new(
        strategy: Arc<dyn CoreStrategy>,
        storage: Arc<S>,
        transactions: TransactionCoordinator,
    ) -> Self {
        Self {
            strategy,
            storage,
            transactions,
        }
    }

    async fn discover(
        &self,
        ctx: &RequestContext,
        token: &str,
        token_type: TokenType,
    ) -> Result<Request, StorageError> {
        match token_type {
            TokenType::RefreshToken => {
                let signature = self.strategy.refresh_token_signature(token);
                let stored = self.storage.get_refresh_token_session(ctx, &signature).await?;
                if stored.active {
                    Ok(stored.request)
                } else {
                    Err(StorageError::Inactive)
                }
            }
            TokenType::AccessToken => {
                let signature = self.strategy.access_token_signature(token);
                self.storage.get_access_token_session(ctx, &signature).await
            }
            TokenType::AuthorizeCode => Err(StorageError::NotFound),
        }
    }
}

fn unavailable(failures: MultiError) -> OAuth2Error {
    OAuth2Error::new(OAuth2ErrorKind::TemporarilyUnavailable)
        .with_hint("Revocation could not be completed, please retry.")
        .with_debug(failures.to_string())
        .with_source(failures)
}

/// The token state is unknown after a storage fault, so the client should retry
fn retryable(error: OAuth2Error) -> OAuth2Error {
    if error.is(OAuth2ErrorKind::ServerError) || error.is(OAuth2ErrorKind::SerializationConflict) {
        OAuth2Error::new(OAuth2ErrorKind::TemporarilyUnavailable)
            .with_hint("Revocation could not be completed, please retry.")
            .with_source(error)
    } else {
        error
    }
}

#[async_trait]
impl<S> RevocationHandler for TokenRevocationHandler<S>
where
    S: AccessTokenStorage + RefreshTokenStorage + TokenRevocationStorage + 'static,
{
    async fn revoke_token(
        &self,
        ctx: &RequestContext,
        token: &str,
        hint: Option<TokenType>,
        client: &Client,
    ) -> Result<(), OAuth2Error> {
        let order = if hint == Some(TokenType::AccessToken) {
            [TokenType::AccessToken, TokenType::RefreshToken]
        } else {
            [TokenType::RefreshToken, TokenType::AccessToken]
        };

        let mut lookup_failures = MultiError::new();
        let mut found = None;
        for token_type in order {
            match self.discover(ctx, token, token_type).await {
                Ok(request) => {
                    found = Some((token_type, request));
                    break;
                }
                Err(e) if e.is_gone() => {}
                Err(e) => lookup_failures.record(
                    match token_type {
                        TokenType::AccessToken => "get_access_token_session",
                        _ => "get_refresh_token_session",
                    },
                    Err(e),
                ),
            }
        }

        let Some((token_type, request)) = found else {
            return if lookup_failures.is_empty() {
                debug!(client_id = %client.id, "Revocation of unknown or inactive token ignored");
                Ok(())
            } else {
                Err(unavailable(lookup_failures))
            };
        };

        if request.client.id != client.id {
            return Err(OAuth2Error::unauthorized_client(
                "The OAuth 2.0 Client is not allowed to revoke a token issued to another client.",
            ));
        }

        let tx = self.transactions.begin(ctx).await.map_err(retryable)?;
        let mut failures = MultiError::new();
        revoke_token_family(self.storage.as_ref(), &tx, request.id, &mut failures).await;
        let result = failures.into_result().map_err(unavailable);
        self.transactions
            .finish(&tx, result)
            .await
            .map_err(retryable)?;

        AuditLogger::token_revoked(request.id, &client.id, token_type);
        Ok(())
    }
}
