// ABOUTME: Storage capability contracts consumed by grant handlers, introspection and revocation
// ABOUTME: One narrow trait per store so each handler depends only on what it calls
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Storage contracts
//!
//! Sessions are keyed by token signature. Every method receives the request
//! context; writes made through a context bound to a transaction belong to
//! that transaction.

use async_trait::async_trait;

use super::request::Request;
use crate::context::RequestContext;
use crate::errors::StorageError;
use crate::models::RequestId;

/// A stored session together with its invalidation flag
#[derive(Debug, Clone)]
pub struct StoredGrant {
    /// Request the session was created for
    pub request: Request,
    /// False once the code was used or the refresh token was rotated or revoked
    pub active: bool,
}

/// Authorization code sessions
#[async_trait]
pub trait AuthorizeCodeStorage: Send + Sync {
    /// Store a code session under `signature`
    async fn create_authorize_code_session(
        &self,
        ctx: &RequestContext,
        signature: &str,
        request: &Request,
    ) -> Result<(), StorageError>;

    /// Load a code session, including invalidated ones
    async fn get_authorize_code_session(
        &self,
        ctx: &RequestContext,
        signature: &str,
    ) -> Result<StoredGrant, StorageError>;

    /// Mark a code session as used; never reversed
    async fn invalidate_authorize_code_session(
        &self,
        ctx: &RequestContext,
        signature: &str,
    ) -> Result<(), StorageError>;
}

/// Access token sessions
#[async_trait]
pub trait AccessTokenStorage: Send + Sync {
    /// Store an access token session under `signature`
    async fn create_access_token_session(
        &self,
        ctx: &RequestContext,
        signature: &str,
        request: &Request,
    ) -> Result<(), StorageError>;

    /// Load an access token session
    async fn get_access_token_session(
        &self,
        ctx: &RequestContext,
        signature: &str,
    ) -> Result<Request, StorageError>;

    /// Delete an access token session
    async fn delete_access_token_session(
        &self,
        ctx: &RequestContext,
        signature: &str,
    ) -> Result<(), StorageError>;
}

/// Refresh token sessions
#[async_trait]
pub trait RefreshTokenStorage: Send + Sync {
    /// Store a refresh token session issued alongside `access_signature`
    async fn create_refresh_token_session(
        &self,
        ctx: &RequestContext,
        signature: &str,
        access_signature: &str,
        request: &Request,
    ) -> Result<(), StorageError>;

    /// Load a refresh token session, including rotated ones
    async fn get_refresh_token_session(
        &self,
        ctx: &RequestContext,
        signature: &str,
    ) -> Result<StoredGrant, StorageError>;

    /// Delete a refresh token session
    async fn delete_refresh_token_session(
        &self,
        ctx: &RequestContext,
        signature: &str,
    ) -> Result<(), StorageError>;

    /// Supersede the refresh token `signature` of `request_id` and drop its access tokens
    async fn rotate_refresh_token(
        &self,
        ctx: &RequestContext,
        request_id: RequestId,
        signature: &str,
    ) -> Result<(), StorageError>;
}

/// Family-wide revocation by request ID
#[async_trait]
pub trait TokenRevocationStorage: Send + Sync {
    /// Revoke every refresh token of `request_id`
    async fn revoke_refresh_token(
        &self,
        ctx: &RequestContext,
        request_id: RequestId,
    ) -> Result<(), StorageError>;

    /// Revoke every access token of `request_id`
    async fn revoke_access_token(
        &self,
        ctx: &RequestContext,
        request_id: RequestId,
    ) -> Result<(), StorageError>;
}

/// Resource owner credential check for the password grant
#[async_trait]
pub trait ResourceOwnerAuthenticator: Send + Sync {
    /// Return the subject for valid credentials, `NotFound` otherwise
    async fn authenticate(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<String, StorageError>;
}

/// PKCE challenge sessions keyed by authorization code signature
#[async_trait]
pub trait PkceRequestStorage: Send + Sync {
    /// Store the authorize request carrying the challenge
    async fn create_pkce_request_session(
        &self,
        ctx: &RequestContext,
        signature: &str,
        request: &Request,
    ) -> Result<(), StorageError>;

    /// Load the authorize request carrying the challenge
    async fn get_pkce_request_session(
        &self,
        ctx: &RequestContext,
        signature: &str,
    ) -> Result<Request, StorageError>;

    /// Delete the challenge session
    async fn delete_pkce_request_session(
        &self,
        ctx: &RequestContext,
        signature: &str,
    ) -> Result<(), StorageError>;
}

/// Record of flow verifiers that were already redeemed
#[async_trait]
pub trait ConsumedVerifierStorage: Send + Sync {
    /// Record `key` as consumed, failing with `Inactive` if it already was
    async fn consume_verifier(&self, ctx: &RequestContext, key: &str) -> Result<(), StorageError>;
}

/// Optional transaction support
#[async_trait]
pub trait Transactional: Send + Sync {
    /// Open a transaction, returning a context bound to it
    async fn begin_tx(&self, ctx: &RequestContext) -> Result<RequestContext, StorageError>;

    /// Commit the transaction bound to `ctx`
    async fn commit(&self, ctx: &RequestContext) -> Result<(), StorageError>;

    /// Undo every write of the transaction bound to `ctx`
    async fn rollback(&self, ctx: &RequestContext) -> Result<(), StorageError>;
}
