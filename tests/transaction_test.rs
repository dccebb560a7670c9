// ABOUTME: Integration tests for the transaction coordinator over the in-memory store
// ABOUTME: Covers rollback of partial writes, cancellation before commit and write conflicts
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use anyhow::Result;
use tessera::context::RequestContext;
use tessera::errors::{OAuth2Error, OAuth2ErrorKind, StorageError};
use tessera::models::Client;
use tessera::oauth2_server::storage::{AccessTokenStorage, Transactional};
use tessera::oauth2_server::transaction::classify_storage_error;
use tessera::oauth2_server::{AccessRequest, Form, Request, TransactionCoordinator};
use tessera::storage::MemoryStore;

use common::{web_client, Harness, REDIRECT_URI};

fn coordinator(store: &Arc<MemoryStore>) -> TransactionCoordinator {
    let backend: Arc<dyn Transactional> = store.clone();
    TransactionCoordinator::new(backend)
}

fn grant() -> Request {
    Request::new(Arc::new(Client::new("web-app")))
}

#[tokio::test]
async fn test_failed_exchange_rolls_back_every_write() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let transactions = coordinator(&store);
    let ctx = RequestContext::new();

    let tx = transactions.begin(&ctx).await?;
    store.create_access_token_session(&tx, "sig-1", &grant()).await?;
    store.create_access_token_session(&tx, "sig-2", &grant()).await?;
    store.delete_access_token_session(&tx, "sig-1").await?;

    let failure: Result<(), OAuth2Error> = Err(OAuth2Error::server_error("downstream write failed"));
    let err = transactions.finish(&tx, failure).await.unwrap_err();
    assert!(err.is(OAuth2ErrorKind::ServerError));

    assert_eq!(
        store.get_access_token_session(&ctx, "sig-1").await.unwrap_err(),
        StorageError::NotFound
    );
    assert_eq!(
        store.get_access_token_session(&ctx, "sig-2").await.unwrap_err(),
        StorageError::NotFound
    );
    assert_eq!(store.open_transactions().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_rollback_restores_deleted_records() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let transactions = coordinator(&store);
    let ctx = RequestContext::new();
    store.create_access_token_session(&ctx, "sig-1", &grant()).await?;

    let tx = transactions.begin(&ctx).await?;
    store.delete_access_token_session(&tx, "sig-1").await?;
    transactions
        .rollback(&tx, OAuth2Error::server_error("abandoned"))
        .await;

    let restored = store.get_access_token_session(&ctx, "sig-1").await?;
    assert_eq!(restored.client.id, "web-app");
    Ok(())
}

#[tokio::test]
async fn test_successful_exchange_commits() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let transactions = coordinator(&store);
    let ctx = RequestContext::new();

    let tx = transactions.begin(&ctx).await?;
    store.create_access_token_session(&tx, "sig-1", &grant()).await?;
    transactions.finish(&tx, Ok(())).await?;

    store.get_access_token_session(&ctx, "sig-1").await?;
    assert_eq!(store.open_transactions().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_cancelled_request_never_commits() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let transactions = coordinator(&store);
    let ctx = RequestContext::new();

    let tx = transactions.begin(&ctx).await?;
    store.create_access_token_session(&tx, "sig-1", &grant()).await?;
    ctx.cancel();

    let err = transactions.commit(&tx).await.unwrap_err();
    assert!(err.is(OAuth2ErrorKind::ServerError));

    let fresh = RequestContext::new();
    assert!(store.get_access_token_session(&fresh, "sig-1").await.is_err());
    assert_eq!(store.open_transactions().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_cancelled_request_cannot_begin() {
    let store = Arc::new(MemoryStore::new());
    let ctx = RequestContext::new();
    ctx.cancel();

    let err = coordinator(&store).begin(&ctx).await.unwrap_err();
    assert!(err.is(OAuth2ErrorKind::ServerError));
}

#[tokio::test]
async fn test_competing_write_is_a_conflict() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let transactions = coordinator(&store);
    let ctx = RequestContext::new();

    let first = transactions.begin(&ctx).await?;
    let second = transactions.begin(&ctx).await?;
    store.create_access_token_session(&first, "sig-1", &grant()).await?;

    let competing = store
        .create_access_token_session(&second, "sig-1", &grant())
        .await
        .map_err(|e| classify_storage_error(e, || OAuth2Error::server_error("gone")));
    let err = transactions.finish(&second, competing).await.unwrap_err();
    assert!(err.is(OAuth2ErrorKind::SerializationConflict));
    assert_eq!(err.to_response(false).error, "request_conflict");
    assert_eq!(err.to_response(false).status_code, 409);

    transactions.finish(&first, Ok(())).await?;
    store.get_access_token_session(&ctx, "sig-1").await?;

    // The lock is released with the transaction
    let third = transactions.begin(&ctx).await?;
    store.delete_access_token_session(&third, "sig-1").await?;
    transactions.finish(&third, Ok(())).await?;
    Ok(())
}

#[tokio::test]
async fn test_coordinator_without_backend_passes_through() -> Result<()> {
    let transactions = TransactionCoordinator::none();
    let ctx = RequestContext::new();

    let tx = transactions.begin(&ctx).await?;
    assert_eq!(tx.transaction(), None);
    transactions.commit(&tx).await?;

    let err = transactions
        .rollback(&tx, OAuth2Error::invalid_grant("kept as is"))
        .await;
    assert!(err.is(OAuth2ErrorKind::InvalidGrant));
    assert_eq!(err.hint(), Some("kept as is"));
    Ok(())
}

#[tokio::test]
async fn test_cancelled_code_exchange_keeps_code_redeemable() -> Result<()> {
    let h = Harness::new();
    let client = Arc::new(web_client());
    let code = h.issue_code(&client, "openid offline").await?;

    let cancelled = RequestContext::new();
    cancelled.cancel();
    let mut request = AccessRequest::new(
        Arc::clone(&client),
        Form::new()
            .with("grant_type", "authorization_code")
            .with("code", code.as_str())
            .with("redirect_uri", REDIRECT_URI),
    );
    let err = h.provider.exchange(&cancelled, &mut request).await.unwrap_err();
    assert!(err.is(OAuth2ErrorKind::ServerError));

    let tokens = h.exchange_code(&client, &code).await?;
    assert!(tokens.refresh_token.is_some());
    assert_eq!(h.store.open_transactions().await, 0);
    Ok(())
}
