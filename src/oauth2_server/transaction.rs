// ABOUTME: Transaction coordinator wrapping a grant exchange's storage writes
// ABOUTME: Always rolls back on failure and maps serialization conflicts to a retryable error
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use tracing::{debug, warn};

use super::storage::Transactional;
use crate::context::RequestContext;
use crate::errors::{OAuth2Error, OAuth2ErrorKind, StorageError};

/// Begin/commit/rollback around a token exchange
///
/// Without a [`Transactional`] backend every write is applied immediately
/// and commit and rollback do nothing.
#[derive(Clone, Default)]
pub struct TransactionCoordinator {
    backend: Option<Arc<dyn Transactional>>,
}

impl TransactionCoordinator {
    /// Coordinator over `backend`
    #[must_use]
    pub fn new(backend: Arc<dyn Transactional>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// Coordinator that applies writes without a transaction
    #[must_use]
    pub const fn none() -> Self {
        Self { backend: None }
    }

    /// Open a transaction, returning the context to write through
    ///
    /// # Errors
    ///
    /// Returns `server_error` if the caller was cancelled or the backend refused
    pub async fn begin(&self, ctx: &RequestContext) -> Result<RequestContext, OAuth2Error> {
        ctx.ensure_active().map_err(|e| classify_server_fault(&e))?;
        match &self.backend {
            Some(backend) => backend
                .begin_tx(ctx)
                .await
                .map_err(|e| classify_server_fault(&e)),
            None => Ok(ctx.clone()),
        }
    }

    /// Commit, rolling back instead if the caller was cancelled
    ///
    /// # Errors
    ///
    /// Returns `request_conflict` for serialization failures and `server_error` otherwise
    pub async fn commit(&self, ctx: &RequestContext) -> Result<(), OAuth2Error> {
        let Some(backend) = &self.backend else {
            return Ok(());
        };

        if let Err(e) = ctx.ensure_active() {
            return Err(self.rollback(ctx, classify_server_fault(&e)).await);
        }

        match backend.commit(ctx).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let error = classify_storage_error(e, || {
                    OAuth2Error::server_error("transaction commit failed")
                });
                Err(self.rollback(ctx, error).await)
            }
        }
    }

    /// Roll back and return `error`, folding any rollback failure into its debug detail
    pub async fn rollback(&self, ctx: &RequestContext, error: OAuth2Error) -> OAuth2Error {
        let Some(backend) = &self.backend else {
            return error;
        };

        match backend.rollback(ctx).await {
            Ok(()) => {
                debug!(error = %error, "Transaction rolled back");
                error
            }
            Err(rollback_error) => {
                warn!(error = %error, rollback_error = %rollback_error, "Transaction rollback failed");
                let debug = error.debug().map_or_else(
                    || format!("rollback failed: {rollback_error}"),
                    |existing| format!("{existing}; rollback failed: {rollback_error}"),
                );
                error.with_debug(debug)
            }
        }
    }

    /// Commit on success, roll back on failure
    ///
    /// # Errors
    ///
    /// Returns the original error after rollback, or the commit error
    pub async fn finish<T>(
        &self,
        ctx: &RequestContext,
        result: Result<T, OAuth2Error>,
    ) -> Result<T, OAuth2Error> {
        match result {
            Ok(value) => self.commit(ctx).await.map(|()| value),
            Err(error) => Err(self.rollback(ctx, error).await),
        }
    }
}

/// Map a storage error to a protocol error
///
/// Serialization failures become a retryable `request_conflict`; `NotFound`
/// and `Inactive` become the caller supplied error; anything else is a
/// `server_error`.
pub fn classify_storage_error(
    error: StorageError,
    on_gone: impl FnOnce() -> OAuth2Error,
) -> OAuth2Error {
    match error {
        StorageError::SerializationFailure => {
            OAuth2Error::new(OAuth2ErrorKind::SerializationConflict)
                .with_hint("Please retry the request.")
                .with_source(error)
        }
        StorageError::NotFound | StorageError::Inactive => on_gone().with_source(error),
        other => classify_server_fault(&other).with_source(other),
    }
}

fn classify_server_fault(error: &StorageError) -> OAuth2Error {
    OAuth2Error::server_error(error.to_string())
}
