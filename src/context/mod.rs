// ABOUTME: Request-scoped context carrying cancellation and the active storage transaction
// ABOUTME: Passed to every storage call so a cancelled caller never commits a partial write
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Request context
//!
//! A [`RequestContext`] is cheap to clone. Cloning shares the cancellation token,
//! so cancelling any clone cancels the request. [`Transactional::begin_tx`]
//! returns a derived context bound to the new transaction; storage
//! implementations journal writes made through that context.
//!
//! [`Transactional::begin_tx`]: crate::oauth2_server::storage::Transactional::begin_tx

use std::fmt;

use tokio_util::sync::CancellationToken;

use crate::errors::StorageError;

/// Handle of an open storage transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

/// Request-scoped context
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancellation: CancellationToken,
    transaction: Option<TransactionId>,
}

impl RequestContext {
    /// Create a fresh, uncancelled context
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a context bound to `transaction`, sharing cancellation
    #[must_use]
    pub fn with_transaction(&self, transaction: TransactionId) -> Self {
        Self {
            cancellation: self.cancellation.clone(),
            transaction: Some(transaction),
        }
    }

    /// Transaction this context writes through, if any
    #[must_use]
    pub const fn transaction(&self) -> Option<TransactionId> {
        self.transaction
    }

    /// Cancel the request
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// True once the request has been cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Fail if the request has been cancelled
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Cancelled` once the token is cancelled
    pub fn ensure_active(&self) -> Result<(), StorageError> {
        if self.is_cancelled() {
            Err(StorageError::Cancelled)
        } else {
            Ok(())
        }
    }
}
