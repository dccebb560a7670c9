// ABOUTME: Storage collaborator error kinds consumed by grant handlers
// ABOUTME: Distinguishes not-found, inactive, serialization conflicts, and cancellation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Errors a storage collaborator may report
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// No record exists under the given key
    #[error("Could not find the requested resource(s)")]
    NotFound,

    /// The record exists but was invalidated, rotated, or revoked
    #[error("The requested resource is no longer active")]
    Inactive,

    /// A concurrent transaction modified the same record
    #[error("Serialization failure: a concurrent transaction touched the same record")]
    SerializationFailure,

    /// The caller's context was cancelled before the operation ran
    #[error("Operation cancelled by caller")]
    Cancelled,

    /// Any other backend failure
    #[error("Storage backend error: {message}")]
    Backend {
        /// Backend-specific failure message
        message: String,
    },
}

impl StorageError {
    /// Create a backend error
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// True for `NotFound` and `Inactive`, the two kinds that mean "not usable"
    #[must_use]
    pub const fn is_gone(&self) -> bool {
        matches!(self, Self::NotFound | Self::Inactive)
    }
}
