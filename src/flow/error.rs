// ABOUTME: Flow negotiation error kinds and their mapping onto OAuth 2.0 protocol errors
// ABOUTME: Decode failures collapse into one shape so callers cannot tell why a token was refused
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::io;

use super::state::FlowState;
use crate::errors::{CipherError, OAuth2Error, OAuth2ErrorKind, StorageError};

/// Errors raised while encoding, decoding or advancing a flow
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// The token does not decode to a flow of this network
    #[error("flow not found")]
    NotFound,

    /// The flow outlived its maximum age
    #[error("flow expired: {hint}")]
    Expired {
        /// User actionable message
        hint: String,
    },

    /// The verifier was refused
    #[error("access denied: {hint}")]
    AccessDenied {
        /// User visible message
        hint: String,
    },

    /// The verifier or request was already used
    #[error("{what} has already been used")]
    AlreadyUsed {
        /// Which step was replayed
        what: &'static str,
    },

    /// The flow is not in a state the operation may start from
    #[error("invalid flow state: expected one of {expected:?}, got {actual:?}")]
    InvalidState {
        /// States the operation accepts
        expected: &'static [FlowState],
        /// State the flow was in
        actual: FlowState,
    },

    /// The submitted result contradicts what the flow already recorded
    #[error("flow conflict: {hint}")]
    Conflict {
        /// What did not match
        hint: String,
    },

    /// JSON encoding or decoding failed
    #[error("flow serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Gzip compression failed
    #[error("flow compression failed: {0}")]
    Compression(#[from] io::Error),

    /// Sealing the flow failed
    #[error("flow encryption failed: {0}")]
    Cipher(#[from] CipherError),

    /// The replay guard could not be consulted
    #[error("flow storage failed: {0}")]
    Storage(#[from] StorageError),
}

impl From<FlowError> for OAuth2Error {
    fn from(error: FlowError) -> Self {
        match &error {
            FlowError::NotFound => Self::new(OAuth2ErrorKind::NotFound),
            FlowError::Expired { hint } => {
                Self::new(OAuth2ErrorKind::RequestUnauthorized).with_hint(hint.clone())
            }
            FlowError::AccessDenied { hint } => {
                Self::new(OAuth2ErrorKind::AccessDenied).with_hint(hint.clone())
            }
            FlowError::AlreadyUsed { what } => {
                Self::invalid_request(format!("The {what} has already been used."))
            }
            FlowError::Conflict { hint } => Self::invalid_request(hint.clone()),
            FlowError::InvalidState { .. } => {
                Self::new(OAuth2ErrorKind::InvalidRequest).with_debug(error.to_string())
            }
            FlowError::Serialization(_)
            | FlowError::Compression(_)
            | FlowError::Cipher(_)
            | FlowError::Storage(_) => Self::server_error(error.to_string()),
        }
        .with_source(error)
    }
}
