// ABOUTME: Symmetric cipher error kinds for AEAD encryption with key rotation
// ABOUTME: Authentication failure never reveals which key came closest
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Errors reported by the AEAD cipher and HMAC key ring
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CipherError {
    /// Neither a primary nor rotated secret is configured
    #[error("No encryption keys are configured")]
    NoKeys,

    /// A configured secret is shorter than 32 bytes
    #[error("Key must be at least 32 bytes long, got {length} bytes")]
    KeyTooShort {
        /// Actual key length in bytes
        length: usize,
    },

    /// Ciphertext is not valid base64 or is shorter than a nonce
    #[error("Ciphertext is malformed or too short")]
    Malformed,

    /// No configured key authenticated the ciphertext and additional data
    #[error("Message authentication failed")]
    AuthenticationFailed,

    /// The AEAD primitive refused to seal the plaintext
    #[error("Encryption failed")]
    Encryption,
}
