// ABOUTME: Cryptography module providing AEAD sealing and HMAC opaque tokens with key rotation
// ABOUTME: Keys come from a SecretProvider; the first secret is primary, the rest are rotated
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Cryptographic primitives for tokens and flow sealing

/// Generic AEAD cipher over AES-256-GCM or XChaCha20-Poly1305
pub mod aead;
/// HMAC-signed opaque token generation and validation
pub mod hmac;
/// Secret provider contract and key ring construction
pub mod secrets;

use std::str::FromStr;
use std::sync::Arc;

pub use aead::{AeadCipher, AesGcmCipher, XChaCha20Poly1305Cipher};
pub use hmac::HmacTokenGenerator;
pub use secrets::{key_ring, SecretProvider, StaticSecretProvider};

use crate::errors::CipherError;

/// Authenticated encryption with additional data and multi-key decryption
///
/// Implementations are stateless and safe to share between requests.
pub trait Cipher: Send + Sync {
    /// Seal `plaintext` under the primary key, binding `additional_data`
    ///
    /// # Errors
    ///
    /// Returns an error if no usable key is configured or sealing fails
    fn encrypt(&self, plaintext: &[u8], additional_data: &[u8]) -> Result<String, CipherError>;

    /// Open `ciphertext` with the primary key, then each rotated key in order
    ///
    /// # Errors
    ///
    /// Returns `Malformed` for undecodable input and `AuthenticationFailed`
    /// when no key opens the ciphertext with `additional_data`
    fn decrypt(&self, ciphertext: &str, additional_data: &[u8]) -> Result<Vec<u8>, CipherError>;
}

/// AEAD algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CipherKind {
    /// XChaCha20-Poly1305 with 24-byte random nonces
    #[default]
    XChaCha20Poly1305,
    /// AES-256-GCM with 12-byte random nonces
    Aes256Gcm,
}

impl CipherKind {
    /// Build a cipher of this kind over `secrets`
    #[must_use]
    pub fn build(self, secrets: Arc<dyn SecretProvider>) -> Arc<dyn Cipher> {
        match self {
            Self::XChaCha20Poly1305 => Arc::new(XChaCha20Poly1305Cipher::new(secrets)),
            Self::Aes256Gcm => Arc::new(AesGcmCipher::new(secrets)),
        }
    }
}

impl FromStr for CipherKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "").as_str() {
            "xchacha20poly1305" => Ok(Self::XChaCha20Poly1305),
            "aes256gcm" | "aesgcm" => Ok(Self::Aes256Gcm),
            other => Err(format!("unknown cipher: {other}")),
        }
    }
}
