// ABOUTME: Secret provider contract supplying primary and rotated key material
// ABOUTME: Key rings are rebuilt per call so concurrent rotation never races a cached list
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use sha2::{Digest, Sha256};
use tracing::warn;
use zeroize::Zeroizing;

use crate::constants::tokens::MIN_SECRET_BYTES;
use crate::errors::CipherError;

/// Supplies key material to the cipher and HMAC strategy
///
/// Rotation policy is owned by the implementor.
pub trait SecretProvider: Send + Sync {
    /// Secret used for every new ciphertext and signature
    fn primary_secret(&self) -> Option<Zeroizing<Vec<u8>>>;

    /// Older secrets still accepted for decryption and validation
    fn rotated_secrets(&self) -> Vec<Zeroizing<Vec<u8>>>;
}

/// Fixed in-memory secrets
#[derive(Clone)]
pub struct StaticSecretProvider {
    primary: Option<Zeroizing<Vec<u8>>>,
    rotated: Vec<Zeroizing<Vec<u8>>>,
}

impl StaticSecretProvider {
    /// Create a provider from a primary secret and rotated secrets
    #[must_use]
    pub fn new(primary: impl Into<Vec<u8>>, rotated: Vec<Vec<u8>>) -> Self {
        Self {
            primary: Some(Zeroizing::new(primary.into())),
            rotated: rotated.into_iter().map(Zeroizing::new).collect(),
        }
    }

    /// Create a provider without any secret
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            primary: None,
            rotated: Vec::new(),
        }
    }
}

impl SecretProvider for StaticSecretProvider {
    fn primary_secret(&self) -> Option<Zeroizing<Vec<u8>>> {
        self.primary.clone()
    }

    fn rotated_secrets(&self) -> Vec<Zeroizing<Vec<u8>>> {
        self.rotated.clone()
    }
}

/// Build the ordered key ring: primary first, then rotated keys in order
///
/// Each key is the SHA-256 digest of its secret, so every byte of a long
/// secret contributes. A short primary secret fails the ring; a short rotated
/// secret is skipped so the remaining keys keep opening older tokens.
///
/// # Errors
///
/// Returns `NoKeys` when nothing is configured and `KeyTooShort` for a short primary secret
pub fn key_ring(provider: &dyn SecretProvider) -> Result<Vec<Zeroizing<[u8; 32]>>, CipherError> {
    let primary = provider.primary_secret().ok_or(CipherError::NoKeys)?;
    if primary.len() < MIN_SECRET_BYTES {
        return Err(CipherError::KeyTooShort {
            length: primary.len(),
        });
    }

    let mut ring = vec![derive_key(&primary)];
    for (position, secret) in provider.rotated_secrets().iter().enumerate() {
        if secret.len() < MIN_SECRET_BYTES {
            warn!(
                rotated.position = position,
                secret.length = secret.len(),
                "Skipping rotated secret shorter than 32 bytes"
            );
            continue;
        }
        ring.push(derive_key(secret));
    }
    Ok(ring)
}

fn derive_key(secret: &[u8]) -> Zeroizing<[u8; 32]> {
    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&Sha256::digest(secret));
    key
}
