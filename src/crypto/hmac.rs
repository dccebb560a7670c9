// ABOUTME: HMAC-SHA512 signed opaque tokens of the form base64url(secret).base64url(signature)
// ABOUTME: New tokens use the primary key; validation accepts any key in the ring
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};

use super::{key_ring, SecretProvider};
use crate::constants::tokens::{DEFAULT_ENTROPY_BYTES, MIN_SECRET_BYTES, SIGNATURE_SEPARATOR};
use crate::errors::{CipherError, OAuth2Error, OAuth2ErrorKind};

/// Generates and validates HMAC-signed opaque tokens
#[derive(Clone)]
pub struct HmacTokenGenerator {
    secrets: Arc<dyn SecretProvider>,
    entropy: usize,
    rng: SystemRandom,
}

impl HmacTokenGenerator {
    /// Create a generator with the default entropy
    #[must_use]
    pub fn new(secrets: Arc<dyn SecretProvider>) -> Self {
        Self {
            secrets,
            entropy: DEFAULT_ENTROPY_BYTES,
            rng: SystemRandom::new(),
        }
    }

    /// Set the number of random bytes per token, never below 32
    #[must_use]
    pub fn with_entropy(mut self, entropy: usize) -> Self {
        self.entropy = entropy.max(MIN_SECRET_BYTES);
        self
    }

    fn keys(&self) -> Result<Vec<hmac::Key>, OAuth2Error> {
        let ring = key_ring(self.secrets.as_ref()).map_err(cipher_fault)?;
        Ok(ring
            .iter()
            .map(|key| hmac::Key::new(hmac::HMAC_SHA512, key.as_slice()))
            .collect())
    }

    /// Generate a token and its signature
    ///
    /// # Errors
    ///
    /// Returns `server_error` if no usable secret is configured or entropy is unavailable
    pub fn generate(&self) -> Result<(String, String), OAuth2Error> {
        let keys = self.keys()?;
        let primary = keys
            .first()
            .ok_or_else(|| cipher_fault(CipherError::NoKeys))?;

        let mut secret = vec![0u8; self.entropy];
        self.rng
            .fill(&mut secret)
            .map_err(|_| OAuth2Error::server_error("system entropy source unavailable"))?;

        let tag = hmac::sign(primary, &secret);
        let signature = URL_SAFE_NO_PAD.encode(tag.as_ref());
        let token = format!(
            "{}{SIGNATURE_SEPARATOR}{signature}",
            URL_SAFE_NO_PAD.encode(&secret)
        );
        Ok((token, signature))
    }

    /// Validate the signature of `token` against every key in the ring
    ///
    /// # Errors
    ///
    /// Returns `invalid_token_format` for malformed tokens and
    /// `token_signature_mismatch` when no key produced the signature
    pub fn validate(&self, token: &str) -> Result<(), OAuth2Error> {
        let (secret, signature) = split_token(token).ok_or_else(|| {
            OAuth2Error::new(OAuth2ErrorKind::InvalidTokenFormat)
                .with_hint("Token must consist of a key and a signature separated by a dot.")
        })?;

        let secret = URL_SAFE_NO_PAD.decode(secret).map_err(|e| {
            OAuth2Error::new(OAuth2ErrorKind::InvalidTokenFormat).with_debug(e.to_string())
        })?;
        let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|e| {
            OAuth2Error::new(OAuth2ErrorKind::InvalidTokenFormat).with_debug(e.to_string())
        })?;

        if self
            .keys()?
            .iter()
            .any(|key| hmac::verify(key, &secret, &signature).is_ok())
        {
            Ok(())
        } else {
            Err(OAuth2Error::new(OAuth2ErrorKind::TokenSignatureMismatch))
        }
    }

    /// Signature part of `token`, empty for malformed tokens
    #[must_use]
    pub fn signature(token: &str) -> &str {
        split_token(token).map_or("", |(_, signature)| signature)
    }
}

fn split_token(token: &str) -> Option<(&str, &str)> {
    let (secret, signature) = token.split_once(SIGNATURE_SEPARATOR)?;
    if secret.is_empty() || signature.is_empty() || signature.contains(SIGNATURE_SEPARATOR) {
        return None;
    }
    Some((secret, signature))
}

fn cipher_fault(error: CipherError) -> OAuth2Error {
    OAuth2Error::server_error(error.to_string()).with_source(error)
}
