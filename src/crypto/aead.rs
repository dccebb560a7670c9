// ABOUTME: AEAD cipher generic over AES-256-GCM and XChaCha20-Poly1305
// ABOUTME: Output is base64url(nonce || ciphertext || tag) with a fresh random nonce per call
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::marker::PhantomData;
use std::sync::Arc;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, Nonce, Payload};
use aes_gcm::Aes256Gcm;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chacha20poly1305::XChaCha20Poly1305;
use rand::RngCore;

use super::{key_ring, Cipher, SecretProvider};
use crate::errors::CipherError;

/// AEAD cipher over the key ring of a [`SecretProvider`]
pub struct AeadCipher<A> {
    secrets: Arc<dyn SecretProvider>,
    algorithm: PhantomData<fn() -> A>,
}

/// AES-256-GCM cipher
pub type AesGcmCipher = AeadCipher<Aes256Gcm>;

/// XChaCha20-Poly1305 cipher
pub type XChaCha20Poly1305Cipher = AeadCipher<XChaCha20Poly1305>;

impl<A> AeadCipher<A> {
    /// Create a cipher reading keys from `secrets` on every call
    #[must_use]
    pub fn new(secrets: Arc<dyn SecretProvider>) -> Self {
        Self {
            secrets,
            algorithm: PhantomData,
        }
    }
}

impl<A> Cipher for AeadCipher<A>
where
    A: Aead + AeadCore + KeyInit,
{
    fn encrypt(&self, plaintext: &[u8], additional_data: &[u8]) -> Result<String, CipherError> {
        let keys = key_ring(self.secrets.as_ref())?;
        let primary = keys.first().ok_or(CipherError::NoKeys)?;
        let cipher = A::new_from_slice(primary.as_slice()).map_err(|_| CipherError::KeyTooShort {
            length: primary.len(),
        })?;

        let mut nonce = Nonce::<A>::default();
        rand::thread_rng().fill_bytes(&mut nonce);

        let sealed = cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: plaintext,
                    aad: additional_data,
                },
            )
            .map_err(|_| CipherError::Encryption)?;

        let mut out = Vec::with_capacity(nonce.len() + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(URL_SAFE_NO_PAD.encode(out))
    }

    fn decrypt(&self, ciphertext: &str, additional_data: &[u8]) -> Result<Vec<u8>, CipherError> {
        let keys = key_ring(self.secrets.as_ref())?;
        let raw = URL_SAFE_NO_PAD
            .decode(ciphertext.trim_end_matches('='))
            .map_err(|_| CipherError::Malformed)?;

        let nonce_len = Nonce::<A>::default().len();
        if raw.len() <= nonce_len {
            return Err(CipherError::Malformed);
        }
        let (nonce, sealed) = raw.split_at(nonce_len);
        let nonce = Nonce::<A>::from_slice(nonce);

        for key in &keys {
            let Ok(cipher) = A::new_from_slice(key.as_slice()) else {
                continue;
            };
            if let Ok(plaintext) = cipher.decrypt(
                nonce,
                Payload {
                    msg: sealed,
                    aad: additional_data,
                },
            ) {
                return Ok(plaintext);
            }
        }
        Err(CipherError::AuthenticationFailed)
    }
}
