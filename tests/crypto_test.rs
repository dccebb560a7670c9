// ABOUTME: Integration tests for the AEAD ciphers, the key ring and HMAC token strategies
// ABOUTME: Verifies associated data binding, key rotation and opaque token validation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use tessera::config::OAuth2Config;
use tessera::crypto::{CipherKind, HmacTokenGenerator, SecretProvider, StaticSecretProvider};
use tessera::errors::{CipherError, OAuth2ErrorKind};
use tessera::models::Client;
use tessera::oauth2_server::strategy::{
    AccessTokenStrategy, AuthorizeCodeStrategy, RefreshTokenStrategy,
};
use tessera::oauth2_server::{HmacStrategy, Request};

use common::secret;

fn provider(primary: u8, rotated: &[u8]) -> Arc<dyn SecretProvider> {
    Arc::new(StaticSecretProvider::new(
        secret(primary),
        rotated.iter().map(|byte| secret(*byte)).collect(),
    ))
}

fn request() -> Request {
    Request::new(Arc::new(Client::new("web-app")))
}

#[test]
fn test_ciphers_roundtrip_with_associated_data() -> Result<()> {
    for kind in [CipherKind::XChaCha20Poly1305, CipherKind::Aes256Gcm] {
        let cipher = kind.build(provider(1, &[]));
        let sealed = cipher.encrypt(b"flow state", b"login_challenge")?;
        assert_eq!(cipher.decrypt(&sealed, b"login_challenge")?, b"flow state");

        // Random nonces make every seal distinct
        assert_ne!(cipher.encrypt(b"flow state", b"login_challenge")?, sealed);
    }
    Ok(())
}

#[test]
fn test_associated_data_mismatch_fails() -> Result<()> {
    let cipher = CipherKind::default().build(provider(1, &[]));
    let sealed = cipher.encrypt(b"flow state", b"login_challenge")?;
    assert_eq!(
        cipher.decrypt(&sealed, b"consent_challenge").unwrap_err(),
        CipherError::AuthenticationFailed
    );
    Ok(())
}

#[test]
fn test_cipher_kinds_do_not_interoperate() -> Result<()> {
    let chacha = CipherKind::XChaCha20Poly1305.build(provider(1, &[]));
    let aes = CipherKind::Aes256Gcm.build(provider(1, &[]));
    let sealed = chacha.encrypt(b"payload", b"")?;
    assert!(aes.decrypt(&sealed, b"").is_err());
    Ok(())
}

#[test]
fn test_rotated_keys_decrypt_but_never_encrypt() -> Result<()> {
    let old = CipherKind::default().build(provider(1, &[]));
    let rotated = CipherKind::default().build(provider(2, &[1]));
    let fresh = CipherKind::default().build(provider(2, &[]));

    let sealed_by_old = old.encrypt(b"payload", b"aad")?;
    assert_eq!(rotated.decrypt(&sealed_by_old, b"aad")?, b"payload");

    let sealed_by_rotated = rotated.encrypt(b"payload", b"aad")?;
    assert_eq!(fresh.decrypt(&sealed_by_rotated, b"aad")?, b"payload");
    assert!(old.decrypt(&sealed_by_rotated, b"aad").is_err());
    Ok(())
}

#[test]
fn test_malformed_ciphertext_is_rejected() {
    let cipher = CipherKind::default().build(provider(1, &[]));
    assert_eq!(
        cipher.decrypt("*** not base64 ***", b"").unwrap_err(),
        CipherError::Malformed
    );
    assert_eq!(cipher.decrypt("AAAA", b"").unwrap_err(), CipherError::Malformed);
}

#[test]
fn test_missing_or_short_secrets_are_rejected() {
    let none = CipherKind::default().build(Arc::new(StaticSecretProvider::empty()));
    assert_eq!(none.encrypt(b"payload", b"").unwrap_err(), CipherError::NoKeys);

    let short = CipherKind::default().build(Arc::new(StaticSecretProvider::new(
        vec![1u8; 16],
        Vec::new(),
    )));
    assert_eq!(
        short.encrypt(b"payload", b"").unwrap_err(),
        CipherError::KeyTooShort { length: 16 }
    );
}

#[test]
fn test_secrets_sharing_a_prefix_derive_distinct_keys() -> Result<()> {
    let mut first = secret(1);
    first.extend_from_slice(b"-deployment-a");
    let mut second = secret(1);
    second.extend_from_slice(b"-deployment-b");

    let a = CipherKind::default().build(Arc::new(StaticSecretProvider::new(first, Vec::new())));
    let b = CipherKind::default().build(Arc::new(StaticSecretProvider::new(second, Vec::new())));
    let sealed = a.encrypt(b"payload", b"aad")?;
    assert_eq!(
        b.decrypt(&sealed, b"aad").unwrap_err(),
        CipherError::AuthenticationFailed
    );
    Ok(())
}

#[test]
fn test_short_rotated_secret_does_not_break_decryption() -> Result<()> {
    let old = CipherKind::default().build(provider(1, &[]));
    let sealed = old.encrypt(b"payload", b"aad")?;

    let rotated = CipherKind::default().build(Arc::new(StaticSecretProvider::new(
        secret(2),
        vec![vec![9u8; 8], secret(1)],
    )));
    assert_eq!(rotated.decrypt(&sealed, b"aad")?, b"payload");
    Ok(())
}

#[test]
fn test_hmac_generator_validates_own_tokens() -> Result<()> {
    let generator = HmacTokenGenerator::new(provider(3, &[]));
    let (token, signature) = generator.generate()?;
    assert_eq!(HmacTokenGenerator::signature(&token), signature);
    generator.validate(&token)?;

    let other = HmacTokenGenerator::new(provider(4, &[]));
    let err = other.validate(&token).unwrap_err();
    assert!(err.is(OAuth2ErrorKind::TokenSignatureMismatch));

    let err = generator.validate("no-separator").unwrap_err();
    assert!(err.is(OAuth2ErrorKind::InvalidTokenFormat));
    let err = generator.validate("a.b.c").unwrap_err();
    assert!(err.is(OAuth2ErrorKind::InvalidTokenFormat));
    Ok(())
}

#[test]
fn test_hmac_strategy_prefixes_tokens() -> Result<()> {
    let strategy = HmacStrategy::new(provider(3, &[]), Arc::new(OAuth2Config::default()));
    let request = request();

    let (access, access_signature) = strategy.generate_access_token(&request)?;
    let (refresh, refresh_signature) = strategy.generate_refresh_token(&request)?;
    let (code, code_signature) = strategy.generate_authorize_code(&request)?;
    assert!(access.starts_with("ory_at_"));
    assert!(refresh.starts_with("ory_rt_"));
    assert!(code.starts_with("ory_ac_"));

    assert_eq!(strategy.access_token_signature(&access), access_signature);
    assert_eq!(strategy.refresh_token_signature(&refresh), refresh_signature);
    assert_eq!(strategy.authorize_code_signature(&code), code_signature);

    strategy.validate_access_token(&request, &access)?;
    strategy.validate_refresh_token(&request, &refresh)?;
    strategy.validate_authorize_code(&request, &code)?;
    Ok(())
}

#[test]
fn test_hmac_strategy_without_prefixes() -> Result<()> {
    let config = OAuth2Config {
        token_prefixes: false,
        ..OAuth2Config::default()
    };
    let strategy = HmacStrategy::new(provider(3, &[]), Arc::new(config));
    let request = request();

    let (access, signature) = strategy.generate_access_token(&request)?;
    assert!(!access.starts_with("ory_"));
    assert!(access.ends_with(&signature));
    strategy.validate_access_token(&request, &access)?;
    Ok(())
}

#[test]
fn test_hmac_strategy_rejects_expired_tokens() -> Result<()> {
    let strategy = HmacStrategy::new(provider(3, &[]), Arc::new(OAuth2Config::default()));
    let mut request = request();
    let (access, _) = strategy.generate_access_token(&request)?;

    request.requested_at = Utc::now() - Duration::days(2);
    let err = strategy.validate_access_token(&request, &access).unwrap_err();
    assert!(err.is(OAuth2ErrorKind::TokenExpired));
    assert!(err.hint().unwrap().starts_with("Access token expired at"));
    Ok(())
}

#[test]
fn test_hmac_strategy_accepts_rotated_signing_key() -> Result<()> {
    let config = Arc::new(OAuth2Config::default());
    let before = HmacStrategy::new(provider(3, &[]), Arc::clone(&config));
    let after = HmacStrategy::new(provider(5, &[3]), Arc::clone(&config));
    let request = request();

    let (refresh, _) = before.generate_refresh_token(&request)?;
    after.validate_refresh_token(&request, &refresh)?;

    let (refresh, _) = after.generate_refresh_token(&request)?;
    let err = before.validate_refresh_token(&request, &refresh).unwrap_err();
    assert!(err.is(OAuth2ErrorKind::TokenSignatureMismatch));
    Ok(())
}
