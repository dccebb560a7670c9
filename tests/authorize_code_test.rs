// ABOUTME: Integration tests for the authorization code grant and its PKCE extension
// ABOUTME: Covers redirect binding, client binding, code reuse compensation and verifier checks
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use anyhow::Result;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Duration;
use sha2::{Digest, Sha256};
use tessera::config::OAuth2Config;
use tessera::errors::{OAuth2Error, OAuth2ErrorKind};
use tessera::models::{Arguments, TokenType};
use tessera::oauth2_server::{new_authorize_request, DefaultSession, Form};

use common::{web_client, Harness, REDIRECT_URI};

const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk-tessera";

fn s256(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn pkce_form(challenge: &str, method: &str) -> Form {
    Form::new()
        .with("response_type", "code")
        .with("redirect_uri", REDIRECT_URI)
        .with("state", "state-0123456789")
        .with("scope", "openid offline")
        .with("code_challenge", challenge)
        .with("code_challenge_method", method)
}

#[tokio::test]
async fn test_code_exchange_issues_access_and_refresh_tokens() -> Result<()> {
    let h = Harness::new();
    let client = Arc::new(web_client());

    let code = h.issue_code(&client, "openid offline read").await?;
    assert!(code.starts_with("ory_ac_"));

    let response = h.exchange_code(&client, &code).await?;
    assert!(response.access_token.starts_with("ory_at_"));
    assert!(response.refresh_token.as_deref().unwrap().starts_with("ory_rt_"));
    assert_eq!(response.token_type, "bearer");
    assert_eq!(response.scope.as_deref(), Some("openid offline read"));
    let expires_in = response.expires_in.unwrap();
    assert!(expires_in > 3500 && expires_in <= 3600);
    Ok(())
}

#[tokio::test]
async fn test_authorize_response_echoes_state() -> Result<()> {
    let h = Harness::new();
    let client = Arc::new(web_client());
    let form = Form::new()
        .with("response_type", "code")
        .with("state", "state-0123456789")
        .with("scope", "openid");

    let response = h.authorize(&client, form, "alice", "openid").await?;
    assert_eq!(response.query.get("state").map(String::as_str), Some("state-0123456789"));
    assert_eq!(response.query.get("scope").map(String::as_str), Some("openid"));
    assert!(response.fragment.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_no_refresh_token_without_offline_scope() -> Result<()> {
    let h = Harness::new();
    let client = Arc::new(web_client());

    let code = h.issue_code(&client, "openid read").await?;
    let response = h.exchange_code(&client, &code).await?;
    assert!(response.refresh_token.is_none());
    Ok(())
}

#[tokio::test]
async fn test_no_refresh_token_without_refresh_grant() -> Result<()> {
    let h = Harness::new();
    let mut registration = web_client();
    registration.grant_types = Arguments::from_space_delimited("authorization_code");
    let client = Arc::new(registration);

    let code = h.issue_code(&client, "openid offline").await?;
    let response = h.exchange_code(&client, &code).await?;
    assert!(response.refresh_token.is_none());
    Ok(())
}

#[tokio::test]
async fn test_redirect_uri_must_match_authorization() -> Result<()> {
    let h = Harness::new();
    let client = Arc::new(web_client());
    let code = h.issue_code(&client, "openid").await?;

    let err = h
        .token(
            &client,
            Form::new()
                .with("grant_type", "authorization_code")
                .with("code", code.as_str())
                .with("redirect_uri", "https://app.example/elsewhere"),
        )
        .await
        .unwrap_err();
    assert!(err.is(OAuth2ErrorKind::InvalidGrant));
    assert!(err.hint().unwrap().contains("redirect_uri"));

    // The code survives a rejected exchange
    h.exchange_code(&client, &code).await?;
    Ok(())
}

#[tokio::test]
async fn test_code_bound_to_client() -> Result<()> {
    let h = Harness::new();
    let client = Arc::new(web_client());
    let mut other = web_client();
    other.id = "other-app".into();
    let other = Arc::new(other);

    let code = h.issue_code(&client, "openid").await?;
    let err = h.exchange_code(&other, &code).await.unwrap_err();
    assert!(err.is(OAuth2ErrorKind::InvalidGrant));
    Ok(())
}

#[tokio::test]
async fn test_unknown_code_is_invalid_grant() {
    let h = Harness::new();
    let client = Arc::new(web_client());
    let err = h
        .exchange_code(&client, "ory_ac_bm90LWEtY29kZQ.c2lnbmF0dXJl")
        .await
        .unwrap_err();
    assert!(err.is(OAuth2ErrorKind::InvalidGrant));
}

#[tokio::test]
async fn test_reused_code_revokes_issued_tokens() -> Result<()> {
    let h = Harness::new();
    let client = Arc::new(web_client());
    let code = h.issue_code(&client, "openid offline").await?;
    let first = h.exchange_code(&client, &code).await?;

    let err = h.exchange_code(&client, &code).await.unwrap_err();
    assert!(err.is(OAuth2ErrorKind::InvalidGrant));
    assert_eq!(err.hint(), Some("The authorization code has already been used."));

    let scopes = Arguments::new();
    let access = h
        .provider
        .introspect_or_inactive(
            &h.ctx,
            &first.access_token,
            Some(TokenType::AccessToken),
            &scopes,
            Box::new(DefaultSession::default()),
        )
        .await;
    assert!(!access.active);

    let refresh = h
        .provider
        .introspect_or_inactive(
            &h.ctx,
            first.refresh_token.as_deref().unwrap(),
            Some(TokenType::RefreshToken),
            &scopes,
            Box::new(DefaultSession::default()),
        )
        .await;
    assert!(!refresh.active);
    Ok(())
}

#[tokio::test]
async fn test_expired_code_is_invalid_grant() -> Result<()> {
    let h = Harness::with_config(OAuth2Config {
        authorize_code_lifespan: Duration::seconds(-5),
        ..OAuth2Config::default()
    });
    let client = Arc::new(web_client());
    let code = h.issue_code(&client, "openid").await?;

    let err = h.exchange_code(&client, &code).await.unwrap_err();
    assert!(err.is(OAuth2ErrorKind::InvalidGrant));
    Ok(())
}

#[tokio::test]
async fn test_unregistered_scope_rejected_at_authorization() {
    let h = Harness::new();
    let client = Arc::new(web_client());
    let form = Form::new()
        .with("response_type", "code")
        .with("state", "state-0123456789")
        .with("scope", "admin");

    let err = h.authorize(&client, form, "alice", "").await.unwrap_err();
    let err = err.downcast::<OAuth2Error>().unwrap();
    assert!(err.is(OAuth2ErrorKind::InvalidScope));
}

#[tokio::test]
async fn test_hybrid_response_type_not_registered() {
    let h = Harness::new();
    let client = Arc::new(web_client());
    let form = Form::new()
        .with("response_type", "code token")
        .with("state", "state-0123456789");

    let err = new_authorize_request(&h.config, client, form).unwrap_err();
    assert!(err.is(OAuth2ErrorKind::UnsupportedResponseType));
}

#[tokio::test]
async fn test_pkce_s256_roundtrip() -> Result<()> {
    let h = Harness::new();
    let client = Arc::new(web_client());
    let response = h
        .authorize(&client, pkce_form(&s256(VERIFIER), "S256"), "alice", "openid offline")
        .await?;
    let code = response.code().unwrap().to_owned();

    let tokens = h
        .token(
            &client,
            Form::new()
                .with("grant_type", "authorization_code")
                .with("code", code.as_str())
                .with("redirect_uri", REDIRECT_URI)
                .with("code_verifier", VERIFIER),
        )
        .await?;
    assert!(tokens.access_token.starts_with("ory_at_"));
    Ok(())
}

#[tokio::test]
async fn test_pkce_wrong_verifier_rejected() -> Result<()> {
    let h = Harness::new();
    let client = Arc::new(web_client());
    let response = h
        .authorize(&client, pkce_form(&s256(VERIFIER), "S256"), "alice", "openid")
        .await?;
    let code = response.code().unwrap().to_owned();

    let err = h
        .token(
            &client,
            Form::new()
                .with("grant_type", "authorization_code")
                .with("code", code.as_str())
                .with("redirect_uri", REDIRECT_URI)
                .with("code_verifier", "x".repeat(64)),
        )
        .await
        .unwrap_err();
    assert!(err.is(OAuth2ErrorKind::InvalidGrant));
    assert_eq!(
        err.hint(),
        Some("The PKCE code challenge did not match the code verifier.")
    );
    Ok(())
}

#[tokio::test]
async fn test_pkce_missing_verifier_rejected() -> Result<()> {
    let h = Harness::new();
    let client = Arc::new(web_client());
    let response = h
        .authorize(&client, pkce_form(&s256(VERIFIER), "S256"), "alice", "openid")
        .await?;
    let code = response.code().unwrap().to_owned();

    let err = h.exchange_code(&client, &code).await.unwrap_err();
    assert!(err.is(OAuth2ErrorKind::InvalidGrant));
    Ok(())
}

#[tokio::test]
async fn test_pkce_plain_requires_opt_in() -> Result<()> {
    let h = Harness::new();
    let client = Arc::new(web_client());
    let err = h
        .authorize(&client, pkce_form(VERIFIER, "plain"), "alice", "openid")
        .await
        .unwrap_err()
        .downcast::<OAuth2Error>()
        .unwrap();
    assert!(err.is(OAuth2ErrorKind::InvalidRequest));

    let h = Harness::with_config(OAuth2Config {
        enable_pkce_plain: true,
        ..OAuth2Config::default()
    });
    let response = h
        .authorize(&client, pkce_form(VERIFIER, "plain"), "alice", "openid")
        .await?;
    let code = response.code().unwrap().to_owned();
    h.token(
        &client,
        Form::new()
            .with("grant_type", "authorization_code")
            .with("code", code.as_str())
            .with("redirect_uri", REDIRECT_URI)
            .with("code_verifier", VERIFIER),
    )
    .await?;
    Ok(())
}

#[tokio::test]
async fn test_enforced_pkce_requires_challenge() {
    let h = Harness::with_config(OAuth2Config {
        enforce_pkce: true,
        ..OAuth2Config::default()
    });
    let client = Arc::new(web_client());
    let form = Form::new()
        .with("response_type", "code")
        .with("state", "state-0123456789")
        .with("scope", "openid");

    let err = h
        .authorize(&client, form, "alice", "openid")
        .await
        .unwrap_err()
        .downcast::<OAuth2Error>()
        .unwrap();
    assert!(err.is(OAuth2ErrorKind::InvalidRequest));
}
