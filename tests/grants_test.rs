// ABOUTME: Integration tests for the client credentials, resource owner password and implicit grants
// ABOUTME: Exercises client eligibility, credential checks and the tokens each grant issues
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use tessera::config::OAuth2Config;
use tessera::errors::{OAuth2Error, OAuth2ErrorKind};
use tessera::models::{Arguments, TokenType};
use tessera::oauth2_server::{DefaultSession, Form};

use common::{service_client, web_client, Harness, API_AUDIENCE};

fn client_credentials(scope: &str) -> Form {
    Form::new()
        .with("grant_type", "client_credentials")
        .with("scope", scope)
}

fn password_form(username: &str, password: &str, scope: &str) -> Form {
    Form::new()
        .with("grant_type", "password")
        .with("username", username)
        .with("password", password)
        .with("scope", scope)
}

#[tokio::test]
async fn test_client_credentials_issues_access_token_only() -> Result<()> {
    let h = Harness::new();
    let client = Arc::new(service_client());

    let response = h
        .token(&client, client_credentials("read").with("audience", API_AUDIENCE))
        .await?;
    assert!(response.access_token.starts_with("ory_at_"));
    assert!(response.refresh_token.is_none());
    assert_eq!(response.scope.as_deref(), Some("read"));

    let introspected = h
        .provider
        .introspect_token(
            &h.ctx,
            &response.access_token,
            Some(TokenType::AccessToken),
            &Arguments::from_space_delimited("read"),
            Box::new(DefaultSession::default()),
        )
        .await?;
    let body = introspected.to_json();
    assert_eq!(body["client_id"], json!("service"));
    assert_eq!(body["aud"], json!([API_AUDIENCE]));
    Ok(())
}

#[tokio::test]
async fn test_client_credentials_rejects_public_client() {
    let h = Harness::new();
    let mut registration = service_client();
    registration.public = true;
    let client = Arc::new(registration);

    let err = h.token(&client, client_credentials("read")).await.unwrap_err();
    assert!(err.is(OAuth2ErrorKind::UnauthorizedClient));
}

#[tokio::test]
async fn test_client_credentials_requires_registered_grant() {
    let h = Harness::new();
    let client = Arc::new(web_client());

    let err = h.token(&client, client_credentials("read")).await.unwrap_err();
    assert!(err.is(OAuth2ErrorKind::UnauthorizedClient));
}

#[tokio::test]
async fn test_client_credentials_rejects_unregistered_scope() {
    let h = Harness::new();
    let client = Arc::new(service_client());

    let err = h.token(&client, client_credentials("admin")).await.unwrap_err();
    assert!(err.is(OAuth2ErrorKind::InvalidScope));
}

#[tokio::test]
async fn test_client_credentials_rejects_unlisted_audience() {
    let h = Harness::new();
    let client = Arc::new(service_client());

    let err = h
        .token(
            &client,
            client_credentials("read").with("audience", "https://evil.example"),
        )
        .await
        .unwrap_err();
    assert!(err.is(OAuth2ErrorKind::InvalidRequest));
}

#[tokio::test]
async fn test_unknown_grant_type_is_unsupported() {
    let h = Harness::new();
    let client = Arc::new(web_client());

    let err = h
        .token(&client, Form::new().with("grant_type", "urn:example:custom"))
        .await
        .unwrap_err();
    assert!(err.is(OAuth2ErrorKind::UnsupportedGrantType));
}

#[tokio::test]
async fn test_password_grant_issues_refreshable_tokens() -> Result<()> {
    let h = Harness::new();
    h.store.add_user("alice@example.com", "correct horse", "user-42").await;
    let client = Arc::new(web_client());

    let response = h
        .token(&client, password_form("alice@example.com", "correct horse", "openid offline"))
        .await?;
    let refresh_token = response.refresh_token.clone().unwrap();
    assert!(refresh_token.starts_with("ory_rt_"));

    let introspected = h
        .provider
        .introspect_token(
            &h.ctx,
            &response.access_token,
            None,
            &Arguments::new(),
            Box::new(DefaultSession::default()),
        )
        .await?;
    assert_eq!(introspected.to_json()["sub"], json!("user-42"));

    let rotated = h.refresh(&client, &refresh_token).await?;
    assert!(rotated.refresh_token.is_some());
    Ok(())
}

#[tokio::test]
async fn test_password_grant_without_offline_has_no_refresh_token() -> Result<()> {
    let h = Harness::new();
    h.store.add_user("alice@example.com", "correct horse", "user-42").await;
    let client = Arc::new(web_client());

    let response = h
        .token(&client, password_form("alice@example.com", "correct horse", "read"))
        .await?;
    assert!(response.refresh_token.is_none());
    Ok(())
}

#[tokio::test]
async fn test_password_grant_rejects_bad_credentials() {
    let h = Harness::new();
    h.store.add_user("alice@example.com", "correct horse", "user-42").await;
    let client = Arc::new(web_client());

    let err = h
        .token(&client, password_form("alice@example.com", "battery staple", "read"))
        .await
        .unwrap_err();
    assert!(err.is(OAuth2ErrorKind::InvalidGrant));

    let err = h
        .token(&client, password_form("mallory@example.com", "correct horse", "read"))
        .await
        .unwrap_err();
    assert!(err.is(OAuth2ErrorKind::InvalidGrant));
}

#[tokio::test]
async fn test_password_grant_requires_password() {
    let h = Harness::new();
    let client = Arc::new(web_client());

    let err = h
        .token(
            &client,
            Form::new()
                .with("grant_type", "password")
                .with("username", "alice@example.com"),
        )
        .await
        .unwrap_err();
    assert!(err.is(OAuth2ErrorKind::InvalidRequest));
}

#[tokio::test]
async fn test_implicit_returns_token_in_fragment() -> Result<()> {
    let h = Harness::new();
    let client = Arc::new(web_client());
    let form = Form::new()
        .with("response_type", "token")
        .with("state", "state-0123456789")
        .with("scope", "read");

    let response = h.authorize(&client, form, "alice", "read").await?;
    assert!(response.query.is_empty());
    let token = response.fragment.get("access_token").unwrap();
    assert!(token.starts_with("ory_at_"));
    assert_eq!(response.fragment.get("token_type").map(String::as_str), Some("bearer"));
    assert_eq!(
        response.fragment.get("state").map(String::as_str),
        Some("state-0123456789")
    );
    assert!(!response.fragment.contains_key("refresh_token"));
    assert!(h.is_active(token).await);
    Ok(())
}

#[tokio::test]
async fn test_implicit_requires_registered_grant() {
    let h = Harness::new();
    let mut registration = web_client();
    registration.grant_types = Arguments::from_space_delimited("authorization_code");
    let client = Arc::new(registration);
    let form = Form::new()
        .with("response_type", "token")
        .with("state", "state-0123456789");

    let err = h
        .authorize(&client, form, "alice", "")
        .await
        .unwrap_err()
        .downcast::<OAuth2Error>()
        .unwrap();
    assert!(err.is(OAuth2ErrorKind::UnauthorizedClient));
}

#[test]
fn test_error_debug_follows_configuration() {
    let error = OAuth2Error::server_error("refresh token store unreachable");

    let hidden = Harness::new().provider.error_response(&error);
    assert_eq!(hidden.error, "server_error");
    assert_eq!(hidden.status_code, 500);
    assert!(hidden.error_debug.is_none());

    let shown = Harness::with_config(OAuth2Config {
        expose_debug: true,
        ..OAuth2Config::default()
    })
    .provider
    .error_response(&error);
    assert_eq!(
        shown.error_debug.as_deref(),
        Some("refresh token store unreachable")
    );
}
