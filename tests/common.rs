// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Builds a provider wired to the in-memory store with every grant handler registered
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::new_without_default
)]
//! Shared test utilities for `tessera`

use std::env;
use std::sync::{Arc, Once};

use anyhow::Result;
use tessera::config::{FlowConfig, OAuth2Config};
use tessera::context::RequestContext;
use tessera::crypto::{SecretProvider, StaticSecretProvider};
use tessera::errors::OAuth2Error;
use tessera::flow::FlowCodec;
use tessera::models::{Arguments, Client};
use tessera::oauth2_server::storage::Transactional;
use tessera::oauth2_server::{
    new_authorize_request, AccessRequest, AccessResponse, AuthorizeCodeHandler,
    AuthorizeResponse, ClientCredentialsHandler, ConfiguredStrategy, CoreStrategy, CoreValidator,
    DefaultSession, Form, ImplicitHandler, OAuth2Provider, PkceHandler, RefreshTokenHandler,
    ResourceOwnerPasswordHandler, TokenRevocationHandler, TransactionCoordinator,
};
use tessera::storage::MemoryStore;

static INIT_LOGGER: Once = Once::new();

/// Redirect URI registered for the test web client
pub const REDIRECT_URI: &str = "https://app.example/callback";

/// Audience registered for the test web client
pub const API_AUDIENCE: &str = "https://api.example";

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// 32-byte test secret filled with `byte`
pub fn secret(byte: u8) -> Vec<u8> {
    vec![byte; 32]
}

/// Secret provider with one primary secret
pub fn secrets() -> Arc<dyn SecretProvider> {
    Arc::new(StaticSecretProvider::new(secret(7), Vec::new()))
}

/// Confidential client allowed to use every browser and back-channel grant
pub fn web_client() -> Client {
    let mut client = Client::new("web-app");
    client.redirect_uris = vec![REDIRECT_URI.to_owned()];
    client.grant_types =
        Arguments::from_space_delimited("authorization_code refresh_token implicit password");
    client.response_types = ["code", "token"].into_iter().collect();
    client.scopes = Arguments::from_space_delimited("openid offline read write");
    client.audience = Arguments::from_space_delimited(API_AUDIENCE);
    client
}

/// Confidential machine client for the client credentials grant
pub fn service_client() -> Client {
    let mut client = Client::new("service");
    client.grant_types = Arguments::from_space_delimited("client_credentials");
    client.scopes = Arguments::from_space_delimited("read write");
    client.audience = Arguments::from_space_delimited(API_AUDIENCE);
    client
}

/// Provider wired to an in-memory store
pub struct Harness {
    pub config: Arc<OAuth2Config>,
    pub store: Arc<MemoryStore>,
    pub strategy: Arc<dyn CoreStrategy>,
    pub provider: OAuth2Provider,
    pub ctx: RequestContext,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(OAuth2Config::default())
    }

    pub fn with_config(config: OAuth2Config) -> Self {
        init_test_logging();
        let config = Arc::new(config);
        let store = Arc::new(MemoryStore::new());
        let strategy = ConfiguredStrategy::from_config(secrets(), Arc::clone(&config), None)
            .expect("opaque strategy needs no signing key")
            .core();
        let backend: Arc<dyn Transactional> = store.clone();
        let transactions = TransactionCoordinator::new(backend);

        let authorize_code = Arc::new(AuthorizeCodeHandler::new(
            Arc::clone(&strategy),
            Arc::clone(&store),
            transactions.clone(),
            Arc::clone(&config),
        ));
        let pkce = Arc::new(PkceHandler::new(
            Arc::clone(&strategy),
            Arc::clone(&store),
            Arc::clone(&config),
        ));

        let provider = OAuth2Provider::new(Arc::clone(&config))
            .with_authorize_handler(authorize_code.clone())
            .with_authorize_handler(Arc::new(ImplicitHandler::new(
                Arc::clone(&strategy),
                Arc::clone(&store),
                Arc::clone(&config),
            )))
            .with_authorize_handler(pkce.clone())
            .with_token_handler(authorize_code)
            .with_token_handler(pkce)
            .with_token_handler(Arc::new(RefreshTokenHandler::new(
                Arc::clone(&strategy),
                Arc::clone(&store),
                transactions.clone(),
                Arc::clone(&config),
            )))
            .with_token_handler(Arc::new(ClientCredentialsHandler::new(
                Arc::clone(&strategy),
                Arc::clone(&store),
                transactions.clone(),
                Arc::clone(&config),
            )))
            .with_token_handler(Arc::new(ResourceOwnerPasswordHandler::new(
                Arc::clone(&strategy),
                Arc::clone(&store),
                transactions.clone(),
                Arc::clone(&config),
            )))
            .with_introspector(Arc::new(CoreValidator::new(
                Arc::clone(&strategy),
                Arc::clone(&store),
                Arc::clone(&config),
            )))
            .with_revocation_handler(Arc::new(TokenRevocationHandler::new(
                Arc::clone(&strategy),
                Arc::clone(&store),
                transactions,
            )));

        Self {
            config,
            store,
            strategy,
            provider,
            ctx: RequestContext::new(),
        }
    }

    /// Run the authorization endpoint for `client` as if `subject` consented to `granted`
    pub async fn authorize(
        &self,
        client: &Arc<Client>,
        form: Form,
        subject: &str,
        granted: &str,
    ) -> Result<AuthorizeResponse> {
        let mut request = new_authorize_request(&self.config, Arc::clone(client), form)?;
        request.request.session = Box::new(DefaultSession::new(subject));
        for scope in granted.split_whitespace() {
            request.request.grant_scope(scope);
        }
        Ok(self
            .provider
            .new_authorize_response(&self.ctx, &mut request)
            .await?)
    }

    /// Issue an authorization code for `client` with the given granted scopes
    pub async fn issue_code(&self, client: &Arc<Client>, granted: &str) -> Result<String> {
        let form = Form::new()
            .with("response_type", "code")
            .with("redirect_uri", REDIRECT_URI)
            .with("state", "state-0123456789")
            .with("scope", granted);
        let response = self.authorize(client, form, "alice", granted).await?;
        Ok(response.code().unwrap().to_owned())
    }

    /// Exchange a token endpoint form
    pub async fn token(&self, client: &Arc<Client>, form: Form) -> Result<AccessResponse, OAuth2Error> {
        let mut request = AccessRequest::new(Arc::clone(client), form);
        self.provider.exchange(&self.ctx, &mut request).await
    }

    /// Redeem `code` at the token endpoint
    pub async fn exchange_code(
        &self,
        client: &Arc<Client>,
        code: &str,
    ) -> Result<AccessResponse, OAuth2Error> {
        self.token(
            client,
            Form::new()
                .with("grant_type", "authorization_code")
                .with("code", code)
                .with("redirect_uri", REDIRECT_URI),
        )
        .await
    }

    /// True if `token` introspects as active without scope requirements
    pub async fn is_active(&self, token: &str) -> bool {
        self.provider
            .introspect_or_inactive(
                &self.ctx,
                token,
                None,
                &Arguments::new(),
                Box::new(DefaultSession::default()),
            )
            .await
            .active
    }

    /// Present `refresh_token` at the token endpoint
    pub async fn refresh(
        &self,
        client: &Arc<Client>,
        refresh_token: &str,
    ) -> Result<AccessResponse, OAuth2Error> {
        self.token(
            client,
            Form::new()
                .with("grant_type", "refresh_token")
                .with("refresh_token", refresh_token),
        )
        .await
    }
}

/// Flow configuration bound to `network_id`
pub fn flow_config(network_id: &str) -> FlowConfig {
    FlowConfig {
        network_id: network_id.to_owned(),
        ..FlowConfig::default()
    }
}

/// Flow codec over the configured cipher, recording redeemed verifiers in `store`
pub fn flow_codec(config: FlowConfig, store: Arc<MemoryStore>) -> FlowCodec {
    let cipher = config.cipher.build(secrets());
    FlowCodec::new(cipher, Arc::new(config), store)
}
