// ABOUTME: PKCE (RFC 7636) challenge capture at authorization and verifier check at code exchange
// ABOUTME: Challenge sessions are keyed by the authorization code signature and deleted on use
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use super::{storage_fault, AuthorizeEndpointHandler, TokenEndpointHandler};
use crate::config::OAuth2Config;
use crate::constants::{params, pkce};
use crate::context::RequestContext;
use crate::errors::{OAuth2Error, StorageError};
use crate::models::{Client, GrantType};
use crate::oauth2_server::request::{AccessRequest, AuthorizeRequest};
use crate::oauth2_server::response::{AccessResponse, AuthorizeResponse};
use crate::oauth2_server::storage::PkceRequestStorage;
use crate::oauth2_server::strategy::CoreStrategy;

/// Captures code challenges and verifies code verifiers
pub struct PkceHandler<S> {
    strategy: Arc<dyn CoreStrategy>,
    storage: Arc<S>,
    config: Arc<OAuth2Config>,
}

impl<S> PkceHandler<S>
where
    S: PkceRequestStorage,
{
    /// Create a handler storing challenges in `storage`
    #[must_use]
    pub fn new(strategy: Arc<dyn CoreStrategy>, storage: Arc<S>, config: Arc<OAuth2Config>) -> Self {
        Self {
            strategy,
            storage,
            config,
        }
    }

    fn enforced_for(&self, client: &Client) -> bool {
        self.config.enforce_pkce || (self.config.enforce_pkce_for_public_clients && client.public)
    }

    fn missing_challenge(&self, client: &Client) -> OAuth2Error {
        if client.public && !self.config.enforce_pkce {
            OAuth2Error::invalid_request(
                "This client must include a code_challenge when performing the authorize code flow, but it is missing.",
            )
        } else {
            OAuth2Error::invalid_request(
                "Clients must include a code_challenge when performing the authorize code flow, but it is missing.",
            )
        }
    }

    /// Check the challenge method offered at the authorization endpoint
    fn validate_method(&self, method: &str) -> Result<(), OAuth2Error> {
        match method {
            pkce::METHOD_S256 => Ok(()),
            pkce::METHOD_PLAIN | "" if self.config.enable_pkce_plain => Ok(()),
            pkce::METHOD_PLAIN | "" => Err(OAuth2Error::invalid_request(
                "Clients must use code_challenge_method=S256, plain is not allowed.",
            )),
            other => Err(OAuth2Error::invalid_request(format!(
                "The code_challenge_method '{other}' is not supported, use S256 instead."
            ))),
        }
    }

    fn verify(&self, challenge: &str, method: &str, verifier: &str) -> Result<(), OAuth2Error> {
        if verifier.len() < pkce::VERIFIER_MIN_LEN || verifier.len() > pkce::VERIFIER_MAX_LEN {
            return Err(OAuth2Error::invalid_grant(format!(
                "The PKCE code verifier must be between {} and {} characters.",
                pkce::VERIFIER_MIN_LEN,
                pkce::VERIFIER_MAX_LEN
            )));
        }

        // RFC 7636 unreserved characters
        if !verifier
            .chars()
            .all(|c| matches!(c, 'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '.' | '_' | '~'))
        {
            return Err(OAuth2Error::invalid_grant(
                "The PKCE code verifier contains invalid characters, only [A-Z], [a-z], [0-9], -, ., _ and ~ are allowed.",
            ));
        }

        let computed = match method {
            pkce::METHOD_S256 => general_purpose::URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes())),
            pkce::METHOD_PLAIN | "" if self.config.enable_pkce_plain => verifier.to_owned(),
            _ => {
                return Err(OAuth2Error::invalid_grant(
                    "The PKCE code challenge method stored with this code is not allowed.",
                ))
            }
        };

        if bool::from(computed.as_bytes().ct_eq(challenge.as_bytes())) {
            Ok(())
        } else {
            Err(OAuth2Error::invalid_grant(
                "The PKCE code challenge did not match the code verifier.",
            ))
        }
    }
}

#[async_trait]
impl<S> AuthorizeEndpointHandler for PkceHandler<S>
where
    S: PkceRequestStorage + 'static,
{
    async fn handle_authorize_endpoint_request(
        &self,
        ctx: &RequestContext,
        request: &mut AuthorizeRequest,
        response: &mut AuthorizeResponse,
    ) -> Result<(), OAuth2Error> {
        if !request.response_types.has("code") {
            return Ok(());
        }

        let form = &request.request.form;
        let challenge = form.get_or_empty(params::CODE_CHALLENGE);
        let method = form.get_or_empty(params::CODE_CHALLENGE_METHOD);

        if challenge.is_empty() {
            if self.enforced_for(&request.request.client) {
                return Err(self.missing_challenge(&request.request.client));
            }
            return Ok(());
        }
        self.validate_method(method)?;

        let Some(code) = response.code() else {
            return Err(OAuth2Error::server_error(
                "the PKCE handler ran before an authorization code was issued",
            ));
        };
        let signature = self.strategy.authorize_code_signature(code);
        let session = request
            .request
            .sanitize(&[params::CODE_CHALLENGE, params::CODE_CHALLENGE_METHOD]);
        self.storage
            .create_pkce_request_session(ctx, &signature, &session)
            .await
            .map_err(storage_fault)?;

        debug!(client_id = %request.request.client.id, "PKCE challenge stored");
        Ok(())
    }
}

#[async_trait]
impl<S> TokenEndpointHandler for PkceHandler<S>
where
    S: PkceRequestStorage + 'static,
{
    fn can_handle_token_endpoint_request(&self, request: &AccessRequest) -> bool {
        request.is_grant_type(GrantType::AuthorizationCode.as_str())
    }

    async fn handle_token_endpoint_request(
        &self,
        ctx: &RequestContext,
        request: &mut AccessRequest,
    ) -> Result<(), OAuth2Error> {
        if !self.can_handle_token_endpoint_request(request) {
            return Err(OAuth2Error::unknown_request());
        }

        let client = &request.request.client;
        let form = &request.request.form;
        let verifier = form.get_or_empty(params::CODE_VERIFIER);
        let signature = self
            .strategy
            .authorize_code_signature(form.get_or_empty(params::CODE));

        let stored = match self.storage.get_pkce_request_session(ctx, &signature).await {
            Ok(stored) => stored,
            Err(StorageError::NotFound) => {
                if !verifier.is_empty() {
                    return Err(OAuth2Error::invalid_grant(
                        "A code_verifier was provided but no code_challenge was issued.",
                    ));
                }
                if self.enforced_for(client) {
                    return Err(OAuth2Error::invalid_grant(
                        "Clients must include a code_challenge when performing the authorize code flow, but it is missing.",
                    ));
                }
                return Ok(());
            }
            Err(e) => return Err(storage_fault(e)),
        };

        self.storage
            .delete_pkce_request_session(ctx, &signature)
            .await
            .map_err(storage_fault)?;

        let challenge = stored.form.get_or_empty(params::CODE_CHALLENGE);
        let method = stored.form.get_or_empty(params::CODE_CHALLENGE_METHOD);
        if verifier.is_empty() {
            return Err(OAuth2Error::invalid_grant(
                "The PKCE code verifier is missing but a code challenge was issued.",
            ));
        }

        if let Err(e) = self.verify(challenge, method, verifier) {
            warn!(client_id = %client.id, "PKCE verification failed");
            return Err(e);
        }
        Ok(())
    }

    async fn populate_token_endpoint_response(
        &self,
        _ctx: &RequestContext,
        _request: &AccessRequest,
        _response: &mut AccessResponse,
    ) -> Result<(), OAuth2Error> {
        Err(OAuth2Error::unknown_request())
    }
}
