// ABOUTME: Read-only view of a registered OAuth 2.0 client used by grant handlers
// ABOUTME: Carries grant/response types, scopes, audience, redirect URIs and lifespan overrides
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::{Arguments, GrantType, TokenType};

/// Lifespan override for one grant type and token type combination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifespanOverride {
    /// Grant the token is issued through
    pub grant_type: GrantType,
    /// Kind of token the lifespan applies to
    pub token_type: TokenType,
    /// Lifespan in seconds
    pub seconds: i64,
}

/// Per-client token lifespans, falling back to server defaults when unset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientLifespans(Vec<LifespanOverride>);

impl ClientLifespans {
    /// Set or replace the lifespan for a grant and token type
    #[must_use]
    pub fn with(mut self, grant_type: GrantType, token_type: TokenType, lifespan: Duration) -> Self {
        self.0
            .retain(|o| !(o.grant_type == grant_type && o.token_type == token_type));
        self.0.push(LifespanOverride {
            grant_type,
            token_type,
            seconds: lifespan.num_seconds(),
        });
        self
    }

    /// Override for a grant and token type, if one is configured
    #[must_use]
    pub fn get(&self, grant_type: GrantType, token_type: TokenType) -> Option<Duration> {
        self.0
            .iter()
            .find(|o| o.grant_type == grant_type && o.token_type == token_type)
            .map(|o| Duration::seconds(o.seconds))
    }
}

/// Registered OAuth 2.0 client as seen by the authorization core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// Client identifier
    pub id: String,
    /// Registered redirect URIs
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    /// Grant types the client may use
    #[serde(default)]
    pub grant_types: Arguments,
    /// Response types the client may request
    #[serde(default)]
    pub response_types: Arguments,
    /// Scopes the client may request
    #[serde(default)]
    pub scopes: Arguments,
    /// Audiences the client may request
    #[serde(default)]
    pub audience: Arguments,
    /// Public clients cannot keep a secret
    #[serde(default)]
    pub public: bool,
    /// Per-grant lifespan overrides
    #[serde(default)]
    pub lifespans: ClientLifespans,
}

impl Client {
    /// Create a confidential client with no permissions
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            redirect_uris: Vec::new(),
            grant_types: Arguments::new(),
            response_types: Arguments::new(),
            scopes: Arguments::new(),
            audience: Arguments::new(),
            public: false,
            lifespans: ClientLifespans::default(),
        }
    }

    /// True if the client registered `grant_type`
    #[must_use]
    pub fn has_grant_type(&self, grant_type: GrantType) -> bool {
        self.grant_types.has(grant_type.as_str())
    }

    /// True if the client registered `response_type`
    #[must_use]
    pub fn has_response_type(&self, response_type: &str) -> bool {
        self.response_types.has(response_type)
    }

    /// Client lifespan for the grant and token type, or `fallback`
    #[must_use]
    pub fn effective_lifespan(
        &self,
        grant_type: GrantType,
        token_type: TokenType,
        fallback: Duration,
    ) -> Duration {
        self.lifespans
            .get(grant_type, token_type)
            .unwrap_or(fallback)
    }
}
