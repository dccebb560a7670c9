// ABOUTME: Token endpoint and authorization endpoint response models
// ABOUTME: AccessResponse renders the RFC 6749 JSON body, AuthorizeResponse the redirect parameters
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::tokens::BEARER;

/// Token endpoint response (RFC 6749 section 5.1)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessResponse {
    /// Issued access token
    pub access_token: String,
    /// Always `bearer`
    pub token_type: String,
    /// Access token lifetime in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    /// Issued refresh token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Granted scopes, space delimited
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Additional response members
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl AccessResponse {
    /// Empty bearer response
    #[must_use]
    pub fn new() -> Self {
        Self {
            token_type: BEARER.to_owned(),
            ..Self::default()
        }
    }
}

/// Authorization endpoint response parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizeResponse {
    /// Parameters returned in the redirect query
    pub query: BTreeMap<String, String>,
    /// Parameters returned in the redirect fragment
    pub fragment: BTreeMap<String, String>,
}

impl AuthorizeResponse {
    /// Empty response
    #[must_use]
    pub const fn new() -> Self {
        Self {
            query: BTreeMap::new(),
            fragment: BTreeMap::new(),
        }
    }

    /// Add a query parameter
    pub fn add_query(&mut self, key: &str, value: impl Into<String>) {
        self.query.insert(key.to_owned(), value.into());
    }

    /// Add a fragment parameter
    pub fn add_fragment(&mut self, key: &str, value: impl Into<String>) {
        self.fragment.insert(key.to_owned(), value.into());
    }

    /// Authorization code returned in the query, if any
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.query.get("code").map(String::as_str)
    }
}
