// ABOUTME: Pluggable scope and audience matching strategies used at token issuance
// ABOUTME: Hierarchic scopes let `a` grant `a.b.c`; audiences match exactly or by URL prefix
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::str::FromStr;

use url::Url;

use crate::errors::OAuth2Error;
use crate::models::{Arguments, Client};

/// How a requested scope is matched against registered scopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeStrategy {
    /// `a` satisfies `a`, `a.b` and `a.b.c`
    #[default]
    Hierarchic,
    /// Only identical strings match
    Exact,
    /// `*` in a registered scope matches exactly one dot separated segment
    Wildcard,
}

impl ScopeStrategy {
    /// True if any scope in `haystack` satisfies `needle`
    #[must_use]
    pub fn matches(self, haystack: &Arguments, needle: &str) -> bool {
        haystack.iter().any(|registered| match self {
            Self::Exact => registered == needle,
            Self::Hierarchic => hierarchic_match(registered, needle),
            Self::Wildcard => wildcard_match(registered, needle),
        })
    }

    /// Fail with `invalid_scope` unless `client` may request every scope in `requested`
    ///
    /// # Errors
    ///
    /// Returns `invalid_scope` naming the first scope the client may not request
    pub fn validate(self, client: &Client, requested: &Arguments) -> Result<(), OAuth2Error> {
        for scope in requested.iter() {
            if !self.matches(&client.scopes, scope) {
                return Err(OAuth2Error::invalid_scope(format!(
                    "The OAuth 2.0 Client is not allowed to request scope '{scope}'."
                )));
            }
        }
        Ok(())
    }
}

fn hierarchic_match(registered: &str, needle: &str) -> bool {
    if registered == needle {
        return true;
    }
    let registered_parts: Vec<&str> = registered.split('.').collect();
    let needle_parts: Vec<&str> = needle.split('.').collect();
    registered_parts.len() <= needle_parts.len()
        && registered_parts
            .iter()
            .zip(&needle_parts)
            .all(|(r, n)| r == n)
}

fn wildcard_match(registered: &str, needle: &str) -> bool {
    if !registered.contains('*') {
        return registered == needle;
    }
    let registered_parts: Vec<&str> = registered.split('.').collect();
    let needle_parts: Vec<&str> = needle.split('.').collect();
    registered_parts.len() == needle_parts.len()
        && registered_parts
            .iter()
            .zip(&needle_parts)
            .all(|(r, n)| *r == "*" || r == n)
}

impl FromStr for ScopeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hierarchic" => Ok(Self::Hierarchic),
            "exact" => Ok(Self::Exact),
            "wildcard" => Ok(Self::Wildcard),
            other => Err(format!("unknown scope strategy: {other}")),
        }
    }
}

/// How a requested audience is matched against registered audiences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudienceStrategy {
    /// Requested audience must be registered verbatim
    #[default]
    Exact,
    /// Requested audience URL must share scheme and host and extend a registered path
    UrlPrefix,
}

impl AudienceStrategy {
    /// True if `needle` is allowed by any audience in `haystack`
    #[must_use]
    pub fn matches(self, haystack: &Arguments, needle: &str) -> bool {
        match self {
            Self::Exact => haystack.has(needle),
            Self::UrlPrefix => haystack
                .iter()
                .any(|registered| url_prefix_match(registered, needle)),
        }
    }

    /// Fail with `invalid_request` unless every audience in `requested` is allowed
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` naming the first audience that is not allowed
    pub fn validate(self, haystack: &Arguments, requested: &Arguments) -> Result<(), OAuth2Error> {
        for audience in requested.iter() {
            if !self.matches(haystack, audience) {
                return Err(OAuth2Error::invalid_request(format!(
                    "Requested audience '{audience}' has not been whitelisted by the OAuth 2.0 Client."
                )));
            }
        }
        Ok(())
    }
}

fn url_prefix_match(registered: &str, needle: &str) -> bool {
    let (Ok(registered), Ok(needle)) = (Url::parse(registered), Url::parse(needle)) else {
        return false;
    };
    if registered.scheme() != needle.scheme() || registered.host_str() != needle.host_str() {
        return false;
    }
    if registered.port_or_known_default() != needle.port_or_known_default() {
        return false;
    }
    let registered_path = registered.path().trim_end_matches('/');
    let needle_path = needle.path().trim_end_matches('/');
    needle_path == registered_path || needle_path.starts_with(&format!("{registered_path}/"))
}

impl FromStr for AudienceStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "exact" => Ok(Self::Exact),
            "url_prefix" | "url" => Ok(Self::UrlPrefix),
            other => Err(format!("unknown audience strategy: {other}")),
        }
    }
}
