// ABOUTME: Token request model passed through every grant handler and persisted by signature
// ABOUTME: Tracks requested and granted scope/audience, form values, session and owning client
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use url::{form_urlencoded, Url};

use super::session::{DefaultSession, Session};
use crate::constants::params;
use crate::models::{Arguments, Client, RequestId, ResponseMode};

/// Form values of a request, one value per key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form(BTreeMap<String, String>);

impl Form {
    /// Create an empty form
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Parse an `application/x-www-form-urlencoded` body, keeping the first value per key
    #[must_use]
    pub fn parse(body: &str) -> Self {
        let mut form = Self::new();
        for (key, value) in form_urlencoded::parse(body.as_bytes()) {
            form.0.entry(key.into_owned()).or_insert_with(|| value.into_owned());
        }
        form
    }

    /// Value of `key`, if present
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Value of `key`, or the empty string
    #[must_use]
    pub fn get_or_empty(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    /// Set `key` to `value`
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder variant of [`Form::set`]
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Remove `key`
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// True if `key` is present
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Keep only keys in `allowed`
    #[must_use]
    pub fn retain_keys<S: AsRef<str>>(&self, allowed: &[S]) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(key, _)| allowed.iter().any(|a| a.as_ref() == key.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

/// Canonical request unit shared by every grant handler
#[derive(Debug, Clone)]
pub struct Request {
    /// Identifier shared by all tokens of this authorization
    pub id: RequestId,
    /// When the request was created
    pub requested_at: DateTime<Utc>,
    /// Owning client
    pub client: Arc<Client>,
    /// Scopes asked for
    pub requested_scope: Arguments,
    /// Scopes granted, always a subset of `requested_scope`
    pub granted_scope: Arguments,
    /// Audiences asked for
    pub requested_audience: Arguments,
    /// Audiences granted, always a subset of `requested_audience`
    pub granted_audience: Arguments,
    /// Form values
    pub form: Form,
    /// Claims container
    pub session: Box<dyn Session>,
}

impl Request {
    /// Create a request for `client` with an empty session
    #[must_use]
    pub fn new(client: Arc<Client>) -> Self {
        Self {
            id: RequestId::new(),
            requested_at: Utc::now(),
            client,
            requested_scope: Arguments::new(),
            granted_scope: Arguments::new(),
            requested_audience: Arguments::new(),
            granted_audience: Arguments::new(),
            form: Form::new(),
            session: Box::new(DefaultSession::default()),
        }
    }

    /// Replace the session
    #[must_use]
    pub fn with_session(mut self, session: Box<dyn Session>) -> Self {
        self.session = session;
        self
    }

    /// Replace the form and parse `scope` and `audience` from it
    #[must_use]
    pub fn with_form(mut self, form: Form) -> Self {
        self.requested_scope = Arguments::from_space_delimited(form.get_or_empty(params::SCOPE));
        self.requested_audience =
            Arguments::from_space_delimited(form.get_or_empty(params::AUDIENCE));
        self.form = form;
        self
    }

    /// Grant a scope
    pub fn grant_scope(&mut self, scope: &str) {
        self.granted_scope.append(scope);
    }

    /// Grant an audience
    pub fn grant_audience(&mut self, audience: &str) {
        self.granted_audience.append(audience);
    }

    /// Copy identity, client, scopes, audiences, session and form from `other`
    pub fn merge(&mut self, other: &Self) {
        self.id = other.id;
        self.requested_at = other.requested_at;
        self.client = Arc::clone(&other.client);
        for scope in other.requested_scope.iter() {
            self.requested_scope.append(scope);
        }
        for scope in other.granted_scope.iter() {
            self.granted_scope.append(scope);
        }
        for audience in other.requested_audience.iter() {
            self.requested_audience.append(audience);
        }
        for audience in other.granted_audience.iter() {
            self.granted_audience.append(audience);
        }
        self.session = other.session.clone();
        for (key, value) in &other.form.0 {
            self.form.set(key.clone(), value.clone());
        }
    }

    /// Copy with form values reduced to `allowed` keys, safe to persist
    #[must_use]
    pub fn sanitize<S: AsRef<str>>(&self, allowed: &[S]) -> Self {
        let mut sanitized = self.clone();
        sanitized.form = self.form.retain_keys(allowed);
        sanitized
    }
}

/// Token endpoint request
#[derive(Debug, Clone)]
pub struct AccessRequest {
    /// Shared request data
    pub request: Request,
    /// Value of `grant_type`
    pub grant_types: Arguments,
    /// Grant types handled so far
    pub handled_grant_types: Arguments,
}

impl AccessRequest {
    /// Build from a token endpoint form
    #[must_use]
    pub fn new(client: Arc<Client>, form: Form) -> Self {
        let grant_types = Arguments::from_space_delimited(form.get_or_empty(params::GRANT_TYPE));
        Self {
            request: Request::new(client).with_form(form),
            grant_types,
            handled_grant_types: Arguments::new(),
        }
    }

    /// Replace the session
    #[must_use]
    pub fn with_session(mut self, session: Box<dyn Session>) -> Self {
        self.request.session = session;
        self
    }

    /// True if `grant_type` is exactly `grant_type`
    #[must_use]
    pub fn is_grant_type(&self, grant_type: &str) -> bool {
        self.grant_types.exact_one(grant_type)
    }
}

/// Authorization endpoint request
#[derive(Debug, Clone)]
pub struct AuthorizeRequest {
    /// Shared request data
    pub request: Request,
    /// Value of `response_type`
    pub response_types: Arguments,
    /// Resolved redirect URI
    pub redirect_uri: Option<Url>,
    /// Value of `state`
    pub state: String,
    /// Where parameters are returned
    pub response_mode: ResponseMode,
    /// Response types handled so far
    pub handled_response_types: Arguments,
}

impl AuthorizeRequest {
    /// Build from an already resolved request
    #[must_use]
    pub fn new(request: Request, redirect_uri: Option<Url>) -> Self {
        let response_types =
            Arguments::from_space_delimited(request.form.get_or_empty(params::RESPONSE_TYPE));
        let state = request.form.get_or_empty(params::STATE).to_owned();
        Self {
            request,
            response_types,
            redirect_uri,
            state,
            response_mode: ResponseMode::Query,
            handled_response_types: Arguments::new(),
        }
    }

    /// Mark `response_type` as handled
    pub fn set_response_type_handled(&mut self, response_type: &str) {
        self.handled_response_types.append(response_type);
    }

    /// True once every requested response type has been handled
    #[must_use]
    pub fn did_handle_all_response_types(&self) -> bool {
        self.response_types
            .iter()
            .all(|rt| self.handled_response_types.has(rt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_drops_unlisted_form_values() {
        let form = Form::parse("grant_type=password&username=alice&password=hunter2&scope=a+b");
        let request = Request::new(Arc::new(Client::new("app"))).with_form(form);
        assert_eq!(request.requested_scope.join(), "a b");

        let sanitized = request.sanitize(&["username"]);
        assert_eq!(sanitized.form.get("username"), Some("alice"));
        assert!(!sanitized.form.contains("password"));
        assert!(request.form.contains("password"));
    }

    #[test]
    fn test_merge_copies_identity_and_grants() {
        let client = Arc::new(Client::new("app"));
        let mut stored = Request::new(Arc::clone(&client));
        stored.grant_scope("offline");
        let mut accumulator = Request::new(client);
        accumulator.merge(&stored);

        assert_eq!(accumulator.id, stored.id);
        assert!(accumulator.granted_scope.has("offline"));
    }
}
