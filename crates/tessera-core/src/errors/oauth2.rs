// ABOUTME: OAuth 2.0 protocol error type with RFC 6749 error names, hints, and debug detail
// ABOUTME: Carries HTTP status mapping and a sanitized JSON response rendering
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Kind of OAuth 2.0 failure
///
/// `UnknownRequest` is routing, not failure: a handler returns it when the
/// request is not its responsibility so a dispatcher can try the next one.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuth2ErrorKind {
    /// The handler is not responsible for this request
    UnknownRequest,
    /// Malformed or otherwise invalid request
    InvalidRequest,
    /// Client may not use this grant or response type
    UnauthorizedClient,
    /// Resource owner or server denied the request
    AccessDenied,
    /// Response type not supported
    UnsupportedResponseType,
    /// Requested scope is invalid or not allowed
    InvalidScope,
    /// Unexpected server condition
    ServerError,
    /// Server cannot handle the request right now
    TemporarilyUnavailable,
    /// Grant type not supported
    UnsupportedGrantType,
    /// Grant or refresh token is invalid, expired, revoked, or mismatched
    InvalidGrant,
    /// Client authentication failed
    InvalidClient,
    /// The state parameter is missing or too weak
    InvalidState,
    /// Requested resource could not be found
    NotFound,
    /// The request could not be authorized
    RequestUnauthorized,
    /// Token signature did not verify
    TokenSignatureMismatch,
    /// Token string is malformed
    InvalidTokenFormat,
    /// Token has expired
    TokenExpired,
    /// Token was not granted a requested scope
    ScopeNotGranted,
    /// Token is inactive
    TokenInactive,
    /// A competing request modified the same resource
    SerializationConflict,
}

impl OAuth2ErrorKind {
    /// RFC 6749 style error name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::UnknownRequest => "request_unknown",
            Self::InvalidRequest => "invalid_request",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::AccessDenied => "access_denied",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::InvalidScope => "invalid_scope",
            Self::ServerError => "server_error",
            Self::TemporarilyUnavailable => "temporarily_unavailable",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::InvalidGrant => "invalid_grant",
            Self::InvalidClient => "invalid_client",
            Self::InvalidState => "invalid_state",
            Self::NotFound => "not_found",
            Self::RequestUnauthorized => "request_unauthorized",
            Self::TokenSignatureMismatch => "token_signature_mismatch",
            Self::InvalidTokenFormat | Self::TokenExpired => "invalid_token",
            Self::ScopeNotGranted => "scope_not_granted",
            Self::TokenInactive => "token_inactive",
            Self::SerializationConflict => "request_conflict",
        }
    }

    /// Human readable description
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::UnknownRequest => "The handler is not responsible for this request.",
            Self::InvalidRequest => "The request is missing a required parameter, includes an invalid parameter value, includes a parameter more than once, or is otherwise malformed.",
            Self::UnauthorizedClient => "The client is not authorized to request a token using this method.",
            Self::AccessDenied => "The resource owner or authorization server denied the request.",
            Self::UnsupportedResponseType => "The authorization server does not support obtaining a token using this method.",
            Self::InvalidScope => "The requested scope is invalid, unknown, or malformed.",
            Self::ServerError => "The authorization server encountered an unexpected condition that prevented it from fulfilling the request.",
            Self::TemporarilyUnavailable => "The authorization server is currently unable to handle the request due to a temporary overloading or maintenance of the server.",
            Self::UnsupportedGrantType => "The authorization grant type is not supported by the authorization server.",
            Self::InvalidGrant => "The provided authorization grant (e.g., authorization code, resource owner credentials) or refresh token is invalid, expired, revoked, does not match the redirection URI used in the authorization request, or was issued to another client.",
            Self::InvalidClient => "Client authentication failed (e.g., unknown client, no client authentication included, or unsupported authentication method).",
            Self::InvalidState => "The state is missing or does not have enough characters and is therefore considered too weak.",
            Self::NotFound => "Could not find the requested resource(s).",
            Self::RequestUnauthorized => "The request could not be authorized.",
            Self::TokenSignatureMismatch => "Token signature mismatch.",
            Self::InvalidTokenFormat => "Invalid token format.",
            Self::TokenExpired => "Token expired.",
            Self::ScopeNotGranted => "The token was not granted the requested scope.",
            Self::TokenInactive => "Token is inactive because it is malformed, expired or otherwise invalid.",
            Self::SerializationConflict => "The request could not be completed because another request is competing for the same resource.",
        }
    }

    /// HTTP status code for this kind
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::UnknownRequest
            | Self::InvalidRequest
            | Self::UnauthorizedClient
            | Self::UnsupportedResponseType
            | Self::InvalidScope
            | Self::UnsupportedGrantType
            | Self::InvalidGrant
            | Self::InvalidState
            | Self::TokenSignatureMismatch
            | Self::InvalidTokenFormat => 400,
            Self::InvalidClient
            | Self::RequestUnauthorized
            | Self::TokenExpired
            | Self::TokenInactive => 401,
            Self::AccessDenied | Self::ScopeNotGranted => 403,
            Self::NotFound => 404,
            Self::SerializationConflict => 409,
            Self::ServerError => 500,
            Self::TemporarilyUnavailable => 503,
        }
    }
}

impl fmt::Display for OAuth2ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// OAuth 2.0 protocol error
///
/// Clones share the underlying source error.
#[derive(Debug, Clone)]
pub struct OAuth2Error {
    kind: OAuth2ErrorKind,
    hint: Option<String>,
    debug: Option<String>,
    source: Option<Arc<dyn StdError + Send + Sync>>,
}

impl OAuth2Error {
    /// Create an error of the given kind without hint or debug detail
    #[must_use]
    pub const fn new(kind: OAuth2ErrorKind) -> Self {
        Self {
            kind,
            hint: None,
            debug: None,
            source: None,
        }
    }

    /// Attach a client-visible hint
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attach debug detail, only rendered when debug exposure is enabled
    #[must_use]
    pub fn with_debug(mut self, debug: impl Into<String>) -> Self {
        self.debug = Some(debug.into());
        self
    }

    /// Attach the underlying cause
    #[must_use]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Error kind
    #[must_use]
    pub const fn kind(&self) -> OAuth2ErrorKind {
        self.kind
    }

    /// Returns true if this error is of `kind`
    #[must_use]
    pub fn is(&self, kind: OAuth2ErrorKind) -> bool {
        self.kind == kind
    }

    /// RFC 6749 error name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Client-visible hint, if any
    #[must_use]
    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// Debug detail, if any
    #[must_use]
    pub fn debug(&self) -> Option<&str> {
        self.debug.as_deref()
    }

    /// HTTP status code
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.kind.http_status()
    }

    /// Render the error body, including debug detail only when `expose_debug` is set
    #[must_use]
    pub fn to_response(&self, expose_debug: bool) -> OAuth2ErrorResponse {
        let description = self.hint.as_ref().map_or_else(
            || self.kind.description().to_owned(),
            |hint| format!("{} {hint}", self.kind.description()),
        );
        OAuth2ErrorResponse {
            error: self.kind.name().to_owned(),
            error_description: description,
            error_hint: self.hint.clone(),
            error_debug: if expose_debug { self.debug.clone() } else { None },
            status_code: self.kind.http_status(),
        }
    }

    /// The handler is not responsible for this request
    #[must_use]
    pub const fn unknown_request() -> Self {
        Self::new(OAuth2ErrorKind::UnknownRequest)
    }

    /// Create an `invalid_request` error
    #[must_use]
    pub fn invalid_request(hint: impl Into<String>) -> Self {
        Self::new(OAuth2ErrorKind::InvalidRequest).with_hint(hint)
    }

    /// Create an `invalid_grant` error
    #[must_use]
    pub fn invalid_grant(hint: impl Into<String>) -> Self {
        Self::new(OAuth2ErrorKind::InvalidGrant).with_hint(hint)
    }

    /// Create an `invalid_scope` error
    #[must_use]
    pub fn invalid_scope(hint: impl Into<String>) -> Self {
        Self::new(OAuth2ErrorKind::InvalidScope).with_hint(hint)
    }

    /// Create an `unauthorized_client` error
    #[must_use]
    pub fn unauthorized_client(hint: impl Into<String>) -> Self {
        Self::new(OAuth2ErrorKind::UnauthorizedClient).with_hint(hint)
    }

    /// Create a `server_error` carrying the cause as debug detail
    #[must_use]
    pub fn server_error(debug: impl Into<String>) -> Self {
        Self::new(OAuth2ErrorKind::ServerError).with_debug(debug)
    }

    /// Create an `unsupported_grant_type` error
    #[must_use]
    pub fn unsupported_grant_type() -> Self {
        Self::new(OAuth2ErrorKind::UnsupportedGrantType)
    }
}

impl fmt::Display for OAuth2Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.name())?;
        if let Some(hint) = &self.hint {
            write!(f, ": {hint}")?;
        }
        if let Some(debug) = &self.debug {
            write!(f, " ({debug})")?;
        }
        Ok(())
    }
}

impl StdError for OAuth2Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn StdError + 'static))
    }
}

/// OAuth 2.0 error response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth2ErrorResponse {
    /// Error name
    pub error: String,
    /// Human-readable error description
    pub error_description: String,
    /// Hint on how to resolve the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_hint: Option<String>,
    /// Debug detail (development only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_debug: Option<String>,
    /// HTTP status code
    #[serde(skip)]
    pub status_code: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hidden_unless_exposed() {
        let error = OAuth2Error::server_error("db connection reset");

        let hidden = error.to_response(false);
        assert_eq!(hidden.error, "server_error");
        assert!(hidden.error_debug.is_none());
        assert_eq!(hidden.status_code, 500);

        let exposed = error.to_response(true);
        assert_eq!(exposed.error_debug.as_deref(), Some("db connection reset"));
    }

    #[test]
    fn test_hint_appended_to_description() {
        let error = OAuth2Error::invalid_grant("The authorization code has already been used.");
        let response = error.to_response(false);
        assert!(response
            .error_description
            .ends_with("The authorization code has already been used."));
        assert_eq!(error.http_status(), 400);
    }
}
