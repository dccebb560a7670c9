// ABOUTME: Authorization endpoint request parsing with redirect URI and state validation
// ABOUTME: Redirect URIs must match a registration exactly and use https unless on loopback
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::net::IpAddr;
use std::sync::Arc;

use url::{Host, Url};

use super::request::{AuthorizeRequest, Form, Request};
use crate::config::OAuth2Config;
use crate::constants::params;
use crate::errors::{OAuth2Error, OAuth2ErrorKind};
use crate::models::{Arguments, Client, ResponseMode};

/// Parse and validate an authorization request for `client`
///
/// # Errors
///
/// Returns `invalid_request` for a missing, unregistered or insecure redirect
/// URI, `unsupported_response_type` for a response type the client did not
/// register, `invalid_state` for a weak state and `invalid_request` for an
/// audience the client may not request
pub fn new_authorize_request(
    config: &OAuth2Config,
    client: Arc<Client>,
    form: Form,
) -> Result<AuthorizeRequest, OAuth2Error> {
    let redirect_uri = resolve_redirect_uri(&client, form.get_or_empty(params::REDIRECT_URI))?;

    let request = Request::new(Arc::clone(&client)).with_form(form);
    let mut authorize = AuthorizeRequest::new(request, Some(redirect_uri));

    if authorize.response_types.is_empty() {
        return Err(OAuth2Error::new(OAuth2ErrorKind::UnsupportedResponseType)
            .with_hint("The request is missing the 'response_type' parameter."));
    }
    if !client_allows_response_types(&client, &authorize.response_types) {
        return Err(OAuth2Error::new(OAuth2ErrorKind::UnsupportedResponseType).with_hint(format!(
            "The client is not allowed to request response_type '{}'.",
            authorize.response_types.join()
        )));
    }

    if authorize.state.len() < config.min_state_entropy {
        return Err(OAuth2Error::new(OAuth2ErrorKind::InvalidState).with_hint(format!(
            "Request parameter 'state' must be at least be {} characters long to ensure sufficient entropy.",
            config.min_state_entropy
        )));
    }

    config
        .audience_strategy
        .validate(&client.audience, &authorize.request.requested_audience)?;

    if authorize.response_types.has("token") {
        authorize.response_mode = ResponseMode::Fragment;
    }
    Ok(authorize)
}

/// True if one of the client's registered response types equals `requested` as a set
fn client_allows_response_types(client: &Client, requested: &Arguments) -> bool {
    client
        .response_types
        .iter()
        .any(|registered| Arguments::from_space_delimited(registered).matches(requested))
}

/// Resolve the redirect URI from the request or, if omitted, the single registered one
///
/// # Errors
///
/// Returns `invalid_request` if the URI is missing, unregistered, malformed or insecure
pub fn resolve_redirect_uri(client: &Client, raw: &str) -> Result<Url, OAuth2Error> {
    let chosen = if raw.is_empty() {
        match client.redirect_uris.as_slice() {
            [only] => only.as_str(),
            _ => {
                return Err(OAuth2Error::invalid_request(
                    "The 'redirect_uri' parameter is required because the OAuth 2.0 Client has zero or several registered redirect URIs.",
                ))
            }
        }
    } else if client.redirect_uris.iter().any(|registered| registered == raw) {
        raw
    } else {
        return Err(OAuth2Error::invalid_request(
            "The 'redirect_uri' parameter does not match any of the OAuth 2.0 Client's pre-registered redirect urls.",
        ));
    };

    let url = Url::parse(chosen).map_err(|e| {
        OAuth2Error::invalid_request("The 'redirect_uri' parameter is malformed.").with_source(e)
    })?;

    if url.fragment().is_some() {
        return Err(OAuth2Error::invalid_request(
            "The 'redirect_uri' parameter must not contain a fragment.",
        ));
    }
    if !is_redirect_uri_secure(&url) {
        return Err(OAuth2Error::invalid_request(
            "The 'redirect_uri' parameter must use https unless it points to a loopback address.",
        ));
    }
    Ok(url)
}

/// Plain `http` is only accepted for loopback hosts; other schemes are left to the registration
#[must_use]
pub fn is_redirect_uri_secure(url: &Url) -> bool {
    if url.scheme() != "http" {
        return true;
    }
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => IpAddr::V4(ip).is_loopback(),
        Some(Host::Ipv6(ip)) => IpAddr::V6(ip).is_loopback(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(redirects: &[&str]) -> Client {
        let mut client = Client::new("app");
        client.redirect_uris = redirects.iter().map(|r| (*r).to_owned()).collect();
        client.response_types = Arguments::from_space_delimited("code");
        client
    }

    #[test]
    fn test_single_registered_redirect_is_default() {
        let url = resolve_redirect_uri(&client(&["https://app.example/cb"]), "").unwrap();
        assert_eq!(url.as_str(), "https://app.example/cb");
    }

    #[test]
    fn test_unregistered_redirect_rejected() {
        let error = resolve_redirect_uri(&client(&["https://app.example/cb"]), "https://evil.example/cb")
            .unwrap_err();
        assert!(error.is(OAuth2ErrorKind::InvalidRequest));
    }

    #[test]
    fn test_plain_http_only_on_loopback() {
        assert!(is_redirect_uri_secure(&Url::parse("http://127.0.0.1:8080/cb").unwrap()));
        assert!(is_redirect_uri_secure(&Url::parse("http://localhost/cb").unwrap()));
        assert!(is_redirect_uri_secure(&Url::parse("http://[::1]/cb").unwrap()));
        assert!(!is_redirect_uri_secure(&Url::parse("http://app.example/cb").unwrap()));
        assert!(is_redirect_uri_secure(&Url::parse("com.example.app:/cb").unwrap()));
    }

    #[test]
    fn test_short_state_rejected() {
        let form = Form::parse("response_type=code&state=abc");
        let error = new_authorize_request(
            &OAuth2Config::default(),
            Arc::new(client(&["https://app.example/cb"])),
            form,
        )
        .unwrap_err();
        assert!(error.is(OAuth2ErrorKind::InvalidState));
    }
}
