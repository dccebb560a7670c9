// ABOUTME: The flow record carried inside sealed challenges and verifiers
// ABOUTME: Every mutation goes through FlowState::transition so illegal steps are refused
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use super::error::FlowError;
use super::state::{FlowEvent, FlowState};
use crate::models::Arguments;

/// Version of the serialized flow layout
pub const FLOW_FORMAT_VERSION: u8 = 1;

fn random_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Rejection recorded by the login, consent or device UI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDeniedError {
    /// OAuth 2.0 error name, e.g. `access_denied`
    pub error: String,
    /// Human readable description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Hint for the end user
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hint: String,
    /// HTTP status to answer with
    #[serde(default)]
    pub status_code: u16,
    /// Debug details, never shown to clients in production
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub debug: String,
}

impl RequestDeniedError {
    /// A denial with the given error name
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            status_code: 403,
            ..Self::default()
        }
    }

    /// Only denials carrying an error name count
    #[must_use]
    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }
}

/// Result of the login UI for a login challenge
#[derive(Debug, Clone, Default)]
pub struct HandledLoginRequest {
    /// Authenticated subject
    pub subject: String,
    /// Remember the login in a session cookie
    pub remember: bool,
    /// Seconds the login is remembered, zero for the browser session
    pub remember_for: i64,
    /// Authentication context class reference
    pub acr: String,
    /// Authentication methods used
    pub amr: Vec<String>,
    /// Context passed on to the consent UI
    pub context: Option<Value>,
    /// Subject presented to this client instead of `subject`
    pub forced_subject_identifier: Option<String>,
    /// When the user authenticated, now if unset
    pub authenticated_at: Option<DateTime<Utc>>,
    /// Set to reject the login
    pub error: Option<RequestDeniedError>,
}

/// Result of the consent UI for a consent challenge
#[derive(Debug, Clone, Default)]
pub struct HandledConsentRequest {
    /// Consent challenge the result answers
    pub challenge_id: String,
    /// Scopes the user granted
    pub granted_scope: Arguments,
    /// Audiences the user granted
    pub granted_audience: Arguments,
    /// Remember the consent for later requests of the client
    pub remember: bool,
    /// Seconds the consent is remembered
    pub remember_for: i64,
    /// Extra claims for the access token session
    pub session_access_token: Map<String, Value>,
    /// Extra claims for the ID token
    pub session_id_token: Map<String, Value>,
    /// Consent was already recorded and its verifier may be skipped
    pub was_handled: bool,
    /// Set to reject the consent
    pub error: Option<RequestDeniedError>,
}

/// Result of the device verification UI
#[derive(Debug, Clone, Default)]
pub struct HandledDeviceRequest {
    /// Device code request the user code belongs to
    pub device_code_request_id: String,
    /// Set to reject the device verification
    pub error: Option<RequestDeniedError>,
}

/// State of one login, consent and device negotiation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    /// Layout version, see [`FLOW_FORMAT_VERSION`]
    pub version: u8,
    /// Flow identifier, also the login challenge identifier
    pub id: String,
    /// Network the flow was created in
    pub network_id: String,
    /// Current state
    pub state: FlowState,

    /// Client the authorization request came from
    pub client_id: String,
    /// Original authorization request URL
    pub request_url: String,
    /// Scopes requested by the client
    pub requested_scope: Arguments,
    /// Audiences requested by the client
    pub requested_audience: Arguments,
    /// When the flow was created
    pub requested_at: DateTime<Utc>,

    /// Authenticated subject
    #[serde(default)]
    pub subject: String,
    /// Subject presented to the client instead of `subject`
    #[serde(default)]
    pub forced_subject_identifier: Option<String>,
    /// The user already had a session and login was skipped
    #[serde(default)]
    pub login_skip: bool,
    /// Login verifier handed back to the client's browser
    pub login_verifier: String,
    /// CSRF token bound to the login verifier
    pub login_csrf: String,
    /// Login remembered in a session cookie
    #[serde(default)]
    pub login_remember: bool,
    /// Seconds the login is remembered
    #[serde(default)]
    pub login_remember_for: i64,
    /// Authentication context class reference
    #[serde(default)]
    pub acr: String,
    /// Authentication methods used
    #[serde(default)]
    pub amr: Vec<String>,
    /// Context handed from login to consent
    #[serde(default)]
    pub context: Value,
    /// The login verifier was redeemed
    #[serde(default)]
    pub login_was_used: bool,
    /// Rejection recorded by the login UI
    #[serde(default)]
    pub login_error: Option<RequestDeniedError>,
    /// When the user authenticated
    #[serde(default)]
    pub login_authenticated_at: Option<DateTime<Utc>>,

    /// Consent challenge identifier
    #[serde(default)]
    pub consent_challenge_id: Option<String>,
    /// Consent was skipped because it was remembered
    #[serde(default)]
    pub consent_skip: bool,
    /// Consent verifier handed back to the client's browser
    #[serde(default)]
    pub consent_verifier: Option<String>,
    /// CSRF token bound to the consent verifier
    #[serde(default)]
    pub consent_csrf: Option<String>,
    /// Scopes the user granted
    #[serde(default)]
    pub granted_scope: Arguments,
    /// Audiences the user granted
    #[serde(default)]
    pub granted_audience: Arguments,
    /// Consent remembered
    #[serde(default)]
    pub consent_remember: bool,
    /// Seconds the consent is remembered
    #[serde(default)]
    pub consent_remember_for: Option<i64>,
    /// When the consent was submitted
    #[serde(default)]
    pub consent_handled_at: Option<DateTime<Utc>>,
    /// The consent verifier was redeemed
    #[serde(default)]
    pub consent_was_used: bool,
    /// Rejection recorded by the consent UI
    #[serde(default)]
    pub consent_error: Option<RequestDeniedError>,
    /// Extra access token claims
    #[serde(default)]
    pub session_access_token: Map<String, Value>,
    /// Extra ID token claims
    #[serde(default)]
    pub session_id_token: Map<String, Value>,

    /// Device challenge identifier
    #[serde(default)]
    pub device_challenge_id: Option<String>,
    /// Device code request the user code belongs to
    #[serde(default)]
    pub device_code_request_id: Option<String>,
    /// Device verifier handed back to the browser
    #[serde(default)]
    pub device_verifier: Option<String>,
    /// CSRF token bound to the device verifier
    #[serde(default)]
    pub device_csrf: Option<String>,
    /// The device verifier was redeemed
    #[serde(default)]
    pub device_was_used: bool,
    /// When the device verification was submitted
    #[serde(default)]
    pub device_handled_at: Option<DateTime<Utc>>,
    /// Rejection recorded by the device UI
    #[serde(default)]
    pub device_error: Option<RequestDeniedError>,
}

/// What the authorization endpoint knows when a flow starts
#[derive(Debug, Clone, Default)]
pub struct FlowRequest {
    /// Requesting client
    pub client_id: String,
    /// Original request URL
    pub request_url: String,
    /// Requested scopes
    pub requested_scope: Arguments,
    /// Requested audiences
    pub requested_audience: Arguments,
    /// Subject of an existing session, if any
    pub subject: String,
    /// Login may be skipped because a session exists
    pub login_skip: bool,
}

impl Flow {
    fn blank(network_id: &str, request: FlowRequest, state: FlowState) -> Self {
        Self {
            version: FLOW_FORMAT_VERSION,
            id: random_token(),
            network_id: network_id.to_owned(),
            state,
            client_id: request.client_id,
            request_url: request.request_url,
            requested_scope: request.requested_scope,
            requested_audience: request.requested_audience,
            requested_at: Utc::now(),
            subject: request.subject,
            forced_subject_identifier: None,
            login_skip: request.login_skip,
            login_verifier: random_token(),
            login_csrf: random_token(),
            login_remember: false,
            login_remember_for: 0,
            acr: String::new(),
            amr: Vec::new(),
            context: Value::Null,
            login_was_used: false,
            login_error: None,
            login_authenticated_at: None,
            consent_challenge_id: None,
            consent_skip: false,
            consent_verifier: None,
            consent_csrf: None,
            granted_scope: Arguments::new(),
            granted_audience: Arguments::new(),
            consent_remember: false,
            consent_remember_for: None,
            consent_handled_at: None,
            consent_was_used: false,
            consent_error: None,
            session_access_token: Map::new(),
            session_id_token: Map::new(),
            device_challenge_id: None,
            device_code_request_id: None,
            device_verifier: None,
            device_csrf: None,
            device_was_used: false,
            device_handled_at: None,
            device_error: None,
        }
    }

    /// Start a flow at the login step
    #[must_use]
    pub fn new_login(network_id: &str, request: FlowRequest) -> Self {
        Self::blank(network_id, request, FlowState::LoginInitialized)
    }

    /// Start a flow at the device verification step
    #[must_use]
    pub fn new_device(network_id: &str, request: FlowRequest) -> Self {
        let mut flow = Self::blank(network_id, request, FlowState::DeviceInitialized);
        flow.device_challenge_id = Some(random_token());
        flow.device_verifier = Some(random_token());
        flow.device_csrf = Some(random_token());
        flow
    }

    fn advance(&mut self, event: FlowEvent) -> Result<(), FlowError> {
        let next = self.state.transition(event)?;
        debug!(flow.id = %self.id, from = %self.state, to = %next, "Flow state advanced");
        self.state = next;
        Ok(())
    }

    /// Record the login UI's result
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::AlreadyUsed`] once the login verifier was redeemed,
    /// [`FlowError::Conflict`] if another subject already authenticated this
    /// flow and [`FlowError::InvalidState`] outside the login step
    pub fn handle_login_request(&mut self, handled: HandledLoginRequest) -> Result<(), FlowError> {
        if self.login_was_used {
            return Err(FlowError::AlreadyUsed {
                what: "login request",
            });
        }
        if !self.subject.is_empty() && !handled.subject.is_empty() && self.subject != handled.subject {
            return Err(FlowError::Conflict {
                hint: format!(
                    "The login request subject '{}' does not match the authenticated subject '{}'.",
                    handled.subject, self.subject
                ),
            });
        }

        let error = handled.error.filter(RequestDeniedError::is_error);
        self.advance(FlowEvent::HandleLogin {
            denied: error.is_some(),
        })?;

        self.login_error = error;
        if !handled.subject.is_empty() {
            self.subject = handled.subject;
        }
        self.forced_subject_identifier = handled.forced_subject_identifier;
        self.login_remember = handled.remember;
        self.login_remember_for = handled.remember_for;
        self.acr = handled.acr;
        self.amr = handled.amr;
        if let Some(context) = handled.context {
            self.context = context;
        }
        self.login_authenticated_at = Some(handled.authenticated_at.unwrap_or_else(Utc::now));
        Ok(())
    }

    /// Redeem the login verifier
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::AlreadyUsed`] on a second redemption and
    /// [`FlowError::InvalidState`] if no login result was recorded
    pub fn invalidate_login_request(&mut self) -> Result<(), FlowError> {
        if self.login_was_used {
            return Err(FlowError::AlreadyUsed {
                what: "login verifier",
            });
        }
        self.advance(FlowEvent::InvalidateLogin)?;
        self.login_was_used = true;
        Ok(())
    }

    /// Issue the consent challenge after a successful login
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidState`] unless the login step completed
    pub fn initialize_consent(&mut self, skip: bool) -> Result<(), FlowError> {
        self.advance(FlowEvent::InitializeConsent)?;
        self.consent_challenge_id = Some(random_token());
        self.consent_verifier = Some(random_token());
        self.consent_csrf = Some(random_token());
        self.consent_skip = skip;
        Ok(())
    }

    /// Record the consent UI's result
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::AlreadyUsed`] once the consent verifier was
    /// redeemed, [`FlowError::InvalidState`] outside the consent step and
    /// [`FlowError::NotFound`] if the result answers another consent challenge
    pub fn handle_consent_request(&mut self, handled: HandledConsentRequest) -> Result<(), FlowError> {
        if self.consent_was_used {
            return Err(FlowError::AlreadyUsed {
                what: "consent request",
            });
        }

        let error = handled.error.filter(RequestDeniedError::is_error);
        let denied = error.is_some();
        let event = FlowEvent::HandleConsent { denied };
        self.state.transition(event)?;
        if self.consent_challenge_id.as_deref() != Some(handled.challenge_id.as_str()) {
            debug!(flow.id = %self.id, "Consent result answers a different challenge");
            return Err(FlowError::NotFound);
        }
        self.advance(event)?;
        if !denied && handled.was_handled {
            self.advance(FlowEvent::InvalidateConsent)?;
            self.consent_was_used = true;
        }

        self.consent_error = error;
        self.granted_scope = handled.granted_scope;
        self.granted_audience = handled.granted_audience;
        self.consent_remember = handled.remember;
        self.consent_remember_for = Some(handled.remember_for);
        self.consent_handled_at = Some(Utc::now());
        self.session_access_token = handled.session_access_token;
        self.session_id_token = handled.session_id_token;
        Ok(())
    }

    /// Redeem the consent verifier
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::AlreadyUsed`] on a second redemption and
    /// [`FlowError::InvalidState`] if no consent result was recorded
    pub fn invalidate_consent_request(&mut self) -> Result<(), FlowError> {
        if self.consent_was_used {
            return Err(FlowError::AlreadyUsed {
                what: "consent verifier",
            });
        }
        self.advance(FlowEvent::InvalidateConsent)?;
        self.consent_was_used = true;
        Ok(())
    }

    /// Record the device verification UI's result
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::AlreadyUsed`] once the device verifier was
    /// redeemed and [`FlowError::InvalidState`] outside the device step
    pub fn handle_device_request(&mut self, handled: HandledDeviceRequest) -> Result<(), FlowError> {
        if self.device_was_used {
            return Err(FlowError::AlreadyUsed {
                what: "device request",
            });
        }
        let error = handled.error.filter(RequestDeniedError::is_error);
        self.advance(FlowEvent::HandleDevice {
            denied: error.is_some(),
        })?;
        self.device_error = error;
        self.device_code_request_id = Some(handled.device_code_request_id);
        self.device_handled_at = Some(Utc::now());
        Ok(())
    }

    /// Redeem the device verifier
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::AlreadyUsed`] on a second redemption and
    /// [`FlowError::InvalidState`] if no device result was recorded
    pub fn invalidate_device_request(&mut self) -> Result<(), FlowError> {
        if self.device_was_used {
            return Err(FlowError::AlreadyUsed {
                what: "device verifier",
            });
        }
        self.advance(FlowEvent::InvalidateDevice)?;
        self.device_was_used = true;
        Ok(())
    }

    /// Continue a verified device flow with the login step
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidState`] unless the device verifier was redeemed
    pub fn begin_login(&mut self) -> Result<(), FlowError> {
        self.advance(FlowEvent::BeginLogin)?;
        self.login_verifier = random_token();
        self.login_csrf = random_token();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login_flow() -> Flow {
        Flow::new_login(
            "net",
            FlowRequest {
                client_id: "app".into(),
                ..FlowRequest::default()
            },
        )
    }

    #[test]
    fn test_login_error_can_be_redeemed_once() {
        let mut flow = login_flow();
        flow.handle_login_request(HandledLoginRequest {
            error: Some(RequestDeniedError::new("access_denied")),
            ..HandledLoginRequest::default()
        })
        .unwrap();
        assert_eq!(flow.state, FlowState::LoginError);

        flow.invalidate_login_request().unwrap();
        assert_eq!(flow.state, FlowState::LoginUsed);
        assert!(matches!(
            flow.invalidate_login_request(),
            Err(FlowError::AlreadyUsed { .. })
        ));
    }

    #[test]
    fn test_empty_denial_is_ignored() {
        let mut flow = login_flow();
        flow.handle_login_request(HandledLoginRequest {
            subject: "alice".into(),
            error: Some(RequestDeniedError::default()),
            ..HandledLoginRequest::default()
        })
        .unwrap();
        assert_eq!(flow.state, FlowState::LoginUnused);
        assert!(flow.login_error.is_none());
    }

    #[test]
    fn test_subject_mismatch_conflicts() {
        let mut flow = login_flow();
        flow.subject = "alice".into();
        let err = flow
            .handle_login_request(HandledLoginRequest {
                subject: "mallory".into(),
                ..HandledLoginRequest::default()
            })
            .unwrap_err();
        assert!(matches!(err, FlowError::Conflict { .. }));
        assert_eq!(flow.state, FlowState::LoginInitialized);
    }

    #[test]
    fn test_handled_consent_skips_to_used() {
        let mut flow = login_flow();
        flow.handle_login_request(HandledLoginRequest {
            subject: "alice".into(),
            ..HandledLoginRequest::default()
        })
        .unwrap();
        flow.initialize_consent(false).unwrap();
        flow.handle_consent_request(HandledConsentRequest {
            challenge_id: flow.consent_challenge_id.clone().unwrap(),
            was_handled: true,
            ..HandledConsentRequest::default()
        })
        .unwrap();
        assert_eq!(flow.state, FlowState::ConsentUsed);
    }

    #[test]
    fn test_consent_for_other_challenge_is_refused() {
        let mut flow = login_flow();
        flow.handle_login_request(HandledLoginRequest {
            subject: "alice".into(),
            ..HandledLoginRequest::default()
        })
        .unwrap();
        flow.initialize_consent(false).unwrap();

        let err = flow
            .handle_consent_request(HandledConsentRequest {
                challenge_id: "some-other-challenge".into(),
                granted_scope: Arguments::from_space_delimited("openid"),
                ..HandledConsentRequest::default()
            })
            .unwrap_err();
        assert!(matches!(err, FlowError::NotFound));
        assert_eq!(flow.state, FlowState::ConsentInitialized);
        assert!(flow.granted_scope.is_empty());
    }

    #[test]
    fn test_device_then_login() {
        let mut flow = Flow::new_device("net", FlowRequest::default());
        flow.handle_device_request(HandledDeviceRequest {
            device_code_request_id: "dc".into(),
            error: None,
        })
        .unwrap();
        flow.invalidate_device_request().unwrap();
        flow.begin_login().unwrap();
        assert_eq!(flow.state, FlowState::LoginInitialized);
    }
}
