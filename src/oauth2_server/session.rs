// ABOUTME: Session capability carried by every token request: subject, expiries and claims
// ABOUTME: Each session variant owns its deep copy so refresh handoff never shares mutations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::TokenType;

/// Claims container attached to a token request
pub trait Session: fmt::Debug + Send + Sync {
    /// Resource owner the tokens act for; empty for client-only grants
    fn subject(&self) -> &str;

    /// Set the resource owner
    fn set_subject(&mut self, subject: String);

    /// Human readable resource owner name, if known
    fn username(&self) -> &str;

    /// Explicit expiry for `token_type`, overriding lifespan defaults
    fn expires_at(&self, token_type: TokenType) -> Option<DateTime<Utc>>;

    /// Set or clear the expiry for `token_type`
    fn set_expires_at(&mut self, token_type: TokenType, expires_at: Option<DateTime<Utc>>);

    /// Extra claims exposed through introspection
    fn extra(&self) -> &Map<String, Value>;

    /// JWT claim material, for sessions usable with the JWT strategy
    fn jwt_claims(&self) -> Option<&JwtClaimsTemplate> {
        None
    }

    /// Deep copy of this session
    fn clone_session(&self) -> Box<dyn Session>;
}

impl Clone for Box<dyn Session> {
    fn clone(&self) -> Self {
        self.clone_session()
    }
}

/// Minimal session with subject, username, expiries and extra claims
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefaultSession {
    /// Resource owner
    pub subject: String,
    /// Display name of the resource owner
    #[serde(default)]
    pub username: String,
    /// Explicit per-token-type expiries
    #[serde(default)]
    pub expires_at: BTreeMap<TokenType, DateTime<Utc>>,
    /// Extra claims for introspection
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl DefaultSession {
    /// Create a session for `subject`
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Self::default()
        }
    }
}

impl Session for DefaultSession {
    fn subject(&self) -> &str {
        &self.subject
    }

    fn set_subject(&mut self, subject: String) {
        self.subject = subject;
    }

    fn username(&self) -> &str {
        &self.username
    }

    fn expires_at(&self, token_type: TokenType) -> Option<DateTime<Utc>> {
        self.expires_at.get(&token_type).copied()
    }

    fn set_expires_at(&mut self, token_type: TokenType, expires_at: Option<DateTime<Utc>>) {
        match expires_at {
            Some(at) => {
                self.expires_at.insert(token_type, at);
            }
            None => {
                self.expires_at.remove(&token_type);
            }
        }
    }

    fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    fn clone_session(&self) -> Box<dyn Session> {
        Box::new(self.clone())
    }
}

/// Claim material merged into JWT access tokens
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JwtClaimsTemplate {
    /// Key identifier written to the JWT header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    /// Additional claims written under `ext`
    #[serde(default)]
    pub extra: Map<String, Value>,
}

/// Session for the JWT access token strategy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JwtSession {
    /// Subject, username, expiries and introspection claims
    #[serde(flatten)]
    pub base: DefaultSession,
    /// JWT header and claim material
    #[serde(default)]
    pub claims: JwtClaimsTemplate,
}

impl JwtSession {
    /// Create a session for `subject`
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            base: DefaultSession::new(subject),
            claims: JwtClaimsTemplate::default(),
        }
    }
}

impl Session for JwtSession {
    fn subject(&self) -> &str {
        self.base.subject()
    }

    fn set_subject(&mut self, subject: String) {
        self.base.set_subject(subject);
    }

    fn username(&self) -> &str {
        self.base.username()
    }

    fn expires_at(&self, token_type: TokenType) -> Option<DateTime<Utc>> {
        self.base.expires_at(token_type)
    }

    fn set_expires_at(&mut self, token_type: TokenType, expires_at: Option<DateTime<Utc>>) {
        self.base.set_expires_at(token_type, expires_at);
    }

    fn extra(&self) -> &Map<String, Value> {
        self.base.extra()
    }

    fn jwt_claims(&self) -> Option<&JwtClaimsTemplate> {
        Some(&self.claims)
    }

    fn clone_session(&self) -> Box<dyn Session> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_clone_is_independent() {
        let mut original: Box<dyn Session> = Box::new(DefaultSession::new("alice"));
        let at = Utc::now() + Duration::hours(1);
        original.set_expires_at(TokenType::AccessToken, Some(at));

        let mut copy = original.clone();
        copy.set_expires_at(TokenType::AccessToken, None);
        copy.set_subject("bob".into());

        assert_eq!(original.expires_at(TokenType::AccessToken), Some(at));
        assert_eq!(original.subject(), "alice");
        assert!(copy.expires_at(TokenType::AccessToken).is_none());
    }
}
