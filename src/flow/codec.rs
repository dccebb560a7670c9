// ABOUTME: Seals flows into opaque challenge and verifier strings and opens them again
// ABOUTME: JSON is gzip-compressed and AEAD-encrypted with the purpose tag as additional data
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use chrono::{Duration, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, warn};

use super::error::FlowError;
use super::model::{Flow, FLOW_FORMAT_VERSION};
use crate::config::FlowConfig;
use crate::constants::flow_purposes;
use crate::context::RequestContext;
use crate::crypto::Cipher;
use crate::errors::StorageError;
use crate::logging::AuditLogger;
use crate::oauth2_server::storage::ConsumedVerifierStorage;

/// Upper bound on a decompressed flow
const MAX_FLOW_BYTES: u64 = 256 * 1024;

/// What a sealed flow string may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowPurpose {
    /// `login_challenge`
    LoginChallenge,
    /// `login_verifier`
    LoginVerifier,
    /// `consent_challenge`
    ConsentChallenge,
    /// `consent_verifier`
    ConsentVerifier,
    /// `device_challenge`
    DeviceChallenge,
    /// `device_verifier`
    DeviceVerifier,
}

impl FlowPurpose {
    /// Additional-data tag the purpose is sealed with
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LoginChallenge => flow_purposes::LOGIN_CHALLENGE,
            Self::LoginVerifier => flow_purposes::LOGIN_VERIFIER,
            Self::ConsentChallenge => flow_purposes::CONSENT_CHALLENGE,
            Self::ConsentVerifier => flow_purposes::CONSENT_VERIFIER,
            Self::DeviceChallenge => flow_purposes::DEVICE_CHALLENGE,
            Self::DeviceVerifier => flow_purposes::DEVICE_VERIFIER,
        }
    }

    const fn step(self) -> FlowStep {
        match self {
            Self::LoginChallenge | Self::LoginVerifier => FlowStep::Login,
            Self::ConsentChallenge | Self::ConsentVerifier => FlowStep::Consent,
            Self::DeviceChallenge | Self::DeviceVerifier => FlowStep::Device,
        }
    }

    fn max_age(self, config: &FlowConfig) -> Duration {
        match self.step() {
            FlowStep::Login => config.login_max_age,
            FlowStep::Consent => config.consent_max_age,
            FlowStep::Device => config.device_max_age,
        }
    }

    /// Error returned for a string that does not open under this purpose
    fn rejection(self) -> FlowError {
        match self {
            Self::ConsentVerifier => FlowError::AccessDenied {
                hint: "The consent verifier has already been used, has not been granted, or is invalid."
                    .into(),
            },
            Self::LoginVerifier | Self::DeviceVerifier => FlowError::AccessDenied {
                hint: "The verifier has already been used, has not been granted, or is invalid."
                    .into(),
            },
            Self::LoginChallenge | Self::ConsentChallenge | Self::DeviceChallenge => {
                FlowError::NotFound
            }
        }
    }
}

impl fmt::Display for FlowPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A step of the negotiation owning one challenge and one verifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowStep {
    /// Login
    Login,
    /// Consent
    Consent,
    /// Device verification
    Device,
}

impl FlowStep {
    /// Purpose of the challenge handed to this step's UI
    #[must_use]
    pub const fn challenge(self) -> FlowPurpose {
        match self {
            Self::Login => FlowPurpose::LoginChallenge,
            Self::Consent => FlowPurpose::ConsentChallenge,
            Self::Device => FlowPurpose::DeviceChallenge,
        }
    }

    /// Purpose of the verifier returned by this step's UI
    #[must_use]
    pub const fn verifier(self) -> FlowPurpose {
        match self {
            Self::Login => FlowPurpose::LoginVerifier,
            Self::Consent => FlowPurpose::ConsentVerifier,
            Self::Device => FlowPurpose::DeviceVerifier,
        }
    }

    const fn expired_hint(self) -> &'static str {
        match self {
            Self::Login => "The login request has expired, please try again.",
            Self::Consent => "The consent request has expired, please try again.",
            Self::Device => "The device request has expired, please try again.",
        }
    }
}

/// Encodes flows into sealed strings and decodes them back
#[derive(Clone)]
pub struct FlowCodec {
    cipher: Arc<dyn Cipher>,
    config: Arc<FlowConfig>,
    consumed: Arc<dyn ConsumedVerifierStorage>,
}

impl FlowCodec {
    /// Create a codec sealing with `cipher` and recording redeemed verifiers in `consumed`
    #[must_use]
    pub fn new(
        cipher: Arc<dyn Cipher>,
        config: Arc<FlowConfig>,
        consumed: Arc<dyn ConsumedVerifierStorage>,
    ) -> Self {
        Self {
            cipher,
            config,
            consumed,
        }
    }

    /// Seal `flow` for `purpose`
    ///
    /// # Errors
    ///
    /// Returns an error if serialization, compression or encryption fails
    pub fn encode(&self, flow: &Flow, purpose: FlowPurpose) -> Result<String, FlowError> {
        let json = serde_json::to_vec(flow)?;
        let mut encoder = GzEncoder::new(Vec::with_capacity(json.len() / 2), Compression::default());
        encoder.write_all(&json)?;
        let compressed = encoder.finish()?;
        Ok(self.cipher.encrypt(&compressed, purpose.as_str().as_bytes())?)
    }

    /// Open a challenge or verifier without consuming it
    ///
    /// # Errors
    ///
    /// Returns the purpose's rejection if the string does not open as a flow of
    /// this network, or [`FlowError::Expired`] if the flow outlived its maximum age
    pub fn decode(&self, sealed: &str, purpose: FlowPurpose) -> Result<Flow, FlowError> {
        let compressed = self
            .cipher
            .decrypt(sealed, purpose.as_str().as_bytes())
            .map_err(|e| {
                debug!(flow.purpose = %purpose, error = %e, "Flow token did not decrypt");
                purpose.rejection()
            })?;

        let mut json = Vec::new();
        GzDecoder::new(compressed.as_slice())
            .take(MAX_FLOW_BYTES)
            .read_to_end(&mut json)
            .map_err(|e| {
                debug!(flow.purpose = %purpose, error = %e, "Flow token did not decompress");
                purpose.rejection()
            })?;

        let flow: Flow = serde_json::from_slice(&json).map_err(|e| {
            debug!(flow.purpose = %purpose, error = %e, "Flow token did not deserialize");
            purpose.rejection()
        })?;

        if flow.version != FLOW_FORMAT_VERSION {
            debug!(flow.id = %flow.id, version = flow.version, "Flow layout version not supported");
            return Err(purpose.rejection());
        }
        if flow.network_id != self.config.network_id {
            warn!(flow.id = %flow.id, flow.purpose = %purpose, "Flow presented to a foreign network");
            return Err(purpose.rejection());
        }
        if flow.requested_at + purpose.max_age(&self.config) < Utc::now() {
            debug!(flow.id = %flow.id, flow.purpose = %purpose, "Flow expired");
            return Err(FlowError::Expired {
                hint: purpose.step().expired_hint().to_owned(),
            });
        }
        Ok(flow)
    }

    /// Seal the challenge of `step`
    ///
    /// # Errors
    ///
    /// See [`Self::encode`]
    pub fn challenge(&self, flow: &Flow, step: FlowStep) -> Result<String, FlowError> {
        self.encode(flow, step.challenge())
    }

    /// Seal the verifier of `step`
    ///
    /// # Errors
    ///
    /// See [`Self::encode`]
    pub fn verifier(&self, flow: &Flow, step: FlowStep) -> Result<String, FlowError> {
        self.encode(flow, step.verifier())
    }

    /// Open the verifier of `step`, redeem it and return the advanced flow
    ///
    /// A verifier redeems once: the second presentation of the same verifier
    /// fails even though the sealed string still opens.
    ///
    /// # Errors
    ///
    /// Returns any [`Self::decode`] error, [`FlowError::InvalidState`] if the
    /// step has no recorded result and [`FlowError::AlreadyUsed`] on replay
    pub async fn decode_verifier_and_invalidate(
        &self,
        ctx: &RequestContext,
        sealed: &str,
        step: FlowStep,
    ) -> Result<Flow, FlowError> {
        let purpose = step.verifier();
        let mut flow = self.decode(sealed, purpose)?;

        match step {
            FlowStep::Login => flow.invalidate_login_request(),
            FlowStep::Consent => flow.invalidate_consent_request(),
            FlowStep::Device => flow.invalidate_device_request(),
        }?;

        let key = format!("{}:{}", flow.id, purpose.as_str());
        match self.consumed.consume_verifier(ctx, &key).await {
            Ok(()) => Ok(flow),
            Err(StorageError::Inactive) => {
                AuditLogger::flow_replay_rejected(&flow.id, purpose.as_str());
                Err(FlowError::AlreadyUsed {
                    what: purpose.as_str(),
                })
            }
            Err(e) => Err(FlowError::Storage(e)),
        }
    }
}

impl fmt::Debug for FlowCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowCodec")
            .field("network_id", &self.config.network_id)
            .finish_non_exhaustive()
    }
}
