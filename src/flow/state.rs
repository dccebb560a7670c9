// ABOUTME: Login, consent and device flow states and the single transition table between them
// ABOUTME: States serialize as small integers so sealed flow tokens stay compact
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::FlowError;

/// Where a flow stands in the login, consent and device negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum FlowState {
    /// Login challenge issued, nothing submitted yet
    LoginInitialized,
    /// Login result submitted, verifier not yet redeemed
    LoginUnused,
    /// Login verifier redeemed
    LoginUsed,
    /// Consent challenge issued
    ConsentInitialized,
    /// Consent result submitted, verifier not yet redeemed
    ConsentUnused,
    /// Consent verifier redeemed
    ConsentUsed,
    /// Device challenge issued
    DeviceInitialized,
    /// Device result submitted, verifier not yet redeemed
    DeviceUnused,
    /// Device verifier redeemed
    DeviceUsed,
    /// Login was rejected
    LoginError,
    /// Consent was rejected
    ConsentError,
    /// Device verification was rejected
    DeviceError,
}

impl FlowState {
    /// Wire code of the state
    #[must_use]
    pub const fn code(self) -> i16 {
        match self {
            Self::LoginInitialized => 1,
            Self::LoginUnused => 2,
            Self::LoginUsed => 3,
            Self::ConsentInitialized => 4,
            Self::ConsentUnused => 5,
            Self::ConsentUsed => 6,
            Self::DeviceInitialized => 7,
            Self::DeviceUnused => 8,
            Self::DeviceUsed => 9,
            Self::LoginError => 128,
            Self::ConsentError => 129,
            Self::DeviceError => 130,
        }
    }

    /// Apply `event`, refusing states the event may not start from
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidState`] naming the accepted predecessors
    pub fn transition(self, event: FlowEvent) -> Result<Self, FlowError> {
        use FlowEvent as E;
        use FlowState as S;

        let next = match (self, event) {
            (S::LoginInitialized | S::LoginUnused | S::LoginError, E::HandleLogin { denied }) => {
                if denied {
                    S::LoginError
                } else {
                    S::LoginUnused
                }
            }
            (S::LoginUnused | S::LoginError, E::InvalidateLogin) => S::LoginUsed,
            (S::LoginUnused | S::LoginUsed, E::InitializeConsent) => S::ConsentInitialized,
            (
                S::ConsentInitialized | S::ConsentUnused | S::ConsentError,
                E::HandleConsent { denied },
            ) => {
                if denied {
                    S::ConsentError
                } else {
                    S::ConsentUnused
                }
            }
            (S::ConsentUnused | S::ConsentError, E::InvalidateConsent) => S::ConsentUsed,
            (
                S::DeviceInitialized | S::DeviceUnused | S::DeviceError,
                E::HandleDevice { denied },
            ) => {
                if denied {
                    S::DeviceError
                } else {
                    S::DeviceUnused
                }
            }
            (S::DeviceUnused | S::DeviceError, E::InvalidateDevice) => S::DeviceUsed,
            (S::DeviceUsed, E::BeginLogin) => S::LoginInitialized,
            (actual, event) => {
                return Err(FlowError::InvalidState {
                    expected: event.accepted_states(),
                    actual,
                })
            }
        };
        Ok(next)
    }

    /// True once the flow carries a rejection
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::LoginError | Self::ConsentError | Self::DeviceError)
    }
}

impl From<FlowState> for i16 {
    fn from(state: FlowState) -> Self {
        state.code()
    }
}

impl TryFrom<i16> for FlowState {
    type Error = String;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        Ok(match code {
            1 => Self::LoginInitialized,
            2 => Self::LoginUnused,
            3 => Self::LoginUsed,
            4 => Self::ConsentInitialized,
            5 => Self::ConsentUnused,
            6 => Self::ConsentUsed,
            7 => Self::DeviceInitialized,
            8 => Self::DeviceUnused,
            9 => Self::DeviceUsed,
            128 => Self::LoginError,
            129 => Self::ConsentError,
            130 => Self::DeviceError,
            other => return Err(format!("unknown flow state {other}")),
        })
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Something that happened to a flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowEvent {
    /// Login result submitted
    HandleLogin {
        /// The login was rejected
        denied: bool,
    },
    /// Login verifier redeemed
    InvalidateLogin,
    /// Consent challenge issued after login
    InitializeConsent,
    /// Consent result submitted
    HandleConsent {
        /// The consent was rejected
        denied: bool,
    },
    /// Consent verifier redeemed
    InvalidateConsent,
    /// Device result submitted
    HandleDevice {
        /// The device verification was rejected
        denied: bool,
    },
    /// Device verifier redeemed
    InvalidateDevice,
    /// Login starts after a completed device verification
    BeginLogin,
}

impl FlowEvent {
    /// States this event may start from
    #[must_use]
    pub const fn accepted_states(self) -> &'static [FlowState] {
        use FlowState as S;
        match self {
            Self::HandleLogin { .. } => &[S::LoginInitialized, S::LoginUnused, S::LoginError],
            Self::InvalidateLogin => &[S::LoginUnused, S::LoginError],
            Self::InitializeConsent => &[S::LoginUnused, S::LoginUsed],
            Self::HandleConsent { .. } => {
                &[S::ConsentInitialized, S::ConsentUnused, S::ConsentError]
            }
            Self::InvalidateConsent => &[S::ConsentUnused, S::ConsentError],
            Self::HandleDevice { .. } => &[S::DeviceInitialized, S::DeviceUnused, S::DeviceError],
            Self::InvalidateDevice => &[S::DeviceUnused, S::DeviceError],
            Self::BeginLogin => &[S::DeviceUsed],
        }
    }
}
