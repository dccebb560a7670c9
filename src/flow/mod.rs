// ABOUTME: Login, consent and device flow negotiation between the authorization endpoint and its UIs
// ABOUTME: Flows travel as sealed self-contained strings instead of server-side rows
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Flow state machine and codec
//!
//! A flow starts when the authorization endpoint needs a login. The login UI
//! receives a sealed `login_challenge`, submits its result and hands the
//! browser a sealed `login_verifier`. Consent and device verification repeat
//! the same challenge/verifier pattern. Each sealed string is bound to its
//! purpose and network, expires after the step's maximum age, and verifiers
//! redeem once.

mod codec;
mod error;
mod model;
mod state;

pub use codec::{FlowCodec, FlowPurpose, FlowStep};
pub use error::FlowError;
pub use model::{
    Flow, FlowRequest, HandledConsentRequest, HandledDeviceRequest, HandledLoginRequest,
    RequestDeniedError, FLOW_FORMAT_VERSION,
};
pub use state::{FlowEvent, FlowState};
