// ABOUTME: Main library entry point for the tessera OAuth 2.0 / OpenID Connect authorization core
// ABOUTME: Grant handlers, token strategies, storage contracts and sealed login/consent flows
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

// Crate-level attributes:
// - deny(unsafe_code): Zero-tolerance unsafe policy
#![deny(unsafe_code)]

//! # Tessera
//!
//! The protocol core of an OAuth 2.0 / OpenID Connect authorization server.
//! Transport, client registration and the login and consent UIs live in the
//! embedding service; this crate validates requests, mints tokens and keeps
//! the negotiation state between the authorization endpoint and its UIs.
//!
//! ## Features
//!
//! - **Grant handlers**: authorization code with PKCE, refresh token rotation
//!   with reuse detection, client credentials, resource owner password and implicit
//! - **Token strategies**: HMAC-signed opaque tokens (`ory_at_`, `ory_rt_`,
//!   `ory_ac_`) or signed JWT access tokens
//! - **Introspection and revocation**: RFC 7662 and RFC 7009 over the same storage
//! - **Flows**: login, consent and device challenges sealed with an AEAD cipher
//!   bound to purpose and network
//! - **Transactions**: multi-write exchanges roll back as a unit
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use tessera::config::ServerConfig;
//! use tessera::errors::AppResult;
//! use tessera::oauth2_server::{ConfiguredStrategy, OAuth2Provider};
//!
//! fn main() -> AppResult<()> {
//!     let config = ServerConfig::from_env()?;
//!     let oauth2 = Arc::new(config.oauth2);
//!     let strategy = ConfiguredStrategy::from_config(Arc::new(config.secrets), Arc::clone(&oauth2), None)?;
//!     let _core = strategy.core();
//!     let _provider = OAuth2Provider::new(oauth2);
//!     Ok(())
//! }
//! ```

/// Configuration loaded from the environment
pub mod config;

/// Protocol constants
pub mod constants;

/// Request context carrying cancellation and transactions
pub mod context;

/// AEAD cipher, HMAC token generation and secret rotation
pub mod crypto;

/// Unified error handling for the protocol surface and infrastructure
pub mod errors;

/// Login, consent and device flow state machine and codec
pub mod flow;

/// Structured logging setup and security audit events
pub mod logging;

/// Client and token domain models
pub mod models;

/// Grant handlers, strategies, introspection and revocation
pub mod oauth2_server;

/// Storage backends
pub mod storage;
