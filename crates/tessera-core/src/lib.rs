// ABOUTME: Core types and constants for the tessera authorization server
// ABOUTME: Foundation crate with error taxonomy, domain models, and protocol constants
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Tessera Core
//!
//! Foundation crate providing shared types and constants for the tessera
//! authorization server. This crate is designed to change infrequently, enabling
//! incremental compilation benefits in the workspace.
//!
//! ## Modules
//!
//! - **errors**: `AppError`/`ErrorCode` for infrastructure, `OAuth2Error` for the
//!   protocol surface, plus storage and cipher error kinds
//! - **constants**: Token prefixes, default lifespans, flow purpose tags
//! - **models**: Clients, ordered argument sets, grant and token type enums

/// Unified error handling system with standard error codes and OAuth 2.0 error kinds
pub mod errors;

/// Protocol constants organized by domain
pub mod constants;

/// Core data models (Client, Arguments, `GrantType`, `TokenType`)
pub mod models;
