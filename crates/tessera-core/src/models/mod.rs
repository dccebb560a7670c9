// ABOUTME: Core data models shared by the token endpoint, strategies and storage
// ABOUTME: Re-exports Client, Arguments, GrantType, TokenType and RequestId
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Data Models
//!
//! - `Arguments`: ordered, de-duplicated list of scopes, audiences or response types
//! - `Client`: registered OAuth 2.0 client with per-grant lifespan overrides
//! - `GrantType` / `TokenType`: closed enumerations of what the server issues
//! - `RequestId`: identifier shared by every token minted from one authorization

mod arguments;
mod client;
mod types;

pub use arguments::Arguments;
pub use client::{Client, ClientLifespans, LifespanOverride};
pub use types::{GrantType, RequestId, ResponseMode, TokenType};
