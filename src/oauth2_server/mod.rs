// ABOUTME: OAuth 2.0 authorization server core: grant handlers, token strategies and storage contracts
// ABOUTME: Exposes the provider that dispatches token, authorize, introspection and revocation requests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! OAuth 2.0 authorization server core
//!
//! Transport is left to the embedding service. Requests arrive as parsed
//! [`Form`] values, grant handlers validate them against the owning
//! [`crate::models::Client`], and tokens are persisted through the storage
//! contracts in [`storage`].

/// Authorization endpoint request parsing and redirect URI checks
pub mod authorize;
/// Grant handlers for the token and authorization endpoints
pub mod handlers;
/// Token introspection (RFC 7662)
pub mod introspection;
/// Handler chain dispatcher
pub mod provider;
/// Request models shared by all handlers
pub mod request;
/// Token and authorization responses
pub mod response;
/// Token revocation (RFC 7009)
pub mod revocation;
/// Scope and audience matching
pub mod scope;
/// Session capability carried by requests
pub mod session;
/// Storage contracts
pub mod storage;
/// Token strategies
pub mod strategy;
/// Transaction coordination for multi-write grant exchanges
pub mod transaction;

pub use authorize::new_authorize_request;
pub use handlers::{
    AuthorizeCodeHandler, AuthorizeEndpointHandler, ClientCredentialsHandler, ImplicitHandler,
    PkceHandler, RefreshTokenHandler, ResourceOwnerPasswordHandler, TokenEndpointHandler,
};
pub use introspection::{
    CoreValidator, IntrospectionResponse, StatelessJwtIntrospector, TokenIntrospector,
};
pub use provider::OAuth2Provider;
pub use request::{AccessRequest, AuthorizeRequest, Form, Request};
pub use response::{AccessResponse, AuthorizeResponse};
pub use revocation::{RevocationHandler, TokenRevocationHandler};
pub use scope::{AudienceStrategy, ScopeStrategy};
pub use session::{DefaultSession, JwtClaimsTemplate, JwtSession, Session};
pub use storage::StoredGrant;
pub use strategy::{ConfiguredStrategy, CoreStrategy, HmacStrategy, JwtSigningKey, JwtStrategy};
pub use transaction::TransactionCoordinator;
