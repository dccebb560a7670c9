// ABOUTME: Re-exports client and token domain models from tessera-core
// ABOUTME: Client, Arguments, GrantType, TokenType, RequestId and lifespan overrides
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

pub use tessera_core::models::*;
