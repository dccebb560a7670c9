// ABOUTME: Re-exports the unified error types from tessera-core
// ABOUTME: OAuth2Error for the protocol surface, AppError for infrastructure failures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

pub use tessera_core::errors::*;
