// ABOUTME: Re-exports protocol constants from tessera-core
// ABOUTME: Token prefixes, default lifespans, flow purpose tags and form parameter names
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

pub use tessera_core::constants::*;
