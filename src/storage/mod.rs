// ABOUTME: Storage backends implementing the authorization server's storage contracts
// ABOUTME: The in-memory store journals writes per transaction so rollback restores prior state
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// In-memory store for tests and single-process deployments
pub mod memory;

pub use memory::MemoryStore;
