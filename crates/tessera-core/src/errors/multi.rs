// ABOUTME: Aggregate error collecting every failure of a compensating action sequence
// ABOUTME: Lets reuse-detection paths attempt all revocations and report partial failure
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::error::Error as StdError;
use std::fmt;

use super::StorageError;

/// One failed step of a compensation sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedStep {
    /// Name of the step, e.g. `revoke_access_token`
    pub step: &'static str,
    /// Error the step reported
    pub error: StorageError,
}

/// Every failure collected while running a sequence of compensating actions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiError {
    failures: Vec<FailedStep>,
}

impl MultiError {
    /// Create an empty aggregate
    #[must_use]
    pub const fn new() -> Self {
        Self {
            failures: Vec::new(),
        }
    }

    /// Record the outcome of a step, keeping only failures
    pub fn record(&mut self, step: &'static str, result: Result<(), StorageError>) {
        if let Err(error) = result {
            self.failures.push(FailedStep { step, error });
        }
    }

    /// Record the outcome of a step, treating `NotFound` as success
    pub fn record_ignoring_missing(&mut self, step: &'static str, result: Result<(), StorageError>) {
        match result {
            Err(StorageError::NotFound) | Ok(()) => {}
            Err(error) => self.failures.push(FailedStep { step, error }),
        }
    }

    /// True when no step failed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of failed steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Failed steps in the order they ran
    #[must_use]
    pub fn failures(&self) -> &[FailedStep] {
        &self.failures
    }

    /// `Ok(())` when empty, otherwise the aggregate itself
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one step failed
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} compensating action(s) failed", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "; {} failed: {}", failure.step, failure.error)?;
        }
        Ok(())
    }
}

impl StdError for MultiError {}
