// ABOUTME: System secrets loaded from TESSERA_SECRETS_SYSTEM with rotation support
// ABOUTME: First entry is the primary secret, the rest are rotated; zeroized on drop
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::env;
use std::fmt;

use zeroize::Zeroizing;

use crate::constants::tokens;
use crate::crypto::SecretProvider;
use crate::errors::{AppError, AppResult};

const SECRETS_VAR: &str = "TESSERA_SECRETS_SYSTEM";

/// Primary and rotated system secrets
#[derive(Clone)]
pub struct SecretsConfig {
    primary: Zeroizing<Vec<u8>>,
    rotated: Vec<Zeroizing<Vec<u8>>>,
}

impl SecretsConfig {
    /// Build from an ordered list, the first entry being the primary secret
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty or any secret is shorter than 32 bytes
    pub fn from_secrets<I, S>(secrets: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let mut all = Vec::new();
        for secret in secrets {
            let bytes = secret.as_ref();
            if bytes.len() < tokens::MIN_SECRET_BYTES {
                return Err(AppError::config_invalid(format!(
                    "System secrets must be at least {} bytes, got {} bytes",
                    tokens::MIN_SECRET_BYTES,
                    bytes.len()
                )));
            }
            all.push(Zeroizing::new(bytes.to_vec()));
        }

        let mut iter = all.into_iter();
        let primary = iter.next().ok_or_else(|| AppError::config_missing(SECRETS_VAR))?;
        Ok(Self {
            primary,
            rotated: iter.collect(),
        })
    }

    /// Load from `TESSERA_SECRETS_SYSTEM` (comma separated)
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is unset, empty, or holds a short secret
    pub fn from_env() -> AppResult<Self> {
        let raw = Zeroizing::new(env::var(SECRETS_VAR).map_err(|_| AppError::config_missing(SECRETS_VAR))?);
        Self::from_secrets(raw.split(',').map(str::trim).filter(|s| !s.is_empty()))
    }

    /// Number of rotated secrets
    #[must_use]
    pub fn rotated_count(&self) -> usize {
        self.rotated.len()
    }
}

impl SecretProvider for SecretsConfig {
    fn primary_secret(&self) -> Option<Zeroizing<Vec<u8>>> {
        Some(self.primary.clone())
    }

    fn rotated_secrets(&self) -> Vec<Zeroizing<Vec<u8>>> {
        self.rotated.clone()
    }
}

impl fmt::Debug for SecretsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretsConfig")
            .field("primary", &"[REDACTED]")
            .field("rotated", &self.rotated.len())
            .finish()
    }
}
