// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ne-license: entitlement token verification and the on-disk token cache.
//!
//! An addon worker runs only under a signed entitlement envelope. The
//! claims contract is fixed: `app_id`, `serial_number` and `exp` are all
//! required, RS256 only. Verification is a value, never a panic; the
//! supervisor turns failures into structured command replies.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Claims carried by an entitlement envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitlementClaims {
    pub app_id: String,
    pub serial_number: String,
    pub exp: u64,
}

/// Errors from entitlement handling
#[derive(Debug, Error)]
pub enum LicenseError {
    #[error("public key unavailable at {0}")]
    MissingKey(PathBuf),
    #[error("bad public key: {0}")]
    BadKey(#[source] jsonwebtoken::errors::Error),
    #[error("invalid or expired token")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),
    #[error("token cache: {0}")]
    Cache(#[from] std::io::Error),
}

/// Verifies entitlement tokens and maintains the per-addon disk cache.
#[derive(Clone)]
pub struct LicenseManager {
    key: DecodingKey,
    validation: Validation,
    cache_dir: PathBuf,
}

impl LicenseManager {
    /// Load the public key and prepare the cache directory.
    pub fn new(pubkey_file: &Path, cache_dir: &Path) -> Result<Self, LicenseError> {
        let pem = std::fs::read(pubkey_file)
            .map_err(|_| LicenseError::MissingKey(pubkey_file.to_path_buf()))?;
        let key = DecodingKey::from_rsa_pem(&pem).map_err(LicenseError::BadKey)?;

        std::fs::create_dir_all(cache_dir)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp"]);
        // Expiry enforcement belongs to the supervisor's sweep; default
        // leeway would let a just-expired token re-activate.
        validation.leeway = 0;

        Ok(Self {
            key,
            validation,
            cache_dir: cache_dir.to_path_buf(),
        })
    }

    /// Verify a signed envelope against the configured public key.
    pub fn verify(&self, token: &str) -> Result<EntitlementClaims, LicenseError> {
        decode::<EntitlementClaims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(LicenseError::InvalidToken)
    }

    // Token cache (persistent, for offline operation)
    // ──────────────────────────────────────────────────────────────────

    fn token_path(&self, app_id: &str) -> PathBuf {
        self.cache_dir.join(format!("{app_id}.token"))
    }

    pub fn cache_token(&self, app_id: &str, token: &str) -> Result<(), LicenseError> {
        std::fs::write(self.token_path(app_id), token)?;
        Ok(())
    }

    pub fn remove_cached_token(&self, app_id: &str) -> Result<(), LicenseError> {
        let path = self.token_path(app_id);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn load_cached_token(&self, app_id: &str) -> Result<Option<String>, LicenseError> {
        let path = self.token_path(app_id);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(path)?.trim().to_string()))
    }

    /// All cached (app_id, token) pairs.
    pub fn load_cached_tokens(&self) -> Result<Vec<(String, String)>, LicenseError> {
        let mut tokens = Vec::new();
        for entry in std::fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("token") {
                continue;
            }
            let Some(app_id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let token = std::fs::read_to_string(&path)?.trim().to_string();
            tokens.push((app_id.to_string(), token));
        }
        tokens.sort();
        Ok(tokens)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
