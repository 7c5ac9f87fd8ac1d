//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Environment variables are only read by the binaries; the helpers
//! here take the raw `Option<String>` values so they can be tested without touching the process
//! environment.

use crate::access::{AccessGate, Credential};
use crate::constants::{
    DEFAULT_RATE_LIMIT_PER_DAY, DEFAULT_RATE_LIMIT_PER_MINUTE, DEFAULT_STORE_DIR, LIST_SEPARATOR,
};
use crate::{CoreError, CoreResult};
use attic_files::{FileStore, StoreLimits, TypeValidator};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

/// Per-client request budgets for every route except the health check.
///
/// A request must fit both windows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimits {
    pub per_minute: NonZeroU32,
    pub per_day: NonZeroU32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
            per_day: DEFAULT_RATE_LIMIT_PER_DAY,
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    store_dir: PathBuf,
    credential: Credential,
    limits: StoreLimits,
    allowed_extensions: Vec<String>,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// An empty `allowed_extensions` keeps every built-in type rule.
    pub fn new(
        store_dir: PathBuf,
        credential: Credential,
        limits: StoreLimits,
        allowed_extensions: Vec<String>,
    ) -> CoreResult<Self> {
        if limits.max_file_bytes == 0 {
            return Err(CoreError::InvalidInput(
                "max_file_bytes must be greater than zero".into(),
            ));
        }

        if !allowed_extensions.is_empty()
            && TypeValidator::default()
                .restricted_to(&allowed_extensions)
                .rules()
                .is_empty()
        {
            return Err(CoreError::InvalidInput(
                "allowed extensions leave no file type uploadable".into(),
            ));
        }

        Ok(Self {
            store_dir,
            credential,
            limits,
            allowed_extensions,
        })
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn limits(&self) -> StoreLimits {
        self.limits
    }

    /// Built-in type rules narrowed to the configured extensions.
    pub fn type_validator(&self) -> TypeValidator {
        if self.allowed_extensions.is_empty() {
            TypeValidator::default()
        } else {
            TypeValidator::default().restricted_to(&self.allowed_extensions)
        }
    }

    /// Opens the file store this configuration describes.
    pub fn open_store(&self) -> CoreResult<FileStore> {
        Ok(FileStore::new(
            &self.store_dir,
            self.type_validator(),
            self.limits,
        )?)
    }

    /// Builds the access gate for the configured account.
    pub fn access_gate(&self) -> AccessGate {
        AccessGate::new(self.credential.clone())
    }
}

/// Resolve the store directory from an optional value, defaulting to `uploads`.
pub fn store_dir_from_env_value(value: Option<String>) -> PathBuf {
    non_blank(value)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR))
}

/// Parse a byte count such as `ATTIC_MAX_FILE_BYTES`.
///
/// `None` or whitespace yields `Ok(None)`. Anything else must be a positive integer.
pub fn byte_limit_from_env_value(
    name: &'static str,
    value: Option<String>,
) -> CoreResult<Option<u64>> {
    let Some(value) = non_blank(value) else {
        return Ok(None);
    };

    match value.parse::<u64>() {
        Ok(0) => Err(CoreError::InvalidConfig {
            name,
            reason: "must be greater than zero".into(),
        }),
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) => Err(CoreError::InvalidConfig {
            name,
            reason: e.to_string(),
        }),
    }
}

/// Build [`StoreLimits`] from the per-file and aggregate values.
pub fn store_limits_from_env_values(
    max_file_bytes: Option<String>,
    max_store_bytes: Option<String>,
) -> CoreResult<StoreLimits> {
    let defaults = StoreLimits::default();

    Ok(StoreLimits {
        max_file_bytes: byte_limit_from_env_value("ATTIC_MAX_FILE_BYTES", max_file_bytes)?
            .unwrap_or(defaults.max_file_bytes),
        max_store_bytes: byte_limit_from_env_value("ATTIC_MAX_STORE_BYTES", max_store_bytes)?,
    })
}

/// Parse a request count such as `ATTIC_RATE_LIMIT_PER_MINUTE`.
///
/// `None` or whitespace yields `Ok(None)`. Anything else must be a positive integer.
pub fn rate_limit_from_env_value(
    name: &'static str,
    value: Option<String>,
) -> CoreResult<Option<NonZeroU32>> {
    let Some(value) = non_blank(value) else {
        return Ok(None);
    };

    match value.parse::<u32>() {
        Ok(count) => NonZeroU32::new(count)
            .map(Some)
            .ok_or_else(|| CoreError::InvalidConfig {
                name,
                reason: "must be greater than zero".into(),
            }),
        Err(e) => Err(CoreError::InvalidConfig {
            name,
            reason: e.to_string(),
        }),
    }
}

/// Build [`RateLimits`] from the per-minute and per-day values.
pub fn rate_limits_from_env_values(
    per_minute: Option<String>,
    per_day: Option<String>,
) -> CoreResult<RateLimits> {
    let defaults = RateLimits::default();

    Ok(RateLimits {
        per_minute: rate_limit_from_env_value("ATTIC_RATE_LIMIT_PER_MINUTE", per_minute)?
            .unwrap_or(defaults.per_minute),
        per_day: rate_limit_from_env_value("ATTIC_RATE_LIMIT_PER_DAY", per_day)?
            .unwrap_or(defaults.per_day),
    })
}

/// Split a comma-separated extension list. Blank entries are dropped.
pub fn extensions_from_env_value(value: Option<String>) -> Vec<String> {
    non_blank(value)
        .map(|v| {
            v.split(LIST_SEPARATOR)
                .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Build the single account credential.
///
/// A PHC hash is preferred. A plaintext password is only hashed when no hash is supplied, and
/// is dropped as soon as the hash exists.
pub fn credential_from_env_values(
    username: Option<String>,
    password_hash: Option<String>,
    password: Option<String>,
) -> CoreResult<Credential> {
    let username = non_blank(username).ok_or(CoreError::MissingConfig("ATTIC_USERNAME"))?;

    if let Some(hash) = non_blank(password_hash) {
        return Credential::new(&username, hash);
    }

    // Plaintext is not trimmed: surrounding spaces may be part of the password.
    match password.filter(|p| !p.is_empty()) {
        Some(password) => Credential::from_password(&username, &password),
        None => Err(CoreError::MissingConfig(
            "ATTIC_PASSWORD_HASH or ATTIC_PASSWORD",
        )),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
