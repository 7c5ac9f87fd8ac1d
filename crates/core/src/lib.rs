//! # Attic Core
//!
//! Startup configuration and access control for the attic file locker.
//!
//! This crate sits between the binaries and the file store:
//! - [`CoreConfig`] is built once from the environment and opens the [`attic_files::FileStore`]
//! - [`AccessGate`] checks the single account's credentials before any store operation
//!
//! **No API concerns**: HTTP routing, header parsing and status codes belong in `api-rest` and
//! `api-shared`.

pub mod access;
pub mod config;
pub mod constants;
pub mod error;

pub use access::{hash_password, hash_password_with, AccessGate, Credential, Identity};
pub use config::{
    byte_limit_from_env_value, credential_from_env_values, extensions_from_env_value,
    rate_limit_from_env_value, rate_limits_from_env_values, store_dir_from_env_value,
    store_limits_from_env_values, CoreConfig, RateLimits,
};
pub use error::{CoreError, CoreResult};
