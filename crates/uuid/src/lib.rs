//! Random upload tokens.
//!
//! When an upload arrives under a name that is already taken in the store, the new file is
//! stored as `<token>_<name>`. The token is a version 4 UUID rendered in a *canonical* form:
//! **32 lowercase hexadecimal characters** (no hyphens).
//!
//! This crate provides [`UploadToken`], a wrapper that guarantees the canonical format once
//! constructed, so callers can splice it into a filename without further checks.
//!
//! ## Canonical form
//! - Length: 32
//! - Characters: `0-9` and `a-f` only
//! - Example: `550e8400e29b41d4a716446655440000`
//!
//! Non-canonical input (uppercase, hyphenated, wrong length, non-hex) is rejected by
//! [`UploadToken::parse`]. Parsing exists so tests and tools can inject a fixed token.

mod token;

pub use token::{Uuid, UploadToken};

/// Error type for token operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for token operations.
pub type UuidResult<T> = Result<T, UuidError>;
