//! # API Shared
//!
//! Shared utilities and definitions for the attic HTTP API.
//!
//! Contains:
//! - Request/response bodies (`dto` module), with OpenAPI schemas
//! - Shared services like `HealthService`
//! - HTTP Basic `Authorization` header decoding
//!
//! Used by `api-rest` and by clients that want typed responses.

pub mod auth;
pub mod dto;
pub mod health;

pub use auth::{
    basic_challenge, encode_basic_authorization, parse_basic_authorization, AuthHeaderError,
    BasicCredentials,
};
pub use dto::*;
pub use health::HealthService;
