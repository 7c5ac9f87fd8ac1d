//! HTTP Basic authentication header handling.
//!
//! Only the wire format lives here. Checking the decoded pair against the configured account is
//! the job of `attic_core::AccessGate`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Username and password decoded from an `Authorization: Basic ...` header.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthHeaderError {
    #[error("authorization scheme is not Basic")]
    NotBasic,
    #[error("authorization value is not valid base64")]
    InvalidBase64,
    #[error("authorization value is not valid UTF-8")]
    InvalidUtf8,
    #[error("authorization value has no ':' separator")]
    MissingSeparator,
}

/// Decodes the value of an `Authorization` header.
///
/// The scheme name is matched case-insensitively. The password may itself contain `:`; only
/// the first colon separates it from the username.
pub fn parse_basic_authorization(header: &str) -> Result<BasicCredentials, AuthHeaderError> {
    let (scheme, encoded) = header
        .trim()
        .split_once(' ')
        .ok_or(AuthHeaderError::NotBasic)?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(AuthHeaderError::NotBasic);
    }

    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|_| AuthHeaderError::InvalidBase64)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AuthHeaderError::InvalidUtf8)?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or(AuthHeaderError::MissingSeparator)?;

    Ok(BasicCredentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// Value for a `WWW-Authenticate` response header.
pub fn basic_challenge(realm: &str) -> String {
    format!("Basic realm=\"{}\"", realm)
}

/// Value for an `Authorization` request header. Used by clients and tests.
pub fn encode_basic_authorization(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
}
