//! Internal implementation of [`UploadToken`].

use crate::{UuidError, UuidResult};
use std::{fmt, str::FromStr};

/// Re-exported for convenience.
pub use ::uuid::Uuid;

/// A 128-bit random token in canonical form (32 lowercase hex characters, no hyphens).
///
/// The token only ever appears inside storage names, so its textual form is restricted to
/// characters that are legal in a filename on every platform the store runs on.
///
/// # Construction
/// - [`UploadToken::new`] draws a fresh version 4 UUID.
/// - [`UploadToken::parse`] validates an externally supplied token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UploadToken(Uuid);

impl Default for UploadToken {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadToken {
    /// Generates a fresh random token.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Validates and parses a token that must already be in canonical form.
    ///
    /// This does **not** normalise hyphenated or uppercase input.
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if `input` is not canonical.
    pub fn parse(input: &str) -> UuidResult<Self> {
        if !Self::is_canonical(input) {
            return Err(UuidError::InvalidInput(format!(
                "token must be 32 lowercase hex characters without hyphens, got: '{}'",
                input
            )));
        }

        Uuid::parse_str(input)
            .map(Self)
            .map_err(|e| UuidError::InvalidInput(e.to_string()))
    }

    /// Returns the underlying `uuid::Uuid`.
    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Returns true if `input` is in canonical token form.
    ///
    /// Purely syntactic: exactly 32 bytes, each one of `0-9` or `a-f`.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    /// Returns `<token>_<name>`, the form used for a storage name that collided.
    pub fn prefix(&self, name: &str) -> String {
        format!("{}_{}", self, name)
    }
}

impl fmt::Display for UploadToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for UploadToken {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UploadToken::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for UploadToken {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for UploadToken {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        UploadToken::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_generates_canonical_token() {
        let token = UploadToken::new();
        let canonical = token.to_string();

        assert_eq!(canonical.len(), 32);
        assert!(UploadToken::is_canonical(&canonical));
    }

    #[test]
    fn test_new_tokens_differ() {
        assert_ne!(UploadToken::new(), UploadToken::new());
    }

    #[test]
    fn test_parse_valid_canonical_token() {
        let canonical = "550e8400e29b41d4a716446655440000";
        let token = UploadToken::parse(canonical).unwrap();

        assert_eq!(token.to_string(), canonical);
    }

    #[test]
    fn test_parse_rejects_hyphenated() {
        let result = UploadToken::parse("550e8400-e29b-41d4-a716-446655440000");

        match result {
            Err(UuidError::InvalidInput(msg)) => {
                assert!(msg.contains("32 lowercase hex characters"));
            }
            _ => panic!("Expected InvalidInput error"),
        }
    }

    #[test]
    fn test_parse_rejects_non_canonical() {
        assert!(UploadToken::parse("550E8400E29B41D4A716446655440000").is_err());
        assert!(UploadToken::parse("550e8400e29b41d4a71644665544000").is_err());
        assert!(UploadToken::parse("550e8400e29b41d4a7164466554400000").is_err());
        assert!(UploadToken::parse("550e8400e29b41d4a716446655440zzz").is_err());
        assert!(UploadToken::parse("").is_err());
    }

    #[test]
    fn test_prefix_joins_with_underscore() {
        let token = UploadToken::parse("00112233445566778899aabbccddeeff").unwrap();

        assert_eq!(
            token.prefix("notes.txt"),
            "00112233445566778899aabbccddeeff_notes.txt"
        );
    }

    #[test]
    fn test_from_str_matches_parse() {
        let token: UploadToken = "aabbccddeeff00112233445566778899".parse().unwrap();
        assert_eq!(token.to_string(), "aabbccddeeff00112233445566778899");
    }

    #[test]
    fn test_serde_round_trip_uses_canonical_string() {
        let token = UploadToken::parse("aabbccddeeff00112233445566778899").unwrap();
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, "\"aabbccddeeff00112233445566778899\"");

        let rejected: Result<UploadToken, _> = serde_json::from_str("\"not-a-token\"");
        assert!(rejected.is_err());
    }
}
