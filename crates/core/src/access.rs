//! Single-account access control.
//!
//! The locker has exactly one account. [`AccessGate::authenticate`] checks a presented
//! username/password pair against it and answers with an [`Identity`] or nothing; callers never
//! learn which half of the pair was wrong.
//!
//! Passwords are stored as Argon2 PHC strings. Verification always runs the full hash
//! comparison, even when the username does not match, so response time does not depend on
//! whether the username was right.

use crate::{CoreError, CoreResult};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use attic_types::NonEmptyText;
use subtle::ConstantTimeEq;

/// The configured account: a username and an Argon2 PHC hash.
#[derive(Clone)]
pub struct Credential {
    username: NonEmptyText,
    password_hash: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

impl Credential {
    /// Creates a credential from an existing PHC hash string.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidInput`] if `username` is blank
    /// - [`CoreError::InvalidPasswordHash`] if `password_hash` is not a PHC string
    pub fn new(username: &str, password_hash: impl Into<String>) -> CoreResult<Self> {
        let username = NonEmptyText::new(username)
            .map_err(|_| CoreError::InvalidInput("username cannot be empty".into()))?;
        let password_hash = password_hash.into();

        PasswordHash::new(&password_hash).map_err(CoreError::InvalidPasswordHash)?;

        Ok(Self {
            username,
            password_hash,
        })
    }

    /// Creates a credential by hashing a plaintext password with a fresh salt.
    pub fn from_password(username: &str, password: &str) -> CoreResult<Self> {
        Self::new(username, hash_password(password)?)
    }

    pub fn username(&self) -> &NonEmptyText {
        &self.username
    }
}

/// The authenticated account, handed to request handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    username: NonEmptyText,
}

impl Identity {
    pub fn username(&self) -> &NonEmptyText {
        &self.username
    }
}

/// Verifies credentials against the single configured account.
pub struct AccessGate {
    credential: Credential,
    argon2: Argon2<'static>,
}

impl std::fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate")
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}

impl AccessGate {
    pub fn new(credential: Credential) -> Self {
        Self {
            credential,
            argon2: Argon2::default(),
        }
    }

    /// Username of the configured account.
    pub fn username(&self) -> &NonEmptyText {
        &self.credential.username
    }

    /// Checks a username/password pair.
    ///
    /// Returns `None` for an unknown username and for a wrong password alike.
    pub fn authenticate(&self, username: &str, password: &str) -> Option<Identity> {
        // Checked at construction, so this only fails if the credential was tampered with.
        let hash = match PasswordHash::new(&self.credential.password_hash) {
            Ok(hash) => hash,
            Err(e) => {
                tracing::error!("stored password hash is unreadable: {}", e);
                return None;
            }
        };

        let password_ok = self
            .argon2
            .verify_password(password.as_bytes(), &hash)
            .is_ok();
        let username_ok: bool = username
            .as_bytes()
            .ct_eq(self.credential.username.as_str().as_bytes())
            .into();

        if password_ok & username_ok {
            tracing::debug!("authentication succeeded");
            Some(Identity {
                username: self.credential.username.clone(),
            })
        } else {
            tracing::warn!("authentication failed");
            None
        }
    }
}

/// Hashes `password` with the default Argon2id parameters and a random salt.
///
/// The result is a PHC string suitable for `ATTIC_PASSWORD_HASH`.
pub fn hash_password(password: &str) -> CoreResult<String> {
    hash_password_with(&Argon2::default(), password)
}

/// Hashes `password` with explicit Argon2 parameters.
pub fn hash_password_with(argon2: &Argon2<'_>, password: &str) -> CoreResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(CoreError::PasswordHashing)?;
    Ok(hash.to_string())
}

/// Minimum-cost Argon2 so tests do not spend seconds hashing.
#[cfg(test)]
pub(crate) fn cheap_argon2() -> Argon2<'static> {
    use argon2::{Algorithm, Params, Version};

    let params = Params::new(8, 1, 1, None).expect("valid argon2 params");
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> AccessGate {
        let hash = hash_password_with(&cheap_argon2(), "correct horse").unwrap();
        AccessGate::new(Credential::new("alice", hash).unwrap())
    }

    #[test]
    fn test_correct_pair_yields_identity() {
        let identity = gate().authenticate("alice", "correct horse").unwrap();
        assert_eq!(identity.username().as_str(), "alice");
    }

    #[test]
    fn test_wrong_password_yields_none() {
        assert!(gate().authenticate("alice", "battery staple").is_none());
    }

    #[test]
    fn test_unknown_user_yields_none() {
        assert!(gate().authenticate("mallory", "correct horse").is_none());
    }

    #[test]
    fn test_username_must_match_exactly() {
        let gate = gate();

        assert!(gate.authenticate("Alice", "correct horse").is_none());
        assert!(gate.authenticate("alice ", "correct horse").is_none());
        assert!(gate.authenticate("", "correct horse").is_none());
    }

    #[test]
    fn test_empty_password_yields_none() {
        assert!(gate().authenticate("alice", "").is_none());
    }

    #[test]
    fn test_hashes_are_salted() {
        let argon2 = cheap_argon2();
        let first = hash_password_with(&argon2, "same").unwrap();
        let second = hash_password_with(&argon2, "same").unwrap();

        assert_ne!(first, second);
        assert!(first.starts_with("$argon2id$"));
    }

    #[test]
    fn test_credential_rejects_blank_username() {
        let hash = hash_password_with(&cheap_argon2(), "pw").unwrap();
        assert!(matches!(
            Credential::new("   ", hash),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_debug_output_hides_hash() {
        let gate = gate();
        let rendered = format!("{:?}", gate);

        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("$argon2"));
    }

    #[test]
    fn test_username_prefixes_and_extensions_are_rejected() {
        let gate = gate();

        assert!(gate.authenticate("alic", "correct horse").is_none());
        assert!(gate.authenticate("alicf", "correct horse").is_none());
        assert!(gate.authenticate("alice\0", "correct horse").is_none());
        assert!(gate.authenticate("alicealice", "correct horse").is_none());
    }
}
