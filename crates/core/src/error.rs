#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),
    #[error("invalid configuration value for {name}: {reason}")]
    InvalidConfig { name: &'static str, reason: String },
    #[error("invalid password hash: {0}")]
    InvalidPasswordHash(argon2::password_hash::Error),
    #[error("failed to hash password: {0}")]
    PasswordHashing(argon2::password_hash::Error),

    #[error("file store error: {0}")]
    Files(#[from] attic_files::FilesError),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
