//! JSON bodies exchanged over the REST API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// One stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FileEntry {
    /// Storage name; use it for download and delete
    pub name: String,
    pub size_bytes: u64,
    /// RFC 3339 timestamp
    pub modified_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ListFilesRes {
    /// Sorted by name
    pub files: Vec<FileEntry>,
}

/// Returned with `201 Created` after an upload is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UploadRes {
    /// Storage name, which differs from `declared_name` after sanitising or a collision
    pub name: String,
    pub declared_name: String,
    pub size_bytes: u64,
    pub media_type: String,
    /// Hex SHA-256 of the stored content
    pub sha256: String,
    pub modified_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}

impl ErrorRes {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
