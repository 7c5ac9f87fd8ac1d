//! Attic file storage
//!
//! This crate owns everything that touches the upload directory of the attic file locker:
//!
//! - [`PathGuard`] maps a client-supplied name onto a path that is guaranteed to be a direct
//!   child of the store root.
//! - [`TypeValidator`] checks an upload's extension and its sniffed content type against an
//!   allow-list of [`TypeRule`]s.
//! - [`allocate_name`] picks a storage name that never overwrites an existing file.
//! - [`FileStore`] lists, saves, opens and deletes files, routing every name through the above.
//!
//! ## Store layout
//!
//! ```text
//! <store_root>/
//! ├── notes.txt
//! ├── 9f1c0a4e2b7d4c55a1e0b3f2d6c8e7a9_notes.txt   # second upload named notes.txt
//! └── .upload-Xk2p9q                                # in-flight upload, never listed
//! ```
//!
//! There is no index and no sidecar metadata: the directory listing is the source of truth.
//!
//! ## Example Usage
//!
//! ```no_run
//! use attic_files::{FileStore, StoreLimits, TypeValidator};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = FileStore::new(Path::new("uploads"), TypeValidator::default(), StoreLimits::default())?;
//!
//! let mut candidate = store.begin_upload("notes.txt")?;
//! candidate.write_chunk(b"remember the milk\n")?;
//! let saved = store.save(candidate)?;
//! println!("stored as {}", saved.stored.name);
//! # Ok(())
//! # }
//! ```

mod candidate;
mod constants;
mod files;
mod name_allocator;
mod path_guard;
mod type_validator;

pub use candidate::UploadCandidate;
pub use constants::{DEFAULT_MAX_FILE_BYTES, SNIFF_LEN, TEMP_FILE_PREFIX};
pub use files::{FileStore, OpenedFile, SavedUpload, StoreLimits, StoredFile};
pub use name_allocator::allocate_name;
pub use path_guard::{sanitize_file_name, PathGuard};
pub use type_validator::{sniff_media_type, TypeRule, TypeValidator, TypeVerdict};
pub use attic_uuid::UploadToken;

/// Errors that can occur during file operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Store root cannot be created or is not a directory
    #[error("Invalid store directory: {0}")]
    InvalidRootDirectory(String),

    /// Name is empty, or nothing usable is left once unsafe characters are stripped
    #[error("Invalid file name: {0}")]
    InvalidName(String),

    /// Name resolves, or attempts to resolve, outside the store directory
    #[error("Path escapes the store: {0}")]
    PathEscape(String),

    /// Name is valid but no stored file has it
    #[error("File not found: {0}")]
    NotFound(String),

    /// Upload failed the extension or content-type gate
    #[error("File type rejected: extension {extension:?}, detected {media_type}")]
    TypeRejected {
        /// Lower-cased extension of the declared name, if it had one
        extension: Option<String>,
        /// Media type sniffed from the content (or `unchecked` if the extension gate failed first)
        media_type: String,
    },

    /// Per-file or aggregate size cap exceeded
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// I/O failure in the store directory
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] std::io::Error),
}

/// Result type for file store operations.
pub type FilesResult<T> = Result<T, FilesError>;
