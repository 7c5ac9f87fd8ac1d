//! Store directory service implementation
//!
//! This module provides [`FileStore`], the only component that performs filesystem I/O under
//! the store root.
//!
//! # Operations
//!
//! - **List**: regular files directly under the root, sorted by name. In-flight uploads and
//!   subdirectories are skipped.
//! - **Save**: sanitise, type-check, allocate a name, enforce quotas, then rename the temp file
//!   into place without clobbering.
//! - **Open**: resolve through [`PathGuard`] and open for reading.
//! - **Delete**: resolve through [`PathGuard`] and remove. Deleting a missing file succeeds.
//!
//! # Atomicity
//!
//! Uploads are written to a `.upload-*` temp file in the store directory and moved to their
//! final name with a single no-clobber rename. A concurrent `list` or `open` sees either no
//! file or the complete file, and an existing file can never be replaced.
//!
//! # Implementation Notes
//!
//! - There is no index; every `list` reads the directory.
//! - Temp files left behind by a crash are removed when the store is opened.
//! - The service implements `Debug` but not `Clone`; share it behind an `Arc`.

use crate::candidate::UploadCandidate;
use crate::constants::{DEFAULT_MAX_FILE_BYTES, MAX_PERSIST_ATTEMPTS, TEMP_FILE_PREFIX};
use crate::name_allocator::allocate_name;
use crate::path_guard::{sanitize_file_name, PathGuard};
use crate::type_validator::TypeValidator;
use crate::{FilesError, FilesResult};
use attic_types::NonEmptyText;
use attic_uuid::UploadToken;
use chrono::{DateTime, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// A file in the store, as seen by the filesystem.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct StoredFile {
    /// Storage name, unique within the store
    pub name: NonEmptyText,

    /// Size of the file in bytes
    pub size_bytes: u64,

    /// Last modification time reported by the filesystem
    pub modified_at: DateTime<Utc>,
}

/// Result of a successful [`FileStore::save`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct SavedUpload {
    /// The file as now stored
    pub stored: StoredFile,

    /// Name the client declared for the upload
    pub declared_name: String,

    /// Media type sniffed from the content
    pub media_type: String,

    /// Hexadecimal SHA-256 digest of the content
    pub sha256: String,
}

/// A stored file opened for reading.
#[derive(Debug)]
pub struct OpenedFile {
    /// Read handle positioned at the start
    pub file: fs::File,

    /// Name, size and modification time
    pub stored: StoredFile,
}

/// Size caps enforced on uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    /// Largest single upload, in bytes
    pub max_file_bytes: u64,

    /// Largest total size of all stored files, if capped
    pub max_store_bytes: Option<u64>,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_store_bytes: None,
        }
    }
}

/// Service owning the store directory.
///
/// # Design
///
/// - Every client-supplied name goes through [`PathGuard`]
/// - Uploads pass [`TypeValidator`] before they become visible
/// - Storage names come from [`allocate_name`], so nothing is ever overwritten
#[derive(Debug)]
pub struct FileStore {
    guard: PathGuard,
    validator: TypeValidator,
    limits: StoreLimits,
}

impl FileStore {
    /// Opens the store at `root`, creating the directory if needed.
    ///
    /// Leftover temp files from interrupted uploads are removed.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if:
    /// - The directory cannot be created or is not a directory
    /// - Path canonicalisation fails
    pub fn new(root: &Path, validator: TypeValidator, limits: StoreLimits) -> FilesResult<Self> {
        fs::create_dir_all(root).map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot create directory {}: {}",
                root.display(),
                e
            ))
        })?;

        let store = Self {
            guard: PathGuard::new(root)?,
            validator,
            limits,
        };
        store.remove_stale_uploads();

        tracing::info!(root = %store.root().display(), "file store ready");
        Ok(store)
    }

    /// Canonical store root.
    pub fn root(&self) -> &Path {
        self.guard.root()
    }

    /// Validator applied to uploads.
    pub fn validator(&self) -> &TypeValidator {
        &self.validator
    }

    /// Size caps applied to uploads.
    pub fn limits(&self) -> StoreLimits {
        self.limits
    }

    /// Lists stored files in ascending name order.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::StorageUnavailable`] if the directory cannot be read.
    pub fn list(&self) -> FilesResult<Vec<StoredFile>> {
        let mut files = Vec::new();

        for entry in fs::read_dir(self.root())? {
            let entry = entry?;

            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                tracing::warn!(path = %entry.path().display(), "skipping non UTF-8 file name");
                continue;
            };
            if name.starts_with(TEMP_FILE_PREFIX) {
                continue;
            }

            // `DirEntry::metadata` does not follow symlinks, so links are skipped here too.
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                // Removed between read_dir and stat.
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if !metadata.is_file() {
                continue;
            }

            if let Some(stored) = stored_file(&name, &metadata) {
                files.push(stored);
            }
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    /// Starts receiving an upload declared as `declared_name`.
    ///
    /// The name and its extension are checked here, before any content arrives, so a client
    /// cannot stream a large body only to be rejected on the name.
    ///
    /// # Errors
    ///
    /// - [`FilesError::InvalidName`] if nothing usable is left of the name
    /// - [`FilesError::TypeRejected`] if the extension is not allowed
    /// - [`FilesError::StorageUnavailable`] if the temp file cannot be created
    pub fn begin_upload(&self, declared_name: &str) -> FilesResult<UploadCandidate> {
        let sanitized = sanitize_file_name(declared_name)
            .ok_or_else(|| FilesError::InvalidName("upload name is empty after sanitising".into()))?;

        if !self.validator.extension_allowed(&sanitized) {
            tracing::warn!(name = %sanitized, "upload rejected on extension");
            return Err(FilesError::TypeRejected {
                extension: extension_label(&sanitized),
                media_type: "unchecked".into(),
            });
        }

        let file = tempfile::Builder::new()
            .prefix(TEMP_FILE_PREFIX)
            .tempfile_in(self.root())?;

        Ok(UploadCandidate::new(
            declared_name,
            sanitized,
            file,
            self.limits.max_file_bytes,
        ))
    }

    /// Validates a fully received upload and moves it into the store.
    ///
    /// # Errors
    ///
    /// - [`FilesError::TypeRejected`] if the content does not match the extension's rule
    /// - [`FilesError::QuotaExceeded`] if the aggregate cap would be exceeded
    /// - [`FilesError::InvalidName`] / [`FilesError::PathEscape`] from path resolution
    /// - [`FilesError::StorageUnavailable`] on I/O failure
    ///
    /// On any error the candidate's temp file is removed.
    pub fn save(&self, candidate: UploadCandidate) -> FilesResult<SavedUpload> {
        self.save_with_tokens(candidate, UploadToken::new)
    }

    fn save_with_tokens<T>(
        &self,
        mut candidate: UploadCandidate,
        mut next_token: T,
    ) -> FilesResult<SavedUpload>
    where
        T: FnMut() -> UploadToken,
    {
        let sanitized = candidate.sanitized_name().to_string();
        let declared = candidate.declared_name().to_string();

        let verdict = self.validator.inspect(&sanitized, candidate.content_mut())?;
        if !verdict.accepted {
            tracing::warn!(
                name = %sanitized,
                media_type = %verdict.media_type,
                "upload rejected on content"
            );
            return Err(FilesError::TypeRejected {
                extension: verdict.extension,
                media_type: verdict.media_type,
            });
        }

        self.check_store_quota(candidate.len())?;

        let finished = candidate.finish()?;
        let mut temp = finished.file;

        for _ in 0..MAX_PERSIST_ATTEMPTS {
            let taken = |n: &str| fs::symlink_metadata(self.root().join(n)).is_ok();
            let name = allocate_name(&sanitized, taken, &next_token());
            let target = self.guard.resolve(&name)?;

            match temp.persist_noclobber(&target) {
                Ok(file) => {
                    let metadata = file.metadata()?;
                    let stored = stored_file(&name, &metadata).ok_or_else(|| {
                        FilesError::InvalidName("allocated name is empty".into())
                    })?;

                    tracing::info!(
                        name = %stored.name,
                        size_bytes = finished.len,
                        media_type = %verdict.media_type,
                        "upload stored"
                    );

                    return Ok(SavedUpload {
                        stored,
                        declared_name: declared,
                        media_type: verdict.media_type,
                        sha256: finished.sha256,
                    });
                }
                Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                    tracing::debug!(name = %name, "storage name taken during rename, retrying");
                    temp = e.file;
                }
                Err(e) => return Err(FilesError::StorageUnavailable(e.error)),
            }
        }

        Err(FilesError::StorageUnavailable(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no free storage name found for {}", sanitized),
        )))
    }

    /// Opens a stored file for reading.
    ///
    /// # Errors
    ///
    /// - [`FilesError::InvalidName`] / [`FilesError::PathEscape`] from path resolution
    /// - [`FilesError::NotFound`] if no regular file has that name
    /// - [`FilesError::StorageUnavailable`] if the file cannot be opened
    pub fn open(&self, name: &str) -> FilesResult<OpenedFile> {
        let path = self.guard.resolve(name)?;
        let stored_name = file_name_of(&path);

        let metadata = match fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Err(FilesError::NotFound(stored_name)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(FilesError::NotFound(stored_name))
            }
            Err(e) => return Err(e.into()),
        };

        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(FilesError::NotFound(stored_name))
            }
            Err(e) => return Err(e.into()),
        };

        let stored = stored_file(&stored_name, &metadata)
            .ok_or_else(|| FilesError::InvalidName("resolved name is empty".into()))?;

        Ok(OpenedFile { file, stored })
    }

    /// Reads a stored file fully into memory.
    ///
    /// Intended for small files and tests; downloads stream from [`Self::open`].
    pub fn read(&self, name: &str) -> FilesResult<Vec<u8>> {
        let mut opened = self.open(name)?;
        let mut buffer = Vec::with_capacity(opened.stored.size_bytes as usize);
        std::io::Read::read_to_end(&mut opened.file, &mut buffer)?;
        Ok(buffer)
    }

    /// Deletes a stored file.
    ///
    /// Returns `Ok(true)` if a file was removed and `Ok(false)` if there was nothing to remove;
    /// both are success.
    ///
    /// # Errors
    ///
    /// - [`FilesError::InvalidName`] / [`FilesError::PathEscape`] from path resolution
    /// - [`FilesError::StorageUnavailable`] if removal fails
    pub fn delete(&self, name: &str) -> FilesResult<bool> {
        let path = self.guard.resolve(name)?;

        match fs::symlink_metadata(&path) {
            Ok(metadata) if metadata.is_dir() => {
                tracing::warn!(path = %path.display(), "refusing to delete a directory");
                return Ok(false);
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(name = %file_name_of(&path), "file deleted");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn check_store_quota(&self, incoming: u64) -> FilesResult<()> {
        let Some(max_store_bytes) = self.limits.max_store_bytes else {
            return Ok(());
        };

        let used: u64 = self.list()?.iter().map(|f| f.size_bytes).sum();
        if used.saturating_add(incoming) > max_store_bytes {
            return Err(FilesError::QuotaExceeded(format!(
                "store would exceed its {} byte limit",
                max_store_bytes
            )));
        }

        Ok(())
    }

    fn remove_stale_uploads(&self) {
        let Ok(entries) = fs::read_dir(self.root()) else {
            return;
        };

        for entry in entries.flatten() {
            let is_temp = entry
                .file_name()
                .to_str()
                .is_some_and(|n| n.starts_with(TEMP_FILE_PREFIX));
            if !is_temp {
                continue;
            }

            match fs::remove_file(entry.path()) {
                Ok(()) => tracing::info!(path = %entry.path().display(), "removed stale upload"),
                Err(e) => tracing::warn!(
                    path = %entry.path().display(),
                    "failed to remove stale upload: {}",
                    e
                ),
            }
        }
    }
}

fn stored_file(name: &str, metadata: &fs::Metadata) -> Option<StoredFile> {
    let modified_at = metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());

    Some(StoredFile {
        name: NonEmptyText::new_untrimmed(name).ok()?,
        size_bytes: metadata.len(),
        modified_at,
    })
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}

fn extension_label(name: &str) -> Option<String> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}
