//! In-flight uploads.

use crate::{FilesError, FilesResult};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use tempfile::NamedTempFile;

/// Chunk size used by [`UploadCandidate::copy_from`].
const COPY_BUFFER_LEN: usize = 64 * 1024;

/// An upload that is being received but has not been accepted yet.
///
/// Bytes go straight to a hidden temp file inside the store directory, so the whole body is
/// never held in memory and the final rename stays on one filesystem. Dropping a candidate
/// (rejected upload, client gone, error half way) removes the temp file.
///
/// Created by [`crate::FileStore::begin_upload`] and consumed by [`crate::FileStore::save`].
pub struct UploadCandidate {
    declared_name: String,
    sanitized_name: String,
    file: NamedTempFile,
    len: u64,
    max_len: u64,
    hasher: Sha256,
}

impl std::fmt::Debug for UploadCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadCandidate")
            .field("declared_name", &self.declared_name)
            .field("sanitized_name", &self.sanitized_name)
            .field("temp_path", &self.file.path())
            .field("len", &self.len)
            .field("max_len", &self.max_len)
            .finish_non_exhaustive()
    }
}

impl UploadCandidate {
    pub(crate) fn new(
        declared_name: &str,
        sanitized_name: String,
        file: NamedTempFile,
        max_len: u64,
    ) -> Self {
        Self {
            declared_name: declared_name.to_string(),
            sanitized_name,
            file,
            len: 0,
            max_len,
            hasher: Sha256::new(),
        }
    }

    /// The filename as the client sent it.
    pub fn declared_name(&self) -> &str {
        &self.declared_name
    }

    /// The declared name reduced to a safe bare filename.
    pub fn sanitized_name(&self) -> &str {
        &self.sanitized_name
    }

    /// Bytes received so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// True until the first non-empty chunk arrives.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends a chunk of the upload body.
    ///
    /// # Errors
    ///
    /// - [`FilesError::QuotaExceeded`] once the body would pass the per-file cap. The chunk is
    ///   not written and the candidate should be dropped.
    /// - [`FilesError::StorageUnavailable`] if the temp file cannot be written.
    pub fn write_chunk(&mut self, chunk: &[u8]) -> FilesResult<()> {
        let new_len = self.len.saturating_add(chunk.len() as u64);
        if new_len > self.max_len {
            return Err(FilesError::QuotaExceeded(format!(
                "file is larger than the {} byte limit",
                self.max_len
            )));
        }

        self.file.write_all(chunk)?;
        self.hasher.update(chunk);
        self.len = new_len;
        Ok(())
    }

    /// Streams an entire reader into the candidate, chunk by chunk.
    ///
    /// # Errors
    ///
    /// As for [`Self::write_chunk`], plus read errors from `reader`.
    pub fn copy_from<R: Read>(&mut self, reader: &mut R) -> FilesResult<u64> {
        let mut buffer = vec![0u8; COPY_BUFFER_LEN];
        let mut copied = 0u64;

        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(FilesError::StorageUnavailable(e)),
            };
            self.write_chunk(&buffer[..read])?;
            copied += read as u64;
        }

        Ok(copied)
    }

    pub(crate) fn content_mut(&mut self) -> &mut File {
        self.file.as_file_mut()
    }

    /// Flushes to disk and hands back the pieces `FileStore::save` needs.
    pub(crate) fn finish(mut self) -> FilesResult<FinishedUpload> {
        self.file.flush()?;
        self.file.as_file().sync_all()?;

        Ok(FinishedUpload {
            file: self.file,
            len: self.len,
            sha256: hex::encode(self.hasher.finalize()),
        })
    }
}

/// A fully received, flushed upload.
pub(crate) struct FinishedUpload {
    pub(crate) file: NamedTempFile,
    pub(crate) len: u64,
    pub(crate) sha256: String,
}
