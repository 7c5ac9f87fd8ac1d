//! Store-root confinement for client-supplied names.
//!
//! Every name that arrives from a client (download, delete, or the declared name of an upload)
//! goes through [`PathGuard::resolve`] before any filesystem call is made with it.
//!
//! # Rules
//!
//! - NUL bytes make a name [`FilesError::InvalidName`].
//! - Absolute paths (`/x`, `\x`, `C:x`), any `..` component and any `../` or `..\` sequence
//!   are traversal attempts and yield [`FilesError::PathEscape`], even though sanitising would
//!   otherwise neutralise them.
//! - Everything else is reduced to a bare filename by [`sanitize_file_name`]. An empty
//!   result is [`FilesError::InvalidName`].
//! - The joined path is canonicalised and must be a direct child of the canonical root. A
//!   symlink in the store that points elsewhere yields [`FilesError::PathEscape`].

use crate::constants::{MAX_SANITIZED_NAME_BYTES, WINDOWS_RESERVED_NAMES};
use crate::{FilesError, FilesResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Resolves client-supplied names against a fixed, canonical store root.
#[derive(Debug, Clone)]
pub struct PathGuard {
    root: PathBuf,
}

impl PathGuard {
    /// Creates a guard for an existing directory.
    ///
    /// The root is canonicalised once here; every later comparison is against that form.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidRootDirectory`] if `root` does not exist, is not a
    /// directory, or cannot be canonicalised.
    pub fn new(root: &Path) -> FilesResult<Self> {
        if !root.is_dir() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Path is not a directory: {}",
                root.display()
            )));
        }

        let root = root.canonicalize().map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot canonicalize path {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(Self { root })
    }

    /// Returns the canonical store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `raw` to an absolute path directly inside the store root.
    ///
    /// The returned path is `<root>/<sanitised name>`; it is not required to exist.
    ///
    /// # Errors
    ///
    /// - [`FilesError::InvalidName`] for empty or unusable names.
    /// - [`FilesError::PathEscape`] for traversal attempts or escaping symlinks.
    /// - [`FilesError::StorageUnavailable`] if canonicalisation fails for a reason other than
    ///   the path not existing.
    pub fn resolve(&self, raw: &str) -> FilesResult<PathBuf> {
        if raw.contains('\0') {
            return Err(FilesError::InvalidName("name contains a NUL byte".into()));
        }

        if is_traversal_attempt(raw) {
            tracing::warn!(name = %raw.escape_debug(), "rejected traversal attempt");
            return Err(FilesError::PathEscape(
                "name contains directory traversal or an absolute prefix".into(),
            ));
        }

        let name = sanitize_file_name(raw)
            .ok_or_else(|| FilesError::InvalidName("name is empty after sanitising".into()))?;

        let candidate = self.root.join(&name);
        let canonical = match fs::canonicalize(&candidate) {
            Ok(path) => path,
            // Nothing there yet (or a dangling link): the joined path is already canonical
            // because the root is and `name` is a single normal component.
            Err(e) if e.kind() == ErrorKind::NotFound => candidate.clone(),
            Err(e) => return Err(FilesError::StorageUnavailable(e)),
        };

        if canonical.parent() != Some(self.root.as_path()) {
            tracing::warn!(name = %name, "resolved path escapes the store root");
            return Err(FilesError::PathEscape(
                "resolved path is outside the store".into(),
            ));
        }

        Ok(candidate)
    }
}

/// True for absolute names and names with a `..` component, under either separator.
fn is_traversal_attempt(raw: &str) -> bool {
    if raw.starts_with('/') || raw.starts_with('\\') {
        return true;
    }

    let bytes = raw.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return true;
    }

    if raw.contains("../") || raw.contains("..\\") {
        return true;
    }

    raw.split(['/', '\\']).any(|component| component.trim() == "..")
}

/// Reduces an arbitrary client filename to a bare, portable filename.
///
/// Only the final path component is kept. Whitespace becomes `_`; anything other than ASCII
/// letters, digits, `.`, `-` and `_` is dropped; leading and trailing dots and underscores are
/// trimmed. Windows device names are prefixed with `_`, and overlong names are shortened while
/// keeping the extension.
///
/// Returns `None` when nothing is left.
pub fn sanitize_file_name(raw: &str) -> Option<String> {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or_default();

    let mut name: String = last
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some('_')
            } else if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                Some(c)
            } else {
                None
            }
        })
        .collect();

    name = name.trim_matches(|c| c == '.' || c == '_').to_string();
    if name.is_empty() {
        return None;
    }

    let stem = name.split('.').next().unwrap_or_default();
    if WINDOWS_RESERVED_NAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(stem))
    {
        name.insert(0, '_');
    }

    if name.len() > MAX_SANITIZED_NAME_BYTES {
        name = shorten(&name, MAX_SANITIZED_NAME_BYTES);
    }

    Some(name)
}

/// Truncates an ASCII name to `max` bytes, keeping a short extension when there is one.
fn shorten(name: &str, max: usize) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.len() + 1 < max / 2 => {
            let keep = max - ext.len() - 1;
            format!("{}.{}", &stem[..keep.min(stem.len())], ext)
        }
        _ => name[..max].to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn guard() -> (TempDir, PathGuard) {
        let temp = TempDir::new().unwrap();
        let guard = PathGuard::new(temp.path()).unwrap();
        (temp, guard)
    }

    #[test]
    fn test_new_rejects_missing_root() {
        let temp = TempDir::new().unwrap();
        let result = PathGuard::new(&temp.path().join("missing"));

        assert!(matches!(result, Err(FilesError::InvalidRootDirectory(_))));
    }

    #[test]
    fn test_new_rejects_file_root() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file.txt");
        fs::write(&file, "not a directory").unwrap();

        assert!(matches!(
            PathGuard::new(&file),
            Err(FilesError::InvalidRootDirectory(_))
        ));
    }

    #[test]
    fn test_traversal_and_absolute_names_are_rejected() {
        let (_temp, guard) = guard();

        let attempts = [
            "../secret.txt",
            "../../etc/passwd",
            "a/../../b.txt",
            "..\\boot.ini",
            "notes/../..",
            "..",
            "/etc/passwd",
            "\\windows\\system32",
            "C:\\windows\\win.ini",
            "c:notes.txt",
            "foo../bar.txt",
            "....//etc/passwd",
            "x..\\y.txt",
        ];

        for raw in attempts {
            let result = guard.resolve(raw);
            assert!(
                matches!(result, Err(FilesError::PathEscape(_))),
                "expected PathEscape for {raw:?}, got {result:?}"
            );
        }
    }

    #[test]
    fn test_empty_and_unusable_names_are_invalid() {
        let (_temp, guard) = guard();

        for raw in ["", "   ", ".", "...", "___", "?*<>|", "dir/", "bad\0name.txt"] {
            let result = guard.resolve(raw);
            assert!(
                matches!(result, Err(FilesError::InvalidName(_))),
                "expected InvalidName for {raw:?}, got {result:?}"
            );
        }
    }

    #[test]
    fn test_safe_names_resolve_to_direct_children() {
        let (_temp, guard) = guard();

        for raw in [
            "notes.txt",
            "holiday photo.png",
            "docs/report.pdf",
            ".hidden",
            "résumé.pdf",
        ] {
            let path = guard.resolve(raw).unwrap();
            assert_eq!(path.parent(), Some(guard.root()), "for {raw:?}");
        }
    }

    #[test]
    fn test_existing_file_resolves_to_itself() {
        let (temp, guard) = guard();
        fs::write(temp.path().join("notes.txt"), b"hello").unwrap();

        let path = guard.resolve("notes.txt").unwrap();

        assert_eq!(path, guard.root().join("notes.txt"));
        assert!(path.is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_out_of_root_is_an_escape() {
        let outside = TempDir::new().unwrap();
        let secret = outside.path().join("secret.txt");
        fs::write(&secret, b"top secret").unwrap();

        let (temp, guard) = guard();
        std::os::unix::fs::symlink(&secret, temp.path().join("link.txt")).unwrap();

        assert!(matches!(
            guard.resolve("link.txt"),
            Err(FilesError::PathEscape(_))
        ));
    }

    #[test]
    fn test_sanitize_strips_directories_and_unsafe_characters() {
        assert_eq!(sanitize_file_name("notes.txt").as_deref(), Some("notes.txt"));
        assert_eq!(
            sanitize_file_name("my holiday (1).PNG").as_deref(),
            Some("my_holiday_1.PNG")
        );
        assert_eq!(
            sanitize_file_name("docs/2024/report.pdf").as_deref(),
            Some("report.pdf")
        );
        assert_eq!(
            sanitize_file_name("C:\\Users\\me\\cv.pdf").as_deref(),
            Some("cv.pdf")
        );
        assert_eq!(sanitize_file_name(".bashrc").as_deref(), Some("bashrc"));
        assert_eq!(sanitize_file_name("résumé.pdf").as_deref(), Some("rsum.pdf"));
        assert_eq!(sanitize_file_name("..."), None);
        assert_eq!(sanitize_file_name(""), None);
    }

    #[test]
    fn test_sanitize_never_produces_temp_file_names() {
        let name = sanitize_file_name(".upload-abc123").unwrap();
        assert!(!name.starts_with('.'));
    }

    #[test]
    fn test_sanitize_prefixes_windows_device_names() {
        assert_eq!(sanitize_file_name("CON").as_deref(), Some("_CON"));
        assert_eq!(sanitize_file_name("nul.txt").as_deref(), Some("_nul.txt"));
        assert_eq!(sanitize_file_name("console.txt").as_deref(), Some("console.txt"));
    }

    #[test]
    fn test_sanitize_shortens_long_names_and_keeps_extension() {
        let long = format!("{}.pdf", "a".repeat(400));
        let name = sanitize_file_name(&long).unwrap();

        assert_eq!(name.len(), MAX_SANITIZED_NAME_BYTES);
        assert!(name.ends_with(".pdf"));
    }
}
