//! Constants shared by the storage components.

/// Number of leading bytes inspected when sniffing an upload's content type.
pub const SNIFF_LEN: usize = 2048;

/// Prefix of in-flight upload files inside the store directory.
///
/// Sanitised names never start with a dot, so no client-supplied name can address these.
pub const TEMP_FILE_PREFIX: &str = ".upload-";

/// Default per-file size cap (2 GiB).
pub const DEFAULT_MAX_FILE_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Longest sanitised name, in bytes.
///
/// Leaves room for a 33-byte `<token>_` prefix under the common 255-byte filename limit.
pub const MAX_SANITIZED_NAME_BYTES: usize = 200;

/// How many fresh tokens `FileStore::save` tries when a no-clobber rename loses a race.
pub const MAX_PERSIST_ATTEMPTS: usize = 4;

/// Media type reported for content that matches no known signature and is not text.
pub const OPAQUE_BINARY_MEDIA_TYPE: &str = "application/octet-stream";

/// Media type reported for a zero-length upload.
pub const EMPTY_MEDIA_TYPE: &str = "application/x-empty";

/// Media type reported for UTF-8 text without NUL bytes.
pub const TEXT_MEDIA_TYPE: &str = "text/plain";

/// Device names Windows refuses as filenames, regardless of extension.
pub const WINDOWS_RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];
