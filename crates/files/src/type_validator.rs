//! Upload type validation.
//!
//! An upload is accepted only when two independent gates agree:
//!
//! 1. **Extension gate**: the lower-cased extension of the (sanitised) declared name belongs to
//!    one of the allowed [`TypeRule`]s.
//! 2. **Content gate**: the media type sniffed from the first [`SNIFF_LEN`] bytes is one of the
//!    media types listed by *that same rule*.
//!
//! Tying the content gate to the matched rule is what rejects a text file renamed to `.png`:
//! `text/plain` is allowed in general, but not for a PNG extension.
//!
//! Sniffing uses `infer` signatures. Content with no signature is reported as `text/plain` when
//! it is UTF-8 without NUL bytes, and as `application/octet-stream` otherwise. The opaque
//! binary type is only ever accepted through an explicitly named exception rule (retro-game
//! ROMs), never as a wildcard.

use crate::constants::{
    EMPTY_MEDIA_TYPE, OPAQUE_BINARY_MEDIA_TYPE, SNIFF_LEN, TEXT_MEDIA_TYPE,
};
use std::collections::BTreeSet;
use std::io::{self, Read, Seek, SeekFrom};

/// One family of allowed file types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRule {
    /// Short label used in logs and CLI output
    pub label: &'static str,
    /// Lower-case extensions without the leading dot
    pub extensions: Vec<String>,
    /// Media types the content must sniff as
    pub media_types: Vec<&'static str>,
    /// Set for the narrow exceptions that accept unrecognised binary content
    pub opaque_exception: bool,
}

impl TypeRule {
    fn new(label: &'static str, extensions: &[&str], media_types: &[&'static str]) -> Self {
        Self {
            label,
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
            media_types: media_types.to_vec(),
            opaque_exception: false,
        }
    }

    /// A rule for formats that carry no recognisable signature.
    fn opaque(label: &'static str, extensions: &[&str]) -> Self {
        Self {
            opaque_exception: true,
            ..Self::new(label, extensions, &[OPAQUE_BINARY_MEDIA_TYPE])
        }
    }

    fn matches_extension(&self, extension: &str) -> bool {
        self.extensions.iter().any(|e| e == extension)
    }

    fn accepts_media_type(&self, media_type: &str) -> bool {
        self.media_types.iter().any(|m| *m == media_type)
    }
}

/// Outcome of inspecting one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeVerdict {
    /// Lower-cased extension of the declared name
    pub extension: Option<String>,
    /// Media type sniffed from the content
    pub media_type: String,
    /// Label of the rule the extension matched
    pub rule: Option<&'static str>,
    /// True when both gates passed
    pub accepted: bool,
}

/// Allow-list driven validator for uploads.
#[derive(Debug, Clone)]
pub struct TypeValidator {
    rules: Vec<TypeRule>,
}

impl Default for TypeValidator {
    /// The built-in allow-list: documents, images, archives, audio, video and GBA ROMs.
    fn default() -> Self {
        Self {
            rules: vec![
                TypeRule::new("text", &["txt"], &[TEXT_MEDIA_TYPE]),
                TypeRule::new("pdf", &["pdf"], &["application/pdf"]),
                TypeRule::new("png", &["png"], &["image/png"]),
                TypeRule::new("jpeg", &["jpg", "jpeg"], &["image/jpeg"]),
                TypeRule::new("gif", &["gif"], &["image/gif"]),
                TypeRule::new("zip", &["zip"], &["application/zip"]),
                TypeRule::new("7z", &["7z"], &["application/x-7z-compressed"]),
                TypeRule::new(
                    "rar",
                    &["rar"],
                    &["application/vnd.rar", "application/x-rar-compressed"],
                ),
                TypeRule::new("mp3", &["mp3"], &["audio/mpeg"]),
                TypeRule::new("wav", &["wav"], &["audio/wav", "audio/x-wav"]),
                TypeRule::new("mp4", &["mp4"], &["video/mp4"]),
                TypeRule::new("matroska", &["mkv", "mpv"], &["video/x-matroska"]),
                // GBA cartridges start with an ARM branch, not a magic number.
                TypeRule::opaque("gba-rom", &["gba"]),
            ],
        }
    }
}

impl TypeValidator {
    /// Builds a validator from explicit rules.
    pub fn with_rules(rules: Vec<TypeRule>) -> Self {
        Self { rules }
    }

    /// Narrows the allow-list to the given extensions.
    ///
    /// Extensions not covered by any existing rule are ignored: restriction can only remove
    /// types, never add them.
    pub fn restricted_to<S: AsRef<str>>(self, extensions: &[S]) -> Self {
        let wanted: BTreeSet<String> = extensions
            .iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        let rules = self
            .rules
            .into_iter()
            .filter_map(|mut rule| {
                rule.extensions.retain(|e| wanted.contains(e));
                (!rule.extensions.is_empty()).then_some(rule)
            })
            .collect();

        Self { rules }
    }

    /// The rules currently in force.
    pub fn rules(&self) -> &[TypeRule] {
        &self.rules
    }

    /// Every allowed extension, sorted.
    pub fn allowed_extensions(&self) -> BTreeSet<&str> {
        self.rules
            .iter()
            .flat_map(|r| r.extensions.iter().map(String::as_str))
            .collect()
    }

    /// Every allowed media type, sorted.
    pub fn allowed_media_types(&self) -> BTreeSet<&'static str> {
        self.rules
            .iter()
            .flat_map(|r| r.media_types.iter().copied())
            .collect()
    }

    /// Returns the rule matching the extension of `file_name`, if any.
    pub fn rule_for_name(&self, file_name: &str) -> Option<&TypeRule> {
        let extension = extension_of(file_name)?;
        self.rules.iter().find(|r| r.matches_extension(&extension))
    }

    /// Extension gate on its own. Cheap enough to run before any bytes arrive.
    pub fn extension_allowed(&self, file_name: &str) -> bool {
        self.rule_for_name(file_name).is_some()
    }

    /// Runs both gates over `content`, leaving its position at the start.
    ///
    /// # Errors
    ///
    /// Returns any I/O error from reading or seeking `content`.
    pub fn inspect<R: Read + Seek>(
        &self,
        file_name: &str,
        content: &mut R,
    ) -> io::Result<TypeVerdict> {
        content.seek(SeekFrom::Start(0))?;
        let prefix = read_prefix(content, SNIFF_LEN)?;
        content.seek(SeekFrom::Start(0))?;

        let media_type = sniff_media_type(&prefix);
        let rule = self.rule_for_name(file_name);
        let accepted = rule.is_some_and(|r| r.accepts_media_type(&media_type));

        Ok(TypeVerdict {
            extension: extension_of(file_name),
            media_type,
            rule: rule.map(|r| r.label),
            accepted,
        })
    }

    /// Returns true when both gates pass. See [`Self::inspect`].
    pub fn validate<R: Read + Seek>(&self, file_name: &str, content: &mut R) -> io::Result<bool> {
        Ok(self.inspect(file_name, content)?.accepted)
    }
}

/// Lower-cased suffix after the final `.`, if that suffix is non-empty.
fn extension_of(file_name: &str) -> Option<String> {
    let (stem, extension) = file_name.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}

/// Reads up to `limit` bytes, tolerating short reads.
fn read_prefix<R: Read>(reader: &mut R, limit: usize) -> io::Result<Vec<u8>> {
    let mut prefix = Vec::with_capacity(limit);
    reader.take(limit as u64).read_to_end(&mut prefix)?;
    Ok(prefix)
}

/// Infers a media type from leading content bytes.
pub fn sniff_media_type(prefix: &[u8]) -> String {
    if prefix.is_empty() {
        return EMPTY_MEDIA_TYPE.to_string();
    }

    if let Some(kind) = infer::get(prefix) {
        return kind.mime_type().to_string();
    }

    if looks_like_text(prefix) {
        TEXT_MEDIA_TYPE.to_string()
    } else {
        OPAQUE_BINARY_MEDIA_TYPE.to_string()
    }
}

/// UTF-8 without NUL bytes. A multi-byte character cut off by the prefix limit still counts.
fn looks_like_text(prefix: &[u8]) -> bool {
    if prefix.contains(&0) {
        return false;
    }

    match std::str::from_utf8(prefix) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none() && prefix.len() - e.valid_up_to() < 4,
    }
}
