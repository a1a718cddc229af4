//! Upload name and content-type validation
//!
//! Every check runs on the percent-decoded form of the client input. Decoding is
//! repeated until the value stops changing so double-encoded traversal such as
//! `%252e%252e%252f` cannot slip past a single decode.

use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::LazyLock;

use percent_encoding::percent_decode_str;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Maximum length of a stored file name, in bytes.
pub const MAX_FILE_NAME_BYTES: usize = 255;

/// Decode rounds accepted before a name is treated as hostile.
const MAX_DECODE_ROUNDS: usize = 3;

/// Extensions longer than this are not preserved when truncating.
const MAX_PRESERVED_EXTENSION_BYTES: usize = 32;

const FALLBACK_FILE_NAME: &str = "file";

/// Characters with meaning to a shell when next to a command separator.
const SHELL_METACHARACTERS: &[char] = &[';', '|', '&', '`', '$', '<', '>'];

/// Content types that are never accepted, whatever the allow-list says.
pub const DENIED_MIME_TYPES: &[&str] = &[
    "application/x-msdownload",
    "application/x-sh",
    "application/javascript",
    "text/javascript",
    "application/x-php",
    "application/x-httpd-php",
    "application/x-executable",
    "application/x-msdos-program",
    "application/x-dosexec",
    "application/x-csh",
    "application/x-bat",
    "application/ecmascript",
    "text/ecmascript",
    "text/x-php",
    "text/x-shellscript",
    "text/html",
    "application/xhtml+xml",
    "image/svg+xml",
];

/// Default document and image types accepted for upload.
pub const DEFAULT_ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/vnd.oasis.opendocument.text",
    "application/vnd.oasis.opendocument.spreadsheet",
    "application/vnd.oasis.opendocument.presentation",
    "text/plain",
    "text/csv",
    "text/markdown",
    "application/json",
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/webp",
];

/// Letters and marks of any script, digits, space, `_`, `-`, parentheses and `.`.
static SAFE_FILE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\p{L}\p{M}\p{N} _\-().]+$").expect("file name pattern compiles")
});

static UNSAFE_FILE_NAME_CHAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^\p{L}\p{M}\p{N} _\-().]").expect("file name pattern compiles")
});

/// Reason a file name was rejected. Logged, never returned to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FileNameRejection {
    #[error("name is empty")]
    Empty,
    #[error("name exceeds the maximum length")]
    TooLong,
    #[error("name is not valid UTF-8 once decoded")]
    InvalidEncoding,
    #[error("name is still percent-encoded after repeated decoding")]
    ExcessiveEncoding,
    #[error("parent directory traversal")]
    Traversal,
    #[error("absolute path prefix")]
    AbsolutePath,
    #[error("control character")]
    ControlCharacter,
    #[error("path separator")]
    PathSeparator,
    #[error("shell metacharacter")]
    ShellMetacharacter,
    #[error("leading or trailing whitespace")]
    SurroundingWhitespace,
    #[error("leading or trailing dot")]
    EdgeDot,
    #[error("more than one extension separator")]
    MultipleExtensions,
    #[error("character outside the allowed set")]
    DisallowedCharacter,
}

/// Why an upload candidate was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadRejection {
    #[error("unsafe file name: {0}")]
    UnsafeFileName(FileNameRejection),
    #[error("disallowed content type: {0}")]
    DisallowedMimeType(String),
}

impl From<UploadRejection> for AppError {
    fn from(rejection: UploadRejection) -> Self {
        AppError::InvalidFile(rejection.to_string())
    }
}

/// Outcome of [`UploadPathValidator::validate`]; a reject is a value, not a failure.
pub type UploadDecision = Result<(), UploadRejection>;

/// Client-declared upload metadata, as received at the upload boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadCandidate {
    #[serde(rename = "fileName")]
    pub raw_file_name: String,
    #[serde(rename = "mimeType")]
    pub declared_mime_type: String,
}

impl UploadCandidate {
    pub fn new(raw_file_name: impl Into<String>, declared_mime_type: impl Into<String>) -> Self {
        Self {
            raw_file_name: raw_file_name.into(),
            declared_mime_type: declared_mime_type.into(),
        }
    }
}

/// Percent-decode until a fixed point is reached.
fn decode_fully(name: &str) -> Result<Cow<'_, str>, FileNameRejection> {
    let mut current = Cow::Borrowed(name);
    for _ in 0..=MAX_DECODE_ROUNDS {
        let decoded = percent_decode_str(&current)
            .decode_utf8()
            .map_err(|_| FileNameRejection::InvalidEncoding)?
            .into_owned();
        if decoded == current.as_ref() {
            return Ok(current);
        }
        current = Cow::Owned(decoded);
    }
    Err(FileNameRejection::ExcessiveEncoding)
}

/// Lossy variant for the sanitizing path, which must never fail.
fn decode_lossy(name: &str) -> String {
    let mut current = name.to_string();
    for _ in 0..MAX_DECODE_ROUNDS {
        let decoded = percent_decode_str(&current).decode_utf8_lossy().into_owned();
        if decoded == current {
            break;
        }
        current = decoded;
    }
    current
}

fn has_drive_prefix(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(letter), Some(':')) if letter.is_ascii_alphabetic()
    )
}

fn has_shell_metacharacter(name: &str) -> bool {
    name.contains(SHELL_METACHARACTERS) || name.contains("$(")
}

/// Check a client-supplied file name, returning the decoded name on success.
pub fn check_file_name(name: &str) -> Result<Cow<'_, str>, FileNameRejection> {
    let decoded = decode_fully(name)?;
    let candidate = decoded.as_ref();

    if candidate.trim().is_empty() {
        return Err(FileNameRejection::Empty);
    }
    if candidate.len() > MAX_FILE_NAME_BYTES {
        return Err(FileNameRejection::TooLong);
    }
    if candidate.contains("..") {
        return Err(FileNameRejection::Traversal);
    }
    if candidate.starts_with(['/', '\\']) || has_drive_prefix(candidate) {
        return Err(FileNameRejection::AbsolutePath);
    }
    if candidate.chars().any(char::is_control) {
        return Err(FileNameRejection::ControlCharacter);
    }
    if candidate.contains(['/', '\\']) {
        return Err(FileNameRejection::PathSeparator);
    }
    if has_shell_metacharacter(candidate) {
        return Err(FileNameRejection::ShellMetacharacter);
    }
    if candidate.trim() != candidate {
        return Err(FileNameRejection::SurroundingWhitespace);
    }
    if candidate.starts_with('.') || candidate.ends_with('.') {
        return Err(FileNameRejection::EdgeDot);
    }
    if candidate.matches('.').count() > 1 {
        return Err(FileNameRejection::MultipleExtensions);
    }
    if !SAFE_FILE_NAME.is_match(candidate) {
        return Err(FileNameRejection::DisallowedCharacter);
    }

    Ok(decoded)
}

/// Whether a client-supplied file name may be stored as-is.
pub fn is_file_name_safe(name: &str) -> bool {
    check_file_name(name).is_ok()
}

/// Turn any client-supplied name into a flat, single-segment name.
///
/// Total: the output is never empty, never contains `..` and always passes
/// [`is_file_name_safe`].
pub fn sanitize_file_name(name: &str) -> String {
    let mut flat = decode_lossy(name);
    loop {
        let next = flat.replace("../", "").replace("..\\", "");
        if next == flat {
            break;
        }
        flat = next;
    }

    let last = flat.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last
        .chars()
        .filter(|c| !c.is_control() && !SHELL_METACHARACTERS.contains(c))
        .collect();
    let cleaned = UNSAFE_FILE_NAME_CHAR.replace_all(&cleaned, "_");
    let trimmed = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());

    // Only the last dot survives as the extension separator.
    let single_dot = match trimmed.rfind('.') {
        Some(idx) => format!("{}.{}", trimmed[..idx].replace('.', "_"), &trimmed[idx + 1..]),
        None => trimmed.to_string(),
    };

    let bounded = truncate_preserving_extension(&single_dot);
    if bounded.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        bounded
    }
}

fn truncate_to_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn trim_name_edges(s: &str) -> &str {
    s.trim_matches(|c: char| c == '.' || c.is_whitespace())
}

fn truncate_preserving_extension(name: &str) -> String {
    if name.len() <= MAX_FILE_NAME_BYTES {
        return name.to_string();
    }

    if let Some(idx) = name.rfind('.') {
        let extension = &name[idx..];
        if extension.len() <= MAX_PRESERVED_EXTENSION_BYTES {
            let budget = MAX_FILE_NAME_BYTES - extension.len();
            let stem = trim_name_edges(truncate_to_boundary(&name[..idx], budget));
            let stem = if stem.is_empty() { FALLBACK_FILE_NAME } else { stem };
            return format!("{}{}", stem, extension);
        }
    }

    trim_name_edges(truncate_to_boundary(name, MAX_FILE_NAME_BYTES)).to_string()
}

/// Lowercase the media type and drop any parameters (`; charset=...`).
pub fn normalize_mime_type(mime: &str) -> String {
    mime.split(';')
        .next()
        .map(|s| s.trim())
        .unwrap_or_default()
        .to_lowercase()
}

/// Accept/reject decisions for upload candidates.
///
/// The deny-list always wins; anything not on the allow-list is rejected.
#[derive(Debug, Clone)]
pub struct UploadPathValidator {
    allowed_mime_types: HashSet<String>,
}

impl Default for UploadPathValidator {
    fn default() -> Self {
        Self {
            allowed_mime_types: DEFAULT_ALLOWED_MIME_TYPES
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

impl UploadPathValidator {
    pub fn new<I, S>(allowed_mime_types: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed_mime_types: HashSet<String> = allowed_mime_types
            .into_iter()
            .map(|m| normalize_mime_type(m.as_ref()))
            .filter(|m| !m.is_empty())
            .collect();

        if allowed_mime_types.is_empty() {
            return Err(AppError::Configuration(
                "upload MIME allow-list cannot be empty".to_string(),
            ));
        }

        Ok(Self { allowed_mime_types })
    }

    pub fn is_mime_type_safe(&self, mime: &str) -> bool {
        let normalized = normalize_mime_type(mime);
        if normalized.is_empty() || DENIED_MIME_TYPES.contains(&normalized.as_str()) {
            return false;
        }
        self.allowed_mime_types.contains(&normalized)
    }

    pub fn is_file_name_safe(&self, name: &str) -> bool {
        is_file_name_safe(name)
    }

    pub fn sanitize_file_name(&self, name: &str) -> String {
        sanitize_file_name(name)
    }

    /// Both the name and the content type must pass before storage is touched.
    pub fn validate(&self, candidate: &UploadCandidate) -> UploadDecision {
        if let Err(reason) = check_file_name(&candidate.raw_file_name) {
            tracing::debug!(reason = %reason, "Upload rejected: unsafe file name");
            return Err(UploadRejection::UnsafeFileName(reason));
        }

        if !self.is_mime_type_safe(&candidate.declared_mime_type) {
            let normalized = normalize_mime_type(&candidate.declared_mime_type);
            tracing::debug!(mime_type = %normalized, "Upload rejected: content type not allowed");
            return Err(UploadRejection::DisallowedMimeType(normalized));
        }

        Ok(())
    }
}
