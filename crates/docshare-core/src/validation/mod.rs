//! Validation modules

pub mod html;
pub mod upload;

pub use html::{sanitize, sanitize_field, sanitize_html, HtmlSanitizer, SanitizationResult};
pub use upload::{
    check_file_name, is_file_name_safe, normalize_mime_type, sanitize_file_name,
    FileNameRejection, UploadCandidate, UploadDecision, UploadPathValidator, UploadRejection,
    DEFAULT_ALLOWED_MIME_TYPES, DENIED_MIME_TYPES, MAX_FILE_NAME_BYTES,
};
