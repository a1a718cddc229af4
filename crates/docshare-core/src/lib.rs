//! Docshare Core Library
//!
//! This crate provides the error taxonomy, configuration, principal model and the
//! pure validation components (upload name/type checks and HTML sanitization)
//! shared by every Docshare component. Nothing in here performs I/O.

pub mod config;
pub mod error;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use config::{Config, SecurityConfig, UploadConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{Principal, RoleResolver, UserRole};
pub use validation::{
    sanitize, sanitize_field, sanitize_html, HtmlSanitizer, SanitizationResult, UploadCandidate,
    UploadPathValidator, UploadRejection,
};
