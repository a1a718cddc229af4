/// API path prefix for all versioned routes.
pub const API_PREFIX: &str = "/api/v0";

/// Multipart field carrying the uploaded document.
pub const UPLOAD_FIELD_NAME: &str = "file";

/// Content type assumed when a multipart part does not declare one.
pub const DEFAULT_UPLOAD_CONTENT_TYPE: &str = "application/octet-stream";

/// Extra room above the largest accepted upload for multipart framing.
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;
