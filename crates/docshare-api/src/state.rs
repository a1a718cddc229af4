//! Application state
//!
//! Split into an auth sub-state and an upload sub-state so each handler group
//! reads only what it needs. Everything here is immutable after startup.

use crate::auth::{IdentityProvider, TokenProvider};
use crate::storage::DocumentStorage;
use docshare_core::{Config, HtmlSanitizer, RoleResolver, UploadPathValidator};
use std::sync::Arc;

/// Token issuance, credential checks and role resolution.
#[derive(Clone)]
pub struct AuthComponents {
    pub token_provider: Arc<TokenProvider>,
    pub identity_provider: Arc<dyn IdentityProvider>,
    pub role_resolver: RoleResolver,
}

/// Upload acceptance and the storage collaborator behind it.
#[derive(Clone)]
pub struct UploadComponents {
    pub validator: UploadPathValidator,
    pub storage: Arc<dyn DocumentStorage>,
    pub max_upload_size_bytes: usize,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub auth: AuthComponents,
    pub uploads: UploadComponents,
    pub sanitizer: HtmlSanitizer,
}
