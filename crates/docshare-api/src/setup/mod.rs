//! Application setup and initialization

pub mod routes;
pub mod server;
pub mod validation;

use crate::auth::{InMemoryIdentityProvider, TokenProvider};
use crate::state::{AppState, AuthComponents, UploadComponents};
use crate::storage::LocalDocumentStorage;
use anyhow::{Context, Result};
use docshare_core::{Config, HtmlSanitizer, RoleResolver, UploadPathValidator};
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Fail fast on misconfiguration, before anything is bound
    let warnings =
        validation::validate_config(&config).context("Configuration validation failed")?;

    docshare_infra::init_telemetry(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        &config.environment,
    )?;

    for warning in &warnings {
        tracing::warn!("{}", warning);
    }
    tracing::info!(warnings = warnings.len(), "Configuration loaded and validated successfully");

    let state = build_state(&config).await?;
    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}

/// Build the shared state: token provider, identity directory, validators and storage.
pub async fn build_state(config: &Config) -> Result<Arc<AppState>> {
    let token_provider = TokenProvider::new(
        &config.security.jwt_secret,
        config.security.token_lifetime_ms,
    )
    .context("Failed to create token provider")?;

    let identity_provider =
        InMemoryIdentityProvider::new().context("Failed to create identity directory")?;
    if let Some(user) = &config.bootstrap_user {
        let subject_id = identity_provider
            .register(&user.email, &user.password, &user.display_name)
            .await
            .context("Failed to register bootstrap user")?;
        tracing::info!(subject_id = %subject_id, "Bootstrap user registered");
    }

    let validator = UploadPathValidator::new(&config.uploads.allowed_mime_types)
        .context("Invalid upload MIME allow-list")?;

    let storage = LocalDocumentStorage::new(&config.uploads.local_storage_path)
        .await
        .context("Failed to initialize document storage")?;
    tracing::info!(path = %storage.base_path().display(), "Local document storage ready");

    Ok(Arc::new(AppState {
        config: config.clone(),
        auth: AuthComponents {
            token_provider: Arc::new(token_provider),
            identity_provider: Arc::new(identity_provider),
            role_resolver: RoleResolver::new(&config.security.admin_emails),
        },
        uploads: UploadComponents {
            validator,
            storage: Arc::new(storage),
            max_upload_size_bytes: config.uploads.max_upload_size_bytes,
        },
        sanitizer: HtmlSanitizer::new(),
    }))
}
