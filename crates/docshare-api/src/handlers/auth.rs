use crate::auth::AuthContext;
use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, Json};
use docshare_core::{AppError, UserRole};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in_ms: i64,
    pub role: UserRole,
}

/// Exchange credentials for a bearer token.
///
/// The role is resolved here, once, and travels inside the token.
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<Json<LoginResponse>, HttpAppError> {
    let identity = state
        .auth
        .identity_provider
        .authenticate(&request.email, &request.password)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;

    let principal = state.auth.role_resolver.principal(
        identity.subject_id,
        identity.display_name,
        identity.email,
    );
    let token = state.auth.token_provider.issue(&principal)?;

    tracing::info!(
        subject_id = %principal.subject_id,
        role = %principal.role,
        "Token issued"
    );

    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer",
        expires_in_ms: state.auth.token_provider.lifetime_ms(),
        role: principal.role,
    }))
}

pub async fn me(context: AuthContext) -> Json<AuthContext> {
    Json(context)
}
