use crate::auth::models::AuthContext;
use crate::auth::token::TokenProvider;
use crate::error::HttpAppError;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use docshare_core::AppError;
use std::sync::Arc;

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Clone, Debug)]
pub struct AuthState {
    pub token_provider: Arc<TokenProvider>,
}

fn unauthorized(reason: &str) -> Response {
    HttpAppError(AppError::Unauthorized(reason.to_string())).into_response()
}

/// Bearer token authentication.
///
/// Every refusal produces the same 401 body; the reason is only logged.
pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = match request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        Some(h) => h,
        None => return unauthorized("Missing authorization header"),
    };

    let token = match auth_header.strip_prefix(BEARER_PREFIX) {
        Some(token) => token.trim(),
        None => return unauthorized("Invalid authorization header format"),
    };

    let context = match auth_state
        .token_provider
        .claims(token)
        .and_then(AuthContext::from_claims)
    {
        Some(context) => context,
        None => return unauthorized("Invalid or expired token"),
    };

    tracing::debug!(subject_id = %context.subject_id, role = %context.role, "Request authenticated");

    request.extensions_mut().insert(context);
    next.run(request).await
}
