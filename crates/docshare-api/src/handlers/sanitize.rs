use crate::auth::AuthContext;
use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, Json};
use docshare_core::SanitizationResult;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct SanitizeRequest {
    pub text: String,
}

/// Run free text through the HTML sanitizer and return both forms.
pub async fn sanitize_text(
    State(state): State<Arc<AppState>>,
    _context: AuthContext,
    ValidatedJson(request): ValidatedJson<SanitizeRequest>,
) -> Result<Json<SanitizationResult>, HttpAppError> {
    let result = state.sanitizer.sanitize_field(&request.text);
    if result.was_modified() {
        tracing::debug!(
            original_len = result.original.len(),
            cleaned_len = result.cleaned.len(),
            "Markup removed from submitted text"
        );
    }
    Ok(Json(result))
}
