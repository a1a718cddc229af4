//! Upload pre-flight endpoints
//!
//! Clients ask whether a name/type pair would be accepted, or for a safe rendition
//! of a name, before sending any bytes.

use crate::auth::AuthContext;
use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, Json};
use docshare_core::UploadCandidate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct CheckUploadResponse {
    pub accepted: bool,
}

#[derive(Debug, Deserialize)]
pub struct SanitizeNameRequest {
    #[serde(rename = "fileName")]
    pub file_name: String,
}

#[derive(Debug, Serialize)]
pub struct SanitizeNameResponse {
    #[serde(rename = "safeName")]
    pub safe_name: String,
}

pub async fn check_upload(
    State(state): State<Arc<AppState>>,
    _context: AuthContext,
    ValidatedJson(candidate): ValidatedJson<UploadCandidate>,
) -> Result<Json<CheckUploadResponse>, HttpAppError> {
    let accepted = state.uploads.validator.validate(&candidate).is_ok();
    Ok(Json(CheckUploadResponse { accepted }))
}

pub async fn sanitize_name(
    State(state): State<Arc<AppState>>,
    _context: AuthContext,
    ValidatedJson(request): ValidatedJson<SanitizeNameRequest>,
) -> Result<Json<SanitizeNameResponse>, HttpAppError> {
    Ok(Json(SanitizeNameResponse {
        safe_name: state.uploads.validator.sanitize_file_name(&request.file_name),
    }))
}
