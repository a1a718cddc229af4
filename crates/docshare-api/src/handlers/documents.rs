use crate::auth::AuthContext;
use crate::constants::{DEFAULT_UPLOAD_CONTENT_TYPE, UPLOAD_FIELD_NAME};
use crate::error::HttpAppError;
use crate::state::AppState;
use crate::storage::StoredDocument;
use axum::{
    extract::{multipart::Field, Multipart, State},
    http::StatusCode,
    Json,
};
use bytes::{Bytes, BytesMut};
use docshare_core::validation::{check_file_name, normalize_mime_type, UploadRejection};
use docshare_core::{AppError, UploadCandidate};
use std::sync::Arc;

/// Read a part, refusing it as soon as it grows past `max_size`.
async fn read_limited(mut field: Field<'_>, max_size: usize) -> Result<Bytes, AppError> {
    let mut data = BytesMut::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Failed to read file data: {}", e)))?
    {
        if data.len() + chunk.len() > max_size {
            return Err(AppError::PayloadTooLarge(format!(
                "File size exceeds maximum allowed size of {} MB",
                max_size / 1024 / 1024
            )));
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data.freeze())
}

/// Accept a single document upload.
///
/// Name and declared type are checked before the body is read; storage is only
/// reached once both checks and the size limit have passed.
pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    context: AuthContext,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<StoredDocument>), HttpAppError> {
    let uploads = &state.uploads;
    // (decoded file name, normalized content type, body)
    let mut accepted: Option<(String, String, Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD_NAME) {
            continue;
        }
        if accepted.is_some() {
            return Err(AppError::InvalidInput(
                "Multiple file fields are not allowed; send exactly one field named 'file'"
                    .to_string(),
            )
            .into());
        }

        let candidate = UploadCandidate::new(
            field.file_name().unwrap_or_default(),
            field.content_type().unwrap_or(DEFAULT_UPLOAD_CONTENT_TYPE),
        );

        if let Err(rejection) = uploads.validator.validate(&candidate) {
            tracing::warn!(
                subject_id = %context.subject_id,
                reason = %rejection,
                "Upload rejected"
            );
            return Err(rejection.into());
        }

        let file_name = check_file_name(&candidate.raw_file_name)
            .map_err(UploadRejection::UnsafeFileName)?
            .into_owned();
        let content_type = normalize_mime_type(&candidate.declared_mime_type);

        let data = read_limited(field, uploads.max_upload_size_bytes).await?;
        accepted = Some((file_name, content_type, data));
    }

    let (file_name, content_type, data) =
        accepted.ok_or_else(|| AppError::InvalidInput("No file provided".to_string()))?;
    if data.is_empty() {
        return Err(AppError::InvalidInput("File is empty".to_string()).into());
    }

    let stored = uploads
        .storage
        .store(&file_name, &content_type, data)
        .await?;

    tracing::info!(
        subject_id = %context.subject_id,
        document_id = %stored.id,
        size_bytes = stored.size_bytes,
        "Document uploaded"
    );

    Ok((StatusCode::CREATED, Json(stored)))
}
