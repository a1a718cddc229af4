//! Document storage collaborator
//!
//! Handlers only reach storage after an upload candidate has been accepted; the
//! backend still refuses keys that would leave its root.

pub mod local;

pub use local::LocalDocumentStorage;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use docshare_core::AppError;
use serde::Serialize;
use uuid::Uuid;

/// Record of a stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredDocument {
    pub id: Uuid,
    pub storage_key: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub stored_at: DateTime<Utc>,
}

#[async_trait]
pub trait DocumentStorage: Send + Sync {
    /// Persist an accepted document under a fresh key.
    ///
    /// A failed write leaves nothing behind under the storage root.
    async fn store(
        &self,
        file_name: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<StoredDocument, AppError>;
}
