use super::{DocumentStorage, StoredDocument};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use docshare_core::AppError;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Local filesystem storage
#[derive(Clone, Debug)]
pub struct LocalDocumentStorage {
    base_path: PathBuf,
}

impl LocalDocumentStorage {
    /// Create the storage root if needed.
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            AppError::Configuration(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Map a storage key to a path below the root; only plain relative segments are allowed.
    fn key_to_path(&self, storage_key: &str) -> Result<PathBuf, AppError> {
        let key = Path::new(storage_key);
        let only_normal = key
            .components()
            .all(|component| matches!(component, Component::Normal(_)));

        if storage_key.is_empty() || !only_normal || storage_key.contains('\\') {
            return Err(AppError::Storage(
                "Storage key contains invalid characters".to_string(),
            ));
        }

        Ok(self.base_path.join(key))
    }

    fn generate_key(id: Uuid, file_name: &str) -> String {
        format!("documents/{}/{}", id, file_name)
    }
}

async fn write_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await
}

/// Remove a partially written document and its per-document directory.
async fn discard_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial document");
        }
    }
    if let Some(parent) = path.parent() {
        // Fails harmlessly when the directory is not empty.
        let _ = fs::remove_dir(parent).await;
    }
}

#[async_trait]
impl DocumentStorage for LocalDocumentStorage {
    async fn store(
        &self,
        file_name: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<StoredDocument, AppError> {
        let id = Uuid::new_v4();
        let key = Self::generate_key(id, file_name);
        let path = self.key_to_path(&key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let start = std::time::Instant::now();

        if let Err(e) = write_file(&path, &data).await {
            discard_partial(&path).await;
            return Err(AppError::Storage(format!(
                "Failed to write file {}: {}",
                path.display(),
                e
            )));
        }

        tracing::info!(
            key = %key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Document stored"
        );

        Ok(StoredDocument {
            id,
            storage_key: key,
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            size_bytes: data.len() as u64,
            stored_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn stored_bytes(storage: &LocalDocumentStorage, key: &str) -> Vec<u8> {
        std::fs::read(storage.base_path().join(key)).unwrap()
    }

    #[tokio::test]
    async fn test_store_writes_below_root() {
        let dir = tempdir().unwrap();
        let storage = LocalDocumentStorage::new(dir.path()).await.unwrap();

        let stored = storage
            .store("report.pdf", "application/pdf", Bytes::from_static(b"%PDF-1.7"))
            .await
            .unwrap();

        assert!(stored.storage_key.starts_with("documents/"));
        assert!(stored.storage_key.ends_with("/report.pdf"));
        assert_eq!(stored.size_bytes, 8);
        assert_eq!(stored_bytes(&storage, &stored.storage_key), b"%PDF-1.7");
    }

    #[tokio::test]
    async fn test_same_name_gets_distinct_keys() {
        let dir = tempdir().unwrap();
        let storage = LocalDocumentStorage::new(dir.path()).await.unwrap();

        let first = storage
            .store("notes.txt", "text/plain", Bytes::from_static(b"one"))
            .await
            .unwrap();
        let second = storage
            .store("notes.txt", "text/plain", Bytes::from_static(b"two"))
            .await
            .unwrap();

        assert_ne!(first.storage_key, second.storage_key);
        assert_eq!(stored_bytes(&storage, &first.storage_key), b"one");
        assert_eq!(stored_bytes(&storage, &second.storage_key), b"two");
    }

    #[tokio::test]
    async fn test_keys_cannot_escape_root() {
        let dir = tempdir().unwrap();
        let storage = LocalDocumentStorage::new(dir.path()).await.unwrap();

        for key in ["../../../etc/passwd", "/etc/passwd", "a/../../b", "a\\..\\b", ""] {
            assert!(
                matches!(storage.key_to_path(key), Err(AppError::Storage(_))),
                "accepted {:?}",
                key
            );
        }
        assert!(storage
            .store("../escape.txt", "text/plain", Bytes::from_static(b"x"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_nothing_behind() {
        let dir = tempdir().unwrap();
        let storage = LocalDocumentStorage::new(dir.path()).await.unwrap();

        // Longer than any single path component the filesystem accepts.
        let file_name = format!("{}.txt", "a".repeat(300));
        let result = storage
            .store(&file_name, "text/plain", Bytes::from_static(b"partial"))
            .await;

        assert!(matches!(result, Err(AppError::Storage(_))));
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("documents"))
            .unwrap()
            .collect();
        assert!(leftovers.is_empty(), "left behind {:?}", leftovers);
    }
}
