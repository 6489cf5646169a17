use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

use super::ObjectStore;
use crate::error::StorageError;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
}

/// Keeps objects in process memory. Used for local development without AWS
/// credentials and by the test suite.
pub struct MemoryStore {
    origin: String,
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl MemoryStore {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StorageError> {
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn presigned_url(&self, key: &str, expires_in: Duration) -> Result<String, StorageError> {
        Ok(format!("{}/{}?expires_in={}", self.origin, key, expires_in.as_secs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryStore::new("http://localhost:9000");
        store
            .put_object("images/a.png", Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();

        let object = store.get("images/a.png").await.unwrap();
        assert_eq!(object.body, Bytes::from_static(b"png"));
        assert_eq!(object.content_type, "image/png");

        store.delete_object("images/a.png").await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_presigned_url_shape() {
        let store = MemoryStore::new("http://localhost:9000");
        let url = store.presigned_url("videos/v.mp4", Duration::from_secs(60)).await.unwrap();
        assert_eq!(url, "http://localhost:9000/videos/v.mp4?expires_in=60");
    }
}
