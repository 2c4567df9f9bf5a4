//! In-memory object store.
//!
//! Objects live in a `tokio::sync::RwLock<HashMap<...>>`.  Used to run
//! the round-trip check without a real blob service.

use bytes::Bytes;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use super::backend::{ObjectReader, ObjectStore};

/// A stored object and the content type it was uploaded with.
#[derive(Debug, Clone)]
pub struct MemoryObject {
    pub data: Bytes,
    pub content_type: String,
}

/// In-memory store for a single bucket.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: tokio::sync::RwLock<HashMap<String, MemoryObject>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current copy of the object at `key`, if any.
    pub async fn object(&self, key: &str) -> Option<MemoryObject> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let key = key.to_string();
        let content_type = content_type.to_string();
        Box::pin(async move {
            self.objects
                .write()
                .await
                .insert(key, MemoryObject { data, content_type });
            Ok(())
        })
    }

    fn get_object(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ObjectReader>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let objects = self.objects.read().await;
            let object = objects
                .get(&key)
                .ok_or_else(|| anyhow::anyhow!("object not found: {key}"))?;
            let reader: ObjectReader = Box::pin(std::io::Cursor::new(object.data.clone()));
            Ok(reader)
        })
    }

    fn delete_object(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            // Deleting a missing key succeeds, as it does on S3.
            self.objects.write().await.remove(&key);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryObjectStore::new();
        store
            .put_object("devil.png", Bytes::from("hello world"), "text/plain")
            .await
            .unwrap();
        assert!(store.contains("devil.png").await);

        let mut reader = store.get_object("devil.png").await.unwrap();
        let mut body = Vec::new();
        reader.read_to_end(&mut body).await.unwrap();
        assert_eq!(body, b"hello world");

        store.delete_object("devil.png").await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_put_keeps_content_type() {
        let store = MemoryObjectStore::new();
        store
            .put_object("k", Bytes::from_static(b"\x89PNG"), "image/png")
            .await
            .unwrap();
        assert_eq!(store.object("k").await.unwrap().content_type, "image/png");
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let store = MemoryObjectStore::new();
        let err = store.get_object("nope").await.err().unwrap();
        assert!(err.to_string().contains("object not found"));
    }

    #[tokio::test]
    async fn test_delete_missing_key_succeeds() {
        let store = MemoryObjectStore::new();
        store.delete_object("nope").await.unwrap();
        assert_eq!(store.len().await, 0);
    }
}
