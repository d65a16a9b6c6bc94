//! Blob storage backends. Keys are chosen by the caller and never reused.

use crate::error::BlobError;
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// A stored object as reported by a listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobEntry {
    pub key: String,
    pub last_modified: DateTime<Utc>,
}

/// Trait for blob storage backends
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Store `data` under `key` and return a locator for it.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<String, BlobError>;
    async fn get(&self, key: &str) -> Result<Bytes, BlobError>;
    /// Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), BlobError>;
    async fn list(&self, prefix: &str) -> Result<Vec<BlobEntry>, BlobError>;
}

/// S3-compatible blob storage implementation
pub struct S3BlobStorage {
    pub client: aws_sdk_s3::Client,
    pub bucket: String,
}

impl S3BlobStorage {
    /// Wrap `client`, creating `bucket` when it does not exist yet.
    pub async fn connect(client: aws_sdk_s3::Client, bucket: String) -> Result<Self, BlobError> {
        if client.head_bucket().bucket(&bucket).send().await.is_err() {
            info!(bucket = %bucket, "creating bucket");
            client
                .create_bucket()
                .bucket(&bucket)
                .send()
                .await
                .map_err(|e| BlobError::Unavailable(e.to_string()))?;
        }
        Ok(Self { client, bucket })
    }
}

#[async_trait]
impl BlobStorage for S3BlobStorage {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<String, BlobError> {
        debug!(bucket = %self.bucket, key, size = data.len(), "put object");
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| BlobError::Unavailable(e.to_string()))?;
        Ok(format!("s3://{}/{}", self.bucket, key))
    }

    async fn get(&self, key: &str) -> Result<Bytes, BlobError> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| match err.as_service_error() {
                Some(e) if e.is_no_such_key() => BlobError::NotFound(key.to_string()),
                _ => BlobError::Unavailable(err.to_string()),
            })?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| BlobError::Unavailable(e.to_string()))?;
        Ok(data.into_bytes())
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| BlobError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BlobEntry>, BlobError> {
        let mut entries = Vec::new();
        let mut continuation = None;
        loop {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| BlobError::Unavailable(e.to_string()))?;

            for object in resp.contents() {
                let (Some(key), Some(modified)) = (object.key(), object.last_modified()) else {
                    continue;
                };
                if let Some(last_modified) =
                    DateTime::<Utc>::from_timestamp(modified.secs(), modified.subsec_nanos())
                {
                    entries.push(BlobEntry {
                        key: key.to_string(),
                        last_modified,
                    });
                }
            }

            match resp.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }
        Ok(entries)
    }
}

struct StoredBlob {
    data: Bytes,
    content_type: String,
    last_modified: DateTime<Utc>,
}

/// Process-local blob storage for tests and single-node development.
#[derive(Default)]
pub struct MemoryBlobStorage {
    blobs: RwLock<HashMap<String, StoredBlob>>,
}

impl MemoryBlobStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.blobs.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    pub async fn content_type(&self, key: &str) -> Option<String> {
        self.blobs
            .read()
            .await
            .get(key)
            .map(|b| b.content_type.clone())
    }

    /// Overwrite the modification time of `key`. Returns false if absent.
    pub async fn set_last_modified(&self, key: &str, at: DateTime<Utc>) -> bool {
        match self.blobs.write().await.get_mut(key) {
            Some(blob) => {
                blob.last_modified = at;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl BlobStorage for MemoryBlobStorage {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<String, BlobError> {
        self.blobs.write().await.insert(
            key.to_string(),
            StoredBlob {
                data,
                content_type: content_type.to_string(),
                last_modified: Utc::now(),
            },
        );
        Ok(format!("memory://{}", key))
    }

    async fn get(&self, key: &str) -> Result<Bytes, BlobError> {
        self.blobs
            .read()
            .await
            .get(key)
            .map(|b| b.data.clone())
            .ok_or_else(|| BlobError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        self.blobs.write().await.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BlobEntry>, BlobError> {
        let blobs = self.blobs.read().await;
        let mut entries: Vec<BlobEntry> = blobs
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, blob)| BlobEntry {
                key: key.clone(),
                last_modified: blob.last_modified,
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_put_get_delete() {
        let store = MemoryBlobStorage::new();
        let locator = store
            .put("k1.txt", Bytes::from_static(b"hello"), "text/plain")
            .await
            .unwrap();
        assert_eq!(locator, "memory://k1.txt");
        assert_eq!(store.get("k1.txt").await.unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(store.content_type("k1.txt").await.as_deref(), Some("text/plain"));

        store.delete("k1.txt").await.unwrap();
        assert!(matches!(store.get("k1.txt").await, Err(BlobError::NotFound(_))));
        // idempotent
        store.delete("k1.txt").await.unwrap();
    }

    #[tokio::test]
    async fn memory_list_filters_by_prefix() {
        let store = MemoryBlobStorage::new();
        for key in ["a/1", "a/2", "b/1"] {
            store.put(key, Bytes::new(), "application/octet-stream").await.unwrap();
        }
        let keys: Vec<String> = store.list("a/").await.unwrap().into_iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["a/1".to_string(), "a/2".to_string()]);
        assert_eq!(store.list("").await.unwrap().len(), 3);
    }
}
