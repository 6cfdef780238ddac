use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_stream::StreamExt;

use crate::domain::{
    bridge::BridgeReader,
    provider::{
        DeleteResult, DownloadResult, ProviderError, StorageProvider, TransferArguments,
        UploadResult, DEFAULT_CONTENT_TYPE,
    },
};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
}

/// In-process provider. Everything is lost when the instance is dropped.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object directly, bypassing the streaming upload path
    pub async fn insert(&self, path: &str, content_type: &str, data: impl Into<Bytes>) {
        self.objects.write().await.insert(
            path.to_string(),
            StoredObject {
                data: data.into(),
                content_type: content_type.to_string(),
            },
        );
    }

    pub async fn get(&self, path: &str) -> Option<Bytes> {
        self.objects.read().await.get(path).map(|o| o.data.clone())
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl StorageProvider for MemoryStorage {
    async fn download(&self, args: &TransferArguments) -> Result<DownloadResult, ProviderError> {
        let object = self
            .objects
            .read()
            .await
            .get(&args.path)
            .cloned()
            .ok_or(ProviderError::NotFound)?;

        Ok(DownloadResult {
            content_type: object.content_type,
            content: Box::new(Cursor::new(object.data)),
        })
    }

    async fn upload(
        &self,
        mut source: BridgeReader,
        args: &TransferArguments,
    ) -> Result<UploadResult, ProviderError> {
        let mut buffer = BytesMut::new();
        while let Some(chunk) = source.next().await {
            // an aborted bridge ends with an error, so nothing partial is kept
            buffer.extend_from_slice(&chunk?);
        }
        let size = buffer.len();

        let previous = self.objects.write().await.insert(
            args.path.clone(),
            StoredObject {
                data: buffer.freeze(),
                content_type: DEFAULT_CONTENT_TYPE.to_string(),
            },
        );

        tracing::debug!("Stored {} bytes at {}", size, args.path);

        Ok(UploadResult {
            status: if previous.is_some() { 200 } else { 201 },
            metadata: Some(serde_json::json!({
                "path": args.path,
                "size": size,
            })),
        })
    }

    async fn delete(&self, args: &TransferArguments) -> Result<DeleteResult, ProviderError> {
        self.objects
            .write()
            .await
            .remove(&args.path)
            .ok_or(ProviderError::NotFound)?;
        Ok(DeleteResult { status: 204 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bridge::stream_bridge;
    use tokio::io::AsyncReadExt;

    fn args(path: &str) -> TransferArguments {
        TransferArguments::new("memory", path)
    }

    #[tokio::test]
    async fn test_upload_then_download() {
        let storage = MemoryStorage::new();
        let (mut writer, reader) = stream_bridge();
        writer.push(Bytes::from_static(b"abc")).unwrap();
        writer.push(Bytes::from_static(b"def")).unwrap();
        writer.close();

        let result = storage.upload(reader, &args("/f.bin")).await.unwrap();
        assert_eq!(result.status, 201);

        let mut download = storage.download(&args("/f.bin")).await.unwrap();
        let mut data = Vec::new();
        download.content.read_to_end(&mut data).await.unwrap();
        assert_eq!(data, b"abcdef");
        assert_eq!(download.content_type, DEFAULT_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn test_replacing_returns_ok() {
        let storage = MemoryStorage::new();
        storage.insert("/f.bin", "text/plain", "old").await;

        let (mut writer, reader) = stream_bridge();
        writer.push(Bytes::from_static(b"new")).unwrap();
        writer.close();

        let result = storage.upload(reader, &args("/f.bin")).await.unwrap();
        assert_eq!(result.status, 200);
        assert_eq!(storage.get("/f.bin").await.unwrap(), Bytes::from_static(b"new"));
    }

    #[tokio::test]
    async fn test_aborted_upload_is_not_stored() {
        let storage = MemoryStorage::new();
        let (mut writer, reader) = stream_bridge();
        writer.push(Bytes::from_static(b"trunc")).unwrap();
        writer.abort();

        let err = storage.upload(reader, &args("/f.bin")).await.unwrap_err();
        assert!(matches!(err, ProviderError::Io(_)));
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_uploads_stay_separate() {
        let storage = MemoryStorage::new();
        let (mut left, left_reader) = stream_bridge();
        let (mut right, right_reader) = stream_bridge();
        let (mut lost, lost_reader) = stream_bridge();

        let tasks = [
            (left_reader, "/left.bin"),
            (right_reader, "/right.bin"),
            (lost_reader, "/right.bin"),
        ]
        .map(|(reader, path)| {
            let storage = storage.clone();
            tokio::spawn(async move { storage.upload(reader, &args(path)).await })
        });

        // chunks from the three sessions arrive interleaved
        left.push(Bytes::from_static(b"l1")).unwrap();
        right.push(Bytes::from_static(b"r1")).unwrap();
        lost.push(Bytes::from_static(b"x1")).unwrap();
        left.push(Bytes::from_static(b"l2")).unwrap();
        right.push(Bytes::from_static(b"r2")).unwrap();
        lost.abort();
        left.close();
        right.close();

        let [left_task, right_task, lost_task] = tasks;
        assert_eq!(left_task.await.unwrap().unwrap().status, 201);
        assert_eq!(right_task.await.unwrap().unwrap().status, 201);
        assert!(lost_task.await.unwrap().is_err());

        assert_eq!(storage.len().await, 2);
        assert_eq!(storage.get("/left.bin").await.unwrap(), Bytes::from_static(b"l1l2"));
        assert_eq!(storage.get("/right.bin").await.unwrap(), Bytes::from_static(b"r1r2"));
    }

    #[tokio::test]
    async fn test_missing_object() {
        let storage = MemoryStorage::new();
        assert!(matches!(
            storage.download(&args("/nope")).await,
            Err(ProviderError::NotFound)
        ));
        assert!(matches!(
            storage.delete(&args("/nope")).await,
            Err(ProviderError::NotFound)
        ));
    }
}
