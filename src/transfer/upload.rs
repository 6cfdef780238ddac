use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::domain::{
  bridge::BridgeReader,
  provider::{ProviderError, StorageProvider, TransferArguments, UploadResult},
};
use crate::transfer::TransferError;

/// An upload running on its own task, consuming a bridge.
#[derive(Debug)]
pub struct PendingUpload {
  handle: JoinHandle<Result<UploadResult, ProviderError>>,
}

/// Start `provider.upload` against the consumer face of a bridge.
///
/// Must be called before any chunk is pushed: the provider's first read on
/// `source` simply suspends until data arrives. If the provider fails, the
/// bridge is closed so the producer stops feeding it.
pub fn begin(
  provider: Arc<dyn StorageProvider>,
  source: BridgeReader,
  arguments: TransferArguments,
) -> PendingUpload {
  let closer = source.closer();
  let span = tracing::info_span!(
    "upload",
    provider = %arguments.provider,
    path = %arguments.path
  );

  let handle = tokio::spawn(
    async move {
      tracing::debug!("Provider upload started");
      let result = provider.upload(source, &arguments).await;
      match &result {
        Ok(upload) => tracing::info!(status = upload.status, "Provider upload finished"),
        Err(e) => {
          tracing::error!("Provider upload failed: {}", e);
          closer.close();
        },
      }
      result
    }
    .instrument(span),
  );

  PendingUpload { handle }
}

impl PendingUpload {
  #[cfg(test)]
  pub(crate) fn ready(result: Result<UploadResult, ProviderError>) -> Self {
    Self {
      handle: tokio::spawn(async move { result }),
    }
  }

  #[cfg(test)]
  pub(crate) fn is_finished(&self) -> bool {
    self.handle.is_finished()
  }

  /// Wait for the provider to finish.
  pub async fn result(self) -> Result<UploadResult, TransferError> {
    match self.handle.await {
      Ok(Ok(result)) => Ok(result),
      Ok(Err(e)) => Err(TransferError::ProviderFailure(e)),
      Err(join_error) => Err(TransferError::ProviderFailure(ProviderError::OperationFailed(
        format!("upload task did not complete: {}", join_error),
      ))),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::bridge::stream_bridge;
  use crate::domain::provider::{DeleteResult, DownloadResult};
  use async_trait::async_trait;
  use bytes::Bytes;
  use std::time::Duration;
  use tokio::sync::Mutex;

  /// Reads the bridge with `read()` and records what it saw.
  #[derive(Default)]
  struct Recording {
    seen: Mutex<Vec<u8>>,
    aborted: Mutex<Option<bool>>,
  }

  #[async_trait]
  impl StorageProvider for Recording {
    async fn download(&self, _args: &TransferArguments) -> Result<DownloadResult, ProviderError> {
      Err(ProviderError::NotFound)
    }

    async fn upload(
      &self,
      mut source: BridgeReader,
      _args: &TransferArguments,
    ) -> Result<UploadResult, ProviderError> {
      while let Some(chunk) = source.read().await {
        self.seen.lock().await.extend_from_slice(&chunk);
      }
      *self.aborted.lock().await = Some(source.is_aborted());
      Ok(UploadResult {
        status: 201,
        metadata: None,
      })
    }

    async fn delete(&self, _args: &TransferArguments) -> Result<DeleteResult, ProviderError> {
      Ok(DeleteResult { status: 204 })
    }
  }

  struct Failing;

  #[async_trait]
  impl StorageProvider for Failing {
    async fn download(&self, _args: &TransferArguments) -> Result<DownloadResult, ProviderError> {
      Err(ProviderError::NotFound)
    }

    async fn upload(
      &self,
      mut source: BridgeReader,
      _args: &TransferArguments,
    ) -> Result<UploadResult, ProviderError> {
      let _first = source.read().await;
      Err(ProviderError::OperationFailed("disk full".to_string()))
    }

    async fn delete(&self, _args: &TransferArguments) -> Result<DeleteResult, ProviderError> {
      Err(ProviderError::NotFound)
    }
  }

  fn args() -> TransferArguments {
    TransferArguments::new("recording", "/up/file.bin")
  }

  #[tokio::test]
  async fn test_begin_before_data_does_not_resolve() {
    let provider = Arc::new(Recording::default());
    let (mut writer, reader) = stream_bridge();
    let pending = begin(provider.clone(), reader, args());

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!pending.is_finished());

    writer.push(Bytes::from_static(b"payload")).unwrap();
    writer.close();

    let result = pending.result().await.unwrap();
    assert_eq!(result.status, 201);
    assert_eq!(provider.seen.lock().await.as_slice(), b"payload");
  }

  #[tokio::test]
  async fn test_provider_sees_bytes_in_order() {
    let provider = Arc::new(Recording::default());
    let (mut writer, reader) = stream_bridge();
    let pending = begin(provider.clone(), reader, args());

    for chunk in ["hello", " ", "world"] {
      writer.push(Bytes::from(chunk)).unwrap();
      tokio::task::yield_now().await;
    }
    writer.close();

    pending.result().await.unwrap();
    assert_eq!(provider.seen.lock().await.as_slice(), b"hello world");
    assert_eq!(*provider.aborted.lock().await, Some(false));
  }

  #[tokio::test]
  async fn test_abort_releases_suspended_provider() {
    let provider = Arc::new(Recording::default());
    let (mut writer, reader) = stream_bridge();
    let pending = begin(provider.clone(), reader, args());

    writer.push(Bytes::from_static(b"part")).unwrap();
    tokio::task::yield_now().await;
    writer.abort();

    tokio::time::timeout(Duration::from_secs(1), pending.result())
      .await
      .expect("provider must not hang after abort")
      .unwrap();
    assert_eq!(*provider.aborted.lock().await, Some(true));
  }

  #[tokio::test]
  async fn test_provider_failure_closes_bridge() {
    let (mut writer, reader) = stream_bridge();
    let pending = begin(Arc::new(Failing), reader, args());

    writer.push(Bytes::from_static(b"first")).unwrap();
    let err = pending.result().await.unwrap_err();
    assert!(matches!(err, TransferError::ProviderFailure(_)));

    assert!(writer.is_closed());
    assert!(writer.push(Bytes::from_static(b"second")).is_err());
  }
}
