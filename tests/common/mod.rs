//! Common test utilities for integration tests
//!
//! Provides providers that record what the gateway hands them, plus helpers
//! to build a router around any set of providers.

use async_trait::async_trait;
use axum::Router;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use file_gateway::domain::bridge::BridgeReader;
use file_gateway::domain::provider::{
  DeleteResult, DownloadResult, ProviderError, StorageProvider, TransferArguments, UploadResult,
};
use file_gateway::infra::registry::ProviderRegistry;
use file_gateway::server::{create_router, AppState};

/// What a provider observed while consuming one upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
  pub path: String,
  pub bytes: Vec<u8>,
  pub aborted: bool,
  pub content_length: Option<u64>,
}

/// Provider serving fixed files and reporting every upload it consumes
pub struct RecordingProvider {
  files: HashMap<String, (String, Vec<u8>)>,
  upload_status: u16,
  delete_status: u16,
  outcomes: UnboundedSender<UploadOutcome>,
  calls: AtomicUsize,
}

#[allow(dead_code)]
impl RecordingProvider {
  pub fn new(upload_status: u16) -> (Self, UnboundedReceiver<UploadOutcome>) {
    let (outcomes, receiver) = unbounded_channel();
    let provider = Self {
      files: HashMap::new(),
      upload_status,
      delete_status: 204,
      outcomes,
      calls: AtomicUsize::new(0),
    };
    (provider, receiver)
  }

  pub fn with_file(mut self, path: &str, content_type: &str, data: &[u8]) -> Self {
    self
      .files
      .insert(path.to_string(), (content_type.to_string(), data.to_vec()));
    self
  }

  pub fn with_delete_status(mut self, status: u16) -> Self {
    self.delete_status = status;
    self
  }

  /// Number of provider calls of any kind
  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl StorageProvider for RecordingProvider {
  async fn download(&self, args: &TransferArguments) -> Result<DownloadResult, ProviderError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    let (content_type, data) = self.files.get(&args.path).ok_or(ProviderError::NotFound)?;
    Ok(DownloadResult {
      content_type: content_type.clone(),
      content: Box::new(Cursor::new(data.clone())),
    })
  }

  async fn upload(
    &self,
    mut source: BridgeReader,
    args: &TransferArguments,
  ) -> Result<UploadResult, ProviderError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    let mut bytes = Vec::new();
    while let Some(chunk) = source.read().await {
      bytes.extend_from_slice(&chunk);
    }
    let _ = self.outcomes.send(UploadOutcome {
      path: args.path.clone(),
      bytes,
      aborted: source.is_aborted(),
      content_length: args.content_length,
    });
    Ok(UploadResult {
      status: self.upload_status,
      metadata: None,
    })
  }

  async fn delete(&self, _args: &TransferArguments) -> Result<DeleteResult, ProviderError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    Ok(DeleteResult {
      status: self.delete_status,
    })
  }
}

/// Provider whose upload fails after reading the first chunk
pub struct FailingProvider;

#[async_trait]
impl StorageProvider for FailingProvider {
  async fn download(&self, _args: &TransferArguments) -> Result<DownloadResult, ProviderError> {
    Err(ProviderError::OperationFailed("backend offline".to_string()))
  }

  async fn upload(
    &self,
    mut source: BridgeReader,
    _args: &TransferArguments,
  ) -> Result<UploadResult, ProviderError> {
    let _ = source.read().await;
    Err(ProviderError::OperationFailed("quota exceeded".to_string()))
  }

  async fn delete(&self, _args: &TransferArguments) -> Result<DeleteResult, ProviderError> {
    Err(ProviderError::OperationFailed("backend offline".to_string()))
  }
}

/// Build a router serving the given providers
pub fn create_test_app(providers: Vec<(&str, Arc<dyn StorageProvider>)>, chunk_size: usize) -> Router {
  let registry = ProviderRegistry::from_providers(
    providers
      .into_iter()
      .map(|(name, provider)| (name.to_string(), provider)),
  );
  let app_state = AppState {
    providers: registry,
    chunk_size,
  };
  create_router().with_state(app_state)
}

pub fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_test_writer()
    .try_init();
}
