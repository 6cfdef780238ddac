use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::io::AsyncRead;

use crate::domain::bridge::BridgeReader;

#[derive(Debug, Error)]
pub enum ProviderError {
  #[error("Object not found")]
  NotFound,
  #[error("Provider operation failed: {0}")]
  OperationFailed(String),
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
}

/// Parameters of a single provider call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferArguments {
  /// Name of the configured provider handling the request
  pub provider: String,
  /// Absolute target path, always starting with `/`
  pub path: String,
  /// Extra query-string parameters, passed through untouched
  pub query: HashMap<String, String>,
  /// Declared upload size, when the client sent one
  pub content_length: Option<u64>,
}

impl TransferArguments {
  pub fn new(provider: impl Into<String>, path: impl Into<String>) -> Self {
    Self {
      provider: provider.into(),
      path: path.into(),
      ..Self::default()
    }
  }

  /// Final segment of the path, used as the download file name.
  pub fn file_name(&self) -> &str {
    self
      .path
      .rsplit('/')
      .find(|segment| !segment.is_empty())
      .unwrap_or("")
  }
}

pub struct DownloadResult {
  pub content_type: String,
  pub content: Box<dyn AsyncRead + Send + Unpin>,
}

impl std::fmt::Debug for DownloadResult {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("DownloadResult")
      .field("content_type", &self.content_type)
      .finish_non_exhaustive()
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadResult {
  pub status: u16,
  pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteResult {
  pub status: u16,
}

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[async_trait]
pub trait StorageProvider: Send + Sync + 'static {
  /// Open the object at `args.path` for reading
  /// Returns NotFound error if object doesn't exist
  async fn download(&self, args: &TransferArguments) -> Result<DownloadResult, ProviderError>;

  /// Persist everything read from `source` at `args.path`
  /// Resolves only after `source` reached end-of-data and the object is committed
  async fn upload(
    &self,
    source: BridgeReader,
    args: &TransferArguments,
  ) -> Result<UploadResult, ProviderError>;

  /// Remove the object at `args.path`
  async fn delete(&self, args: &TransferArguments) -> Result<DeleteResult, ProviderError>;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_file_name_is_last_segment() {
    let args = TransferArguments::new("local", "/a/b/report.txt");
    assert_eq!(args.file_name(), "report.txt");
  }

  #[test]
  fn test_file_name_ignores_trailing_slash() {
    let args = TransferArguments::new("local", "/a/b/");
    assert_eq!(args.file_name(), "b");
  }

  #[test]
  fn test_file_name_of_root_is_empty() {
    let args = TransferArguments::new("local", "/");
    assert_eq!(args.file_name(), "");
  }
}
