//! Per-request transfer machinery sitting between the HTTP layer and a
//! [`StorageProvider`](crate::domain::provider::StorageProvider).

pub mod delete;
pub mod download;
pub mod lifecycle;
pub mod session;
pub mod upload;

use thiserror::Error;

use crate::domain::{action::UnsupportedAction, bridge::BridgeError, provider::ProviderError};
use session::SessionState;

/// Default download chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum TransferError {
  #[error(transparent)]
  UnsupportedAction(#[from] UnsupportedAction),

  #[error(transparent)]
  StreamClosed(#[from] BridgeError),

  #[error("Provider failure: {0}")]
  ProviderFailure(#[from] ProviderError),

  #[error("Client connection aborted")]
  ConnectionAborted,

  #[error("Invalid session transition from {from:?} to {to:?}")]
  InvalidTransition {
    from: SessionState,
    to: SessionState,
  },
}
