use bytes::Bytes;

use crate::domain::{action::Action, bridge::BridgeWriter, provider::TransferArguments, provider::UploadResult};
use crate::transfer::{upload::PendingUpload, TransferError};

/// Lifecycle of a single request.
///
/// ```text
/// Idle -> Streaming -> Finalizing -> Completed
///   \________\_____________\-------> Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
  Idle,
  Streaming,
  Finalizing,
  Completed,
  Aborted,
}

impl SessionState {
  pub fn can_transition_to(self, next: SessionState) -> bool {
    use SessionState::*;
    matches!(
      (self, next),
      (Idle, Streaming)
        | (Streaming, Finalizing)
        | (Finalizing, Completed)
        | (Idle, Aborted)
        | (Streaming, Aborted)
        | (Finalizing, Aborted)
    )
  }

  pub fn is_terminal(self) -> bool {
    matches!(self, SessionState::Completed | SessionState::Aborted)
  }
}

/// State of one inbound request. Upload sessions also own the producer face
/// of their bridge and the in-flight provider upload.
#[derive(Debug)]
pub struct TransferSession {
  action: Action,
  arguments: TransferArguments,
  state: SessionState,
  bridge: Option<BridgeWriter>,
  pending: Option<PendingUpload>,
}

impl TransferSession {
  pub fn new(action: Action, arguments: TransferArguments) -> Self {
    Self {
      action,
      arguments,
      state: SessionState::Idle,
      bridge: None,
      pending: None,
    }
  }

  /// An upload session whose provider call is already running.
  pub fn upload(arguments: TransferArguments, bridge: BridgeWriter, pending: PendingUpload) -> Self {
    Self {
      bridge: Some(bridge),
      pending: Some(pending),
      ..Self::new(Action::Upload, arguments)
    }
  }

  pub fn action(&self) -> Action {
    self.action
  }

  pub fn arguments(&self) -> &TransferArguments {
    &self.arguments
  }

  pub fn state(&self) -> SessionState {
    self.state
  }

  pub fn bridge(&self) -> Option<&BridgeWriter> {
    self.bridge.as_ref()
  }

  pub fn transition(&mut self, next: SessionState) -> Result<(), TransferError> {
    if !self.state.can_transition_to(next) {
      return Err(TransferError::InvalidTransition {
        from: self.state,
        to: next,
      });
    }
    tracing::debug!(
      action = %self.action,
      path = %self.arguments.path,
      "Session {:?} -> {:?}",
      self.state,
      next
    );
    self.state = next;
    Ok(())
  }

  /// Enter `Streaming` unless already there.
  pub fn begin_streaming(&mut self) -> Result<(), TransferError> {
    if self.state == SessionState::Streaming {
      return Ok(());
    }
    self.transition(SessionState::Streaming)
  }

  /// Forward one body chunk into the bridge.
  pub fn push_chunk(&mut self, chunk: Bytes) -> Result<(), TransferError> {
    self.begin_streaming()?;
    let bridge = self.bridge.as_mut().ok_or(TransferError::InvalidTransition {
      from: self.state,
      to: SessionState::Streaming,
    })?;
    bridge.push(chunk)?;
    Ok(())
  }

  /// Normal end of input: closes the bridge (if any) and enters `Finalizing`.
  pub fn finish_body(&mut self) -> Result<(), TransferError> {
    self.begin_streaming()?;
    if let Some(bridge) = self.bridge.as_mut() {
      bridge.close();
    }
    self.transition(SessionState::Finalizing)
  }

  pub fn complete(&mut self) -> Result<(), TransferError> {
    self.transition(SessionState::Completed)
  }

  /// Wait for the provider upload started with this session.
  pub async fn finish_upload(&mut self) -> Result<UploadResult, TransferError> {
    let pending = self.pending.take().ok_or(TransferError::InvalidTransition {
      from: self.state,
      to: SessionState::Completed,
    })?;

    match pending.result().await {
      Ok(result) => {
        self.complete()?;
        Ok(result)
      },
      Err(err) => {
        self.abort();
        Err(err)
      },
    }
  }

  /// Move to `Aborted`, force-closing the bridge. Returns `false` if the
  /// session had already finished.
  pub fn abort(&mut self) -> bool {
    if self.state.is_terminal() {
      return false;
    }
    if let Some(bridge) = self.bridge.as_mut() {
      bridge.abort();
    }
    tracing::debug!(
      action = %self.action,
      path = %self.arguments.path,
      "Session {:?} -> Aborted",
      self.state
    );
    self.state = SessionState::Aborted;
    true
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::bridge::{stream_bridge, CloseReason};
  use SessionState::*;

  fn args() -> TransferArguments {
    TransferArguments::new("memory", "/docs/a.txt")
  }

  #[test]
  fn test_legal_transitions() {
    assert!(Idle.can_transition_to(Streaming));
    assert!(Streaming.can_transition_to(Finalizing));
    assert!(Finalizing.can_transition_to(Completed));
    assert!(Streaming.can_transition_to(Aborted));
    assert!(Finalizing.can_transition_to(Aborted));
  }

  #[test]
  fn test_illegal_transitions() {
    assert!(!Idle.can_transition_to(Completed));
    assert!(!Idle.can_transition_to(Finalizing));
    assert!(!Streaming.can_transition_to(Completed));
    assert!(!Completed.can_transition_to(Aborted));
    assert!(!Aborted.can_transition_to(Streaming));
    assert!(!Completed.can_transition_to(Streaming));
  }

  #[test]
  fn test_invalid_transition_keeps_state() {
    let mut session = TransferSession::new(Action::Delete, args());
    let err = session.transition(Completed).unwrap_err();
    assert!(matches!(
      err,
      TransferError::InvalidTransition {
        from: Idle,
        to: Completed
      }
    ));
    assert_eq!(session.state(), Idle);
  }

  #[test]
  fn test_download_walks_happy_path() {
    let mut session = TransferSession::new(Action::Download, args());
    session.begin_streaming().unwrap();
    session.finish_body().unwrap();
    session.complete().unwrap();
    assert_eq!(session.state(), Completed);
    assert!(session.bridge().is_none());
  }

  #[test]
  fn test_abort_after_completion_is_noop() {
    let mut session = TransferSession::new(Action::Delete, args());
    session.finish_body().unwrap();
    session.complete().unwrap();
    assert!(!session.abort());
    assert_eq!(session.state(), Completed);
  }

  #[tokio::test]
  async fn test_first_chunk_starts_streaming() {
    let (writer, reader) = stream_bridge();
    let pending = PendingUpload::ready(Ok(UploadResult {
      status: 201,
      metadata: None,
    }));
    let mut session = TransferSession::upload(args(), writer, pending);
    assert_eq!(session.state(), Idle);

    session.push_chunk(Bytes::from_static(b"abc")).unwrap();
    assert_eq!(session.state(), Streaming);

    session.abort();
    assert_eq!(session.bridge().unwrap().close_reason(), Some(CloseReason::Aborted));
    drop(reader);
  }

  #[tokio::test]
  async fn test_push_after_abort_fails() {
    let (writer, _reader) = stream_bridge();
    let pending = PendingUpload::ready(Ok(UploadResult {
      status: 201,
      metadata: None,
    }));
    let mut session = TransferSession::upload(args(), writer, pending);
    session.push_chunk(Bytes::from_static(b"abc")).unwrap();
    session.abort();

    assert!(session.push_chunk(Bytes::from_static(b"def")).is_err());
    assert_eq!(session.state(), Aborted);
  }
}
