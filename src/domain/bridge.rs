//! Single-producer/single-consumer byte pipe between an inbound request body
//! and a provider's upload.
//!
//! The producer face ([`BridgeWriter`]) never blocks: chunks are queued on an
//! unbounded channel. The consumer face ([`BridgeReader`]) suspends on
//! [`BridgeReader::read`] until a chunk exists or the bridge is closed and
//! drained.

use bytes::Bytes;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_stream::Stream;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BridgeError {
  #[error("Stream bridge is closed ({0})")]
  StreamClosed(CloseReason),
}

/// Why a bridge stopped accepting chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
  /// The request body ended normally.
  EndOfBody,
  /// The client went away before the body ended.
  Aborted,
  /// The consumer stopped reading (provider finished or failed).
  ConsumerGone,
}

impl std::fmt::Display for CloseReason {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      CloseReason::EndOfBody => write!(f, "end of body"),
      CloseReason::Aborted => write!(f, "aborted"),
      CloseReason::ConsumerGone => write!(f, "consumer gone"),
    }
  }
}

#[derive(Debug, Default)]
struct Shared {
  reason: Mutex<Option<CloseReason>>,
}

impl Shared {
  fn reason(&self) -> Option<CloseReason> {
    match self.reason.lock() {
      Ok(guard) => *guard,
      Err(poisoned) => *poisoned.into_inner(),
    }
  }

  /// Records the first close reason; later ones are ignored.
  fn mark(&self, reason: CloseReason) -> CloseReason {
    let mut guard = match self.reason.lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    };
    *guard.get_or_insert(reason)
  }
}

/// Create a fresh bridge, returning its producer and consumer faces.
pub fn stream_bridge() -> (BridgeWriter, BridgeReader) {
  let (tx, rx) = unbounded_channel();
  let shared = Arc::new(Shared::default());

  let writer = BridgeWriter {
    tx: Some(tx),
    shared: shared.clone(),
    pushed_bytes: 0,
  };
  let reader = BridgeReader {
    rx,
    shared,
    abort_reported: false,
  };
  (writer, reader)
}

/// Producer face of a bridge. Dropping it without [`close`](Self::close)
/// aborts the bridge.
#[derive(Debug)]
pub struct BridgeWriter {
  tx: Option<UnboundedSender<Bytes>>,
  shared: Arc<Shared>,
  pushed_bytes: u64,
}

impl BridgeWriter {
  /// Queue a chunk for the consumer.
  pub fn push(&mut self, chunk: Bytes) -> Result<(), BridgeError> {
    if let Some(reason) = self.shared.reason() {
      return Err(BridgeError::StreamClosed(reason));
    }
    let tx = self
      .tx
      .as_ref()
      .ok_or(BridgeError::StreamClosed(CloseReason::EndOfBody))?;

    if chunk.is_empty() {
      return Ok(());
    }

    let len = chunk.len() as u64;
    if tx.send(chunk).is_err() {
      // receiver dropped without anyone marking the bridge
      let reason = self.shared.mark(CloseReason::ConsumerGone);
      self.tx = None;
      return Err(BridgeError::StreamClosed(reason));
    }
    self.pushed_bytes += len;
    Ok(())
  }

  /// Signal a clean end of body. Idempotent.
  pub fn close(&mut self) {
    self.finish(CloseReason::EndOfBody);
  }

  /// Force the bridge closed because the client went away. Idempotent.
  pub fn abort(&mut self) {
    self.finish(CloseReason::Aborted);
  }

  pub fn is_closed(&self) -> bool {
    self.tx.is_none() || self.shared.reason().is_some()
  }

  pub fn close_reason(&self) -> Option<CloseReason> {
    self.shared.reason()
  }

  fn finish(&mut self, reason: CloseReason) {
    // The reason must be visible before the sender drops, so the reader
    // sees it together with end-of-data.
    let recorded = self.shared.mark(reason);
    if self.tx.take().is_some() {
      tracing::debug!(
        reason = %recorded,
        bytes = self.pushed_bytes,
        "Stream bridge closed"
      );
    }
  }
}

impl Drop for BridgeWriter {
  fn drop(&mut self) {
    if self.tx.is_some() {
      self.abort();
    }
  }
}

/// Consumer face of a bridge, handed to a provider's upload.
///
/// Besides [`read`](Self::read) it implements [`Stream`] of `io::Result<Bytes>`.
/// On that interface an aborted bridge ends with a single
/// [`io::ErrorKind::ConnectionAborted`] error once drained, so a provider
/// consuming it fails rather than persisting a truncated object.
#[derive(Debug)]
pub struct BridgeReader {
  rx: UnboundedReceiver<Bytes>,
  shared: Arc<Shared>,
  abort_reported: bool,
}

impl BridgeReader {
  /// Wait for the next chunk. `None` means the bridge is closed and drained.
  pub async fn read(&mut self) -> Option<Bytes> {
    self.rx.recv().await
  }

  /// Whether the producer side went away before a clean end of body.
  pub fn is_aborted(&self) -> bool {
    self.shared.reason() == Some(CloseReason::Aborted)
  }

  /// A handle the owner of a consumer can use to shut the producer out
  /// after the reader has been handed off.
  pub fn closer(&self) -> BridgeCloser {
    BridgeCloser {
      shared: self.shared.clone(),
    }
  }
}

impl Stream for BridgeReader {
  type Item = io::Result<Bytes>;

  fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    match self.rx.poll_recv(cx) {
      Poll::Ready(Some(chunk)) => Poll::Ready(Some(Ok(chunk))),
      Poll::Ready(None) if self.is_aborted() && !self.abort_reported => {
        self.abort_reported = true;
        Poll::Ready(Some(Err(io::Error::new(
          io::ErrorKind::ConnectionAborted,
          "client disconnected before the upload body ended",
        ))))
      },
      Poll::Ready(None) => Poll::Ready(None),
      Poll::Pending => Poll::Pending,
    }
  }
}

impl Drop for BridgeReader {
  fn drop(&mut self) {
    self.shared.mark(CloseReason::ConsumerGone);
    self.rx.close();
  }
}

/// Closes a bridge from the consumer side without owning the reader.
#[derive(Debug, Clone)]
pub struct BridgeCloser {
  shared: Arc<Shared>,
}

impl BridgeCloser {
  /// Stop accepting chunks; pushes after this fail with `StreamClosed`.
  pub fn close(&self) {
    self.shared.mark(CloseReason::ConsumerGone);
  }
}
