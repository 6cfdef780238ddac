//! Ties a [`TransferSession`] to the client connection.
//!
//! The server drops a request's future (and with it this controller) when
//! the client disconnects, and drops a response body that is still being
//! sent. Both paths land in [`ConnectionLifecycle::on_connection_close`],
//! which force-aborts an upload's bridge so the provider stops waiting for
//! chunks that will never come.

use bytes::Bytes;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_stream::Stream;

use crate::transfer::session::{SessionState, TransferSession};

#[derive(Debug)]
pub struct ConnectionLifecycle {
  session: TransferSession,
}

impl ConnectionLifecycle {
  pub fn new(session: TransferSession) -> Self {
    Self { session }
  }

  pub fn session(&self) -> &TransferSession {
    &self.session
  }

  pub fn session_mut(&mut self) -> &mut TransferSession {
    &mut self.session
  }

  /// The client went away before the transfer finished.
  pub fn on_connection_close(&mut self) {
    let state = self.session.state();
    if self.session.abort() {
      let arguments = self.session.arguments();
      tracing::warn!(
        action = %self.session.action(),
        provider = %arguments.provider,
        path = %arguments.path,
        "Client connection closed during {:?}, transfer aborted",
        state
      );
    }
  }

  /// Wrap a download body so the session follows the response to the end.
  pub fn guard_download<S>(self, inner: S) -> GuardedDownload<S> {
    GuardedDownload {
      inner,
      lifecycle: self,
      sent_bytes: 0,
    }
  }
}

impl Drop for ConnectionLifecycle {
  fn drop(&mut self) {
    if !self.session.state().is_terminal() {
      self.on_connection_close();
    }
  }
}

/// A response body that completes its session when the provider stream is
/// exhausted. Dropping it early counts as a connection close.
#[derive(Debug)]
pub struct GuardedDownload<S> {
  inner: S,
  lifecycle: ConnectionLifecycle,
  sent_bytes: u64,
}

impl<S> GuardedDownload<S> {
  pub fn state(&self) -> SessionState {
    self.lifecycle.session().state()
  }

  fn finish(&mut self) {
    let session = self.lifecycle.session_mut();
    if session.state().is_terminal() {
      return;
    }
    match session.finish_body().and_then(|_| session.complete()) {
      Ok(()) => tracing::info!(
        provider = %session.arguments().provider,
        path = %session.arguments().path,
        bytes = self.sent_bytes,
        "Download finished"
      ),
      Err(e) => tracing::error!("Download could not be finalized: {}", e),
    }
  }
}

impl<S> Stream for GuardedDownload<S>
where
  S: Stream<Item = io::Result<Bytes>> + Unpin,
{
  type Item = io::Result<Bytes>;

  fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    let this = &mut *self;
    match Pin::new(&mut this.inner).poll_next(cx) {
      Poll::Ready(Some(Ok(chunk))) => {
        this.sent_bytes += chunk.len() as u64;
        Poll::Ready(Some(Ok(chunk)))
      },
      Poll::Ready(Some(Err(e))) => {
        tracing::error!("Provider stream failed mid-download: {}", e);
        this.lifecycle.session_mut().abort();
        Poll::Ready(Some(Err(e)))
      },
      Poll::Ready(None) => {
        this.finish();
        Poll::Ready(None)
      },
      Poll::Pending => Poll::Pending,
    }
  }
}
