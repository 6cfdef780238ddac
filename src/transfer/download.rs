use bytes::Bytes;
use std::io;
use tokio::io::AsyncRead;
use tokio_stream::Stream;
use tokio_util::io::ReaderStream;

use crate::domain::provider::TransferArguments;

/// Turn a provider's reader into a lazy, single-use chunk sequence.
///
/// Each item holds at most `chunk_size` bytes; the sequence ends on the
/// first empty read.
pub fn stream<R>(readable: R, chunk_size: usize) -> impl Stream<Item = io::Result<Bytes>>
where
  R: AsyncRead + Send + Unpin,
{
  ReaderStream::with_capacity(readable, chunk_size.max(1))
}

/// `Content-Disposition` value naming only the final path segment.
pub fn content_disposition(arguments: &TransferArguments) -> String {
  format!("attachment; filename={}", arguments.file_name())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Cursor;
  use tokio_stream::StreamExt;

  #[tokio::test]
  async fn test_chunks_are_bounded_and_ordered() {
    let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
    let chunks: Vec<Bytes> = stream(Cursor::new(data.clone()), 64)
      .map(|chunk| chunk.unwrap())
      .collect()
      .await;

    assert!(chunks.iter().all(|chunk| !chunk.is_empty() && chunk.len() <= 64));
    assert_eq!(chunks.concat(), data);
  }

  #[tokio::test]
  async fn test_empty_reader_yields_nothing() {
    let mut chunks = stream(Cursor::new(Vec::<u8>::new()), 64);
    assert!(chunks.next().await.is_none());
  }

  #[test]
  fn test_disposition_hides_directories() {
    let args = TransferArguments::new("local", "/a/b/report.txt");
    assert_eq!(content_disposition(&args), "attachment; filename=report.txt");
  }
}
