//! Single-pass encode fanned out to the HTTP body and a cache buffer
//!
//! The encoder runs on a blocking thread and writes through a
//! [`ChannelWriter`] into a bounded channel. [`DualSink`] drains that channel,
//! forwarding each chunk to the response body while keeping a copy for the
//! cache write. A full channel blocks the encoder, so CPU work follows the
//! client's read rate.

use std::io::{self, Write};
use std::time::Duration;

use axum::body::Body;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, StreamExt};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, debug, warn};

use crate::imaging::ImagingError;

pub type Chunk = io::Result<Bytes>;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Encoder failed: {0}")]
    Encode(#[from] io::Error),

    #[error("Encoder produced no output")]
    Empty,

    #[error("Encoder task aborted: {0}")]
    Aborted(#[from] tokio::task::JoinError),
}

/// Synchronous writer that hands fixed-size chunks to an async receiver
pub struct ChannelWriter {
    tx: mpsc::Sender<Chunk>,
    buf: BytesMut,
    chunk_size: usize,
}

impl ChannelWriter {
    pub fn new(tx: mpsc::Sender<Chunk>, chunk_size: usize) -> Self {
        Self {
            tx,
            buf: BytesMut::with_capacity(chunk_size),
            chunk_size: chunk_size.max(1),
        }
    }

    fn send(&self, chunk: Bytes) -> io::Result<()> {
        self.tx
            .blocking_send(Ok(chunk))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "stream receiver dropped"))
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        while self.buf.len() >= self.chunk_size {
            let chunk = self.buf.split_to(self.chunk_size).freeze();
            self.send(chunk)?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = self.buf.split().freeze();
        self.send(chunk)
    }
}

/// Runs `encode` on the blocking pool, streaming its output in chunks.
///
/// An encode error is delivered as the final `Err` item of the channel.
pub fn spawn_encoder<F>(
    capacity: usize,
    chunk_size: usize,
    encode: F,
) -> (mpsc::Receiver<Chunk>, JoinHandle<()>)
where
    F: FnOnce(&mut ChannelWriter) -> Result<(), ImagingError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let handle = tokio::task::spawn_blocking(move || {
        let mut writer = ChannelWriter::new(tx.clone(), chunk_size);
        let result = encode(&mut writer)
            .map_err(io::Error::other)
            .and_then(|()| writer.flush());
        if let Err(e) = result {
            // Receiver may already be gone; nothing left to tell
            let _ = tx.blocking_send(Err(e));
        }
    });
    (rx, handle)
}

/// Copies one encoder stream into the HTTP body and a memory buffer
#[derive(Debug, Clone, Copy)]
pub struct DualSink {
    body_capacity: usize,
    stall_timeout: Duration,
}

impl DualSink {
    pub fn new(body_capacity: usize, stall_timeout: Duration) -> Self {
        Self {
            body_capacity: body_capacity.max(1),
            stall_timeout,
        }
    }

    /// Waits for the first chunk, then streams the rest from a copy task.
    ///
    /// Failing before the first chunk returns an error so the caller can still
    /// answer with a proper status code. Later failures abort the body.
    ///
    /// Once the encoder has finished cleanly and every chunk reached the
    /// body, `on_complete` receives the full output. The body ends only after
    /// `on_complete` resolves. It is never called for an aborted or
    /// abandoned response.
    pub async fn fork<F, Fut>(
        &self,
        mut chunks: mpsc::Receiver<Chunk>,
        encoder: JoinHandle<()>,
        on_complete: F,
    ) -> Result<Body, StreamError>
    where
        F: FnOnce(Bytes) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let first = match chunks.recv().await {
            Some(chunk) => chunk?,
            None => {
                encoder.await?;
                return Err(StreamError::Empty);
            }
        };

        let (body_tx, body_rx) = mpsc::channel::<Chunk>(self.body_capacity);
        // A copy task that exits without completing leaves the body ending in an error
        let (done_tx, done_rx) = oneshot::channel::<()>();
        let tail = stream::once(done_rx).filter_map(|done| async move {
            done.is_err().then(|| {
                Err::<Bytes, _>(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "response stream aborted",
                ))
            })
        });
        let body = Body::from_stream(ReceiverStream::new(body_rx).chain(tail));
        let stall_timeout = self.stall_timeout;

        tokio::spawn(
            async move {
                let mut buffer = BytesMut::new();
                let mut next = Some(Ok(first));

                while let Some(item) = next {
                    let chunk = match item {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            warn!(error = %e, "Encoder failed mid-stream, aborting response");
                            let _ = body_tx.send(Err(e)).await;
                            return;
                        }
                    };

                    buffer.extend_from_slice(&chunk);
                    match tokio::time::timeout(stall_timeout, body_tx.send(Ok(chunk))).await {
                        Ok(Ok(())) => {}
                        Ok(Err(_)) => {
                            debug!("Client went away before the response completed");
                            return;
                        }
                        Err(_) => {
                            warn!(timeout = ?stall_timeout, "Client stalled, aborting response");
                            return;
                        }
                    }

                    next = chunks.recv().await;
                }

                // Channel closed: only a clean encoder exit counts as complete output
                if let Err(e) = encoder.await {
                    warn!(error = %e, "Encoder task aborted");
                    let _ = body_tx.send(Err(io::Error::other(e))).await;
                    return;
                }

                debug!(size = buffer.len(), "Response stream complete");
                on_complete(buffer.freeze()).await;
                let _ = done_tx.send(());
            }
            .in_current_span(),
        );

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink() -> DualSink {
        DualSink::new(2, Duration::from_secs(5))
    }

    /// Forks with a completion hook that reports the captured output on the returned channel
    async fn fork_capturing(
        sink: DualSink,
        chunks: mpsc::Receiver<Chunk>,
        encoder: JoinHandle<()>,
    ) -> Result<(Body, mpsc::UnboundedReceiver<Bytes>), StreamError> {
        let (captured_tx, captured_rx) = mpsc::unbounded_channel();
        let body = sink
            .fork(chunks, encoder, move |bytes| async move {
                let _ = captured_tx.send(bytes);
            })
            .await?;
        Ok((body, captured_rx))
    }

    #[tokio::test]
    async fn test_channel_writer_chunks_and_flushes() {
        let (mut rx, handle) = spawn_encoder(4, 4, |writer| {
            writer.write_all(b"abcdefghij")?;
            Ok(())
        });

        let mut chunks = Vec::new();
        while let Some(chunk) = rx.recv().await {
            chunks.push(chunk.unwrap());
        }
        handle.await.unwrap();

        assert_eq!(
            chunks,
            vec![
                Bytes::from_static(b"abcd"),
                Bytes::from_static(b"efgh"),
                Bytes::from_static(b"ij"),
            ]
        );
    }

    #[tokio::test]
    async fn test_fork_delivers_same_bytes_to_both_sinks() {
        let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let expected = payload.clone();
        let (rx, handle) = spawn_encoder(2, 512, move |writer| {
            writer.write_all(&payload)?;
            Ok(())
        });

        let (body, mut captured) = fork_capturing(sink(), rx, handle).await.unwrap();
        let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();

        assert_eq!(body.as_ref(), expected.as_slice());
        assert_eq!(captured.recv().await.unwrap(), body);
    }

    #[tokio::test]
    async fn test_body_ends_after_completion_hook() {
        let (rx, handle) = spawn_encoder(2, 4, |writer| {
            writer.write_all(b"payload")?;
            Ok(())
        });
        let (hook_tx, mut hook_rx) = mpsc::unbounded_channel();

        let body = sink()
            .fork(rx, handle, move |_bytes| async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                let _ = hook_tx.send(());
            })
            .await
            .unwrap();
        axum::body::to_bytes(body, usize::MAX).await.unwrap();

        // Already finished by the time the body completed
        assert!(hook_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_fork_reports_error_before_first_chunk() {
        let (rx, handle) = spawn_encoder(2, 512, |_writer| {
            Err(ImagingError::Encode("boom".to_string()))
        });

        let err = fork_capturing(sink(), rx, handle).await.err().unwrap();
        assert!(matches!(err, StreamError::Encode(_)));
    }

    #[tokio::test]
    async fn test_fork_empty_output() {
        let (rx, handle) = spawn_encoder(2, 512, |_writer| Ok(()));
        let err = fork_capturing(sink(), rx, handle).await.err().unwrap();
        assert!(matches!(err, StreamError::Empty));
    }

    #[tokio::test]
    async fn test_mid_stream_error_aborts_body_and_skips_cache() {
        let (rx, handle) = spawn_encoder(2, 4, |writer| {
            writer.write_all(b"12345678")?;
            Err(ImagingError::Encode("late failure".to_string()))
        });

        let (body, mut captured) = fork_capturing(sink(), rx, handle).await.unwrap();
        assert!(axum::body::to_bytes(body, usize::MAX).await.is_err());
        assert!(captured.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_body_skips_cache() {
        let (rx, handle) = spawn_encoder(1, 4, |writer| {
            for _ in 0..64 {
                writer.write_all(b"data")?;
            }
            Ok(())
        });

        let (body, mut captured) = fork_capturing(sink(), rx, handle).await.unwrap();
        drop(body);
        assert!(captured.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_stalled_client_aborts_body_and_skips_cache() {
        let (rx, handle) = spawn_encoder(1, 4, |writer| {
            for _ in 0..64 {
                writer.write_all(b"data")?;
            }
            Ok(())
        });
        let stalling = DualSink::new(1, Duration::from_millis(50));

        let (body, mut captured) = fork_capturing(stalling, rx, handle).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(axum::body::to_bytes(body, usize::MAX).await.is_err());
        assert!(captured.recv().await.is_none());
    }
}
