//! Per-stream decode pipeline.
//!
//! Each read is treated as one complete frame: the client performs one write
//! per batch and no length prefix is carried. A read that does not decode is
//! logged and skipped; the stream stays open and later frames are still
//! processed.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::processor::BatchProcessor;
use crate::codec::{FrameStats, decode_frame};
use crate::model::Batch;

/// Why a stream task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Peer finished the stream
    Finished,
    /// Shutdown signal fired
    Cancelled,
    /// Read returned an error other than end of stream
    ReadFailed,
    /// Acknowledgment write failed
    AckFailed,
}

/// Per-stream counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub end: StreamEnd,
}

/// Human-readable acknowledgment written back for each processed batch.
pub fn acknowledgment(batch: &Batch, stats: &FrameStats) -> String {
    format!(
        "Server received: {} (timestamp: {}, sensors: {}, original: {} bytes, compressed: {} bytes, ratio: {:.2}%)",
        batch.message,
        batch.timestamp,
        batch.readings.len(),
        stats.original_len,
        stats.compressed_len,
        stats.ratio_percent()
    )
}

/// Reads frames from one stream, decodes them and acknowledges each.
#[derive(Clone)]
pub struct DecodePipeline {
    buffer_size: usize,
    processor: Arc<dyn BatchProcessor>,
}

impl DecodePipeline {
    pub fn new(buffer_size: usize, processor: Arc<dyn BatchProcessor>) -> Self {
        Self { buffer_size, processor }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Run until end of stream, a read or ack failure, or cancellation.
    ///
    /// Never returns an error: every way a stream can end is reported in the
    /// summary, and nothing here is fatal to the connection.
    pub async fn run<R, W>(
        &self,
        stream_id: u64,
        mut recv: R,
        mut send: W,
        cancel: &CancellationToken,
    ) -> StreamSummary
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let mut buffer = vec![0u8; self.buffer_size];
        let mut frames_processed = 0;
        let mut frames_skipped = 0;

        debug!(stream_id, "Stream accepted");

        let end = loop {
            let read = tokio::select! {
                _ = cancel.cancelled() => break StreamEnd::Cancelled,
                read = recv.read(&mut buffer) => read,
            };

            let n = match read {
                Ok(0) => {
                    debug!(stream_id, "Stream closed by client");
                    break StreamEnd::Finished;
                }
                Ok(n) => n,
                Err(e) => {
                    warn!(stream_id, error = %e, "Error reading from stream");
                    break StreamEnd::ReadFailed;
                }
            };

            let (batch, stats) = match decode_frame(&buffer[..n]) {
                Ok(decoded) => decoded,
                Err(e) => {
                    frames_skipped += 1;
                    warn!(stream_id, bytes = n, error = %e, "Failed to decode frame, skipping");
                    continue;
                }
            };

            self.processor.process(stream_id, &batch, &stats);
            frames_processed += 1;

            let ack = acknowledgment(&batch, &stats);
            let written = tokio::select! {
                _ = cancel.cancelled() => break StreamEnd::Cancelled,
                written = send.write_all(ack.as_bytes()) => written,
            };
            if let Err(e) = written {
                error!(stream_id, error = %e, "Error writing acknowledgment");
                break StreamEnd::AckFailed;
            }
        };

        if end != StreamEnd::AckFailed {
            if let Err(e) = send.shutdown().await {
                debug!(stream_id, error = %e, "Stream send side already closed");
            }
        }

        debug!(stream_id, frames_processed, frames_skipped, ?end, "Stream task finished");
        StreamSummary { frames_processed, frames_skipped, end }
    }
}
