//! Processing collaborator for decoded batches.

use tracing::info;

use crate::codec::FrameStats;
use crate::model::Batch;

/// Receives every batch that decoded and validated successfully.
///
/// Called from the per-stream decode task, so implementations must be cheap or
/// hand work off elsewhere; there is no return value and no backpressure.
pub trait BatchProcessor: Send + Sync + 'static {
    fn process(&self, stream_id: u64, batch: &Batch, stats: &FrameStats);
}

/// Default processor: one structured log event per batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingProcessor;

impl BatchProcessor for LoggingProcessor {
    fn process(&self, stream_id: u64, batch: &Batch, stats: &FrameStats) {
        info!(
            stream_id,
            message = %batch.message,
            timestamp = batch.timestamp,
            sensor_count = batch.readings.len(),
            original_size = stats.original_len,
            compressed_size = stats.compressed_len,
            compression_ratio_percent = stats.ratio_percent(),
            "Received compressed batch"
        );
    }
}

impl<F> BatchProcessor for F
where
    F: Fn(u64, &Batch, &FrameStats) + Send + Sync + 'static,
{
    fn process(&self, stream_id: u64, batch: &Batch, stats: &FrameStats) {
        self(stream_id, batch, stats)
    }
}
