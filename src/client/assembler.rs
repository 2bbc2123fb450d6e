//! Batch assembly on a fixed tick.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::session::{Link, TransportSession};
use crate::buffer::RecordBuffer;
use crate::codec::{EncodedFrame, encode_frame};
use crate::model::Batch;
use crate::{Result, TelemetryError};

/// One assembled frame plus the counts that went into it
#[derive(Debug, Clone)]
pub struct AssembledFrame {
    pub frame: EncodedFrame,
    pub record_count: usize,
    pub reading_count: usize,
}

/// Drains the buffer every tick and writes one compressed batch per tick.
#[derive(Debug, Clone)]
pub struct BatchAssembler {
    buffer: Arc<RecordBuffer>,
    interval: Duration,
}

impl BatchAssembler {
    pub fn new(buffer: Arc<RecordBuffer>, interval: Duration) -> Self {
        Self { buffer, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Drain and encode one batch.
    ///
    /// Returns `Ok(None)` when nothing is pending. An encoding error drops the
    /// drained records.
    pub fn assemble(&self) -> Result<Option<AssembledFrame>> {
        let records = self.buffer.drain_all();
        if records.is_empty() {
            return Ok(None);
        }

        let batch = Batch::assemble(chrono::Utc::now().timestamp(), &records);
        let reading_count = batch.readings.len();
        let frame = encode_frame(&batch)?;

        Ok(Some(AssembledFrame { frame, record_count: records.len(), reading_count }))
    }

    /// Tick until the session fails or `cancel` fires. Never returns `Ok`.
    ///
    /// Encoding failures are logged and skip the tick. A write failure ends the
    /// session and is returned; cancellation returns [`TelemetryError::Cancelled`].
    pub async fn run<L: Link>(
        &self,
        session: &mut TransportSession<L>,
        cancel: &CancellationToken,
    ) -> Result<Infallible> {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(interval = ?self.interval, "Batch assembler started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Batch assembler received shutdown signal, stopping");
                    return Err(TelemetryError::Cancelled);
                }
                _ = ticker.tick() => {}
            }

            let assembled = match self.assemble() {
                Ok(Some(assembled)) => assembled,
                Ok(None) => {
                    debug!("No records pending, skipping tick");
                    continue;
                }
                Err(e) => {
                    error!(error = %e, "Failed to encode batch, dropping it");
                    continue;
                }
            };

            session.send(&assembled.frame.bytes).await?;

            let stats = assembled.frame.stats;
            info!(
                batch_items = assembled.record_count,
                total_sensors = assembled.reading_count,
                protobuf_size = stats.original_len,
                compressed_size = stats.compressed_len,
                compression_ratio_percent = stats.ratio_percent(),
                size_reduction_bytes = stats.bytes_saved(),
                "Sent compressed batch"
            );
        }
    }
}
