//! Wire batch message

use super::SensorRecord;
use crate::{Result, TelemetryError};

/// Aggregated telemetry for one send cycle.
///
/// Field tags are part of the wire contract shared with the collector.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Batch {
    /// Epoch seconds at assembly time
    #[prost(int64, tag = "1")]
    pub timestamp: i64,

    /// Human-readable summary
    #[prost(string, tag = "2")]
    pub message: String,

    /// Concatenated readings of every record, in drain order
    #[prost(float, repeated, tag = "3")]
    pub readings: Vec<f32>,
}

impl Batch {
    /// Merge drained records into one batch.
    ///
    /// Records keep their insertion order and each record's readings keep their
    /// own order.
    pub fn assemble(timestamp: i64, records: &[SensorRecord]) -> Self {
        let total: usize = records.iter().map(|r| r.readings().len()).sum();
        let mut readings = Vec::with_capacity(total);
        for record in records {
            readings.extend_from_slice(record.readings());
        }

        Self {
            timestamp,
            message: format!("Batch transmission - {} items", records.len()),
            readings,
        }
    }

    /// Check a decoded batch before it is handed to processing.
    ///
    /// Readings are passed through as-is, NaN and infinities included: the
    /// client never filters them, so rejecting them here would drop every
    /// other reading in the batch.
    pub fn validate(&self) -> Result<()> {
        if self.timestamp < 0 {
            return Err(TelemetryError::InvalidBatch {
                reason: format!("negative timestamp {}", self.timestamp),
            });
        }

        Ok(())
    }
}
