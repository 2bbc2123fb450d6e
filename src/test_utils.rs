//! Deterministic telemetry fixtures for tests and benchmarks.

#![cfg(any(test, feature = "benchmark"))]

use crate::buffer::RecordBuffer;
use crate::model::{Batch, SensorRecord};

/// Epoch seconds used as the base timestamp of every fixture
pub const FIXTURE_EPOCH: i64 = 1_700_000_000;

/// A smooth, repeatable reading sequence in `[0, 100)`.
///
/// `phase` shifts the waveform so different records are distinguishable.
pub fn sample_readings(count: usize, phase: f32) -> Vec<f32> {
    (0..count).map(|i| ((i as f32 + phase) * 0.37).sin().mul_add(49.5, 50.0)).collect()
}

/// `records` records of `readings_per_record` readings each, one second apart.
pub fn sample_records(records: usize, readings_per_record: usize) -> Vec<SensorRecord> {
    (0..records)
        .map(|i| {
            SensorRecord::new(
                FIXTURE_EPOCH + i as i64,
                format!("Test data {i}"),
                sample_readings(readings_per_record, i as f32),
            )
        })
        .collect()
}

/// A batch assembled from [`sample_records`].
pub fn sample_batch(records: usize, readings_per_record: usize) -> Batch {
    Batch::assemble(FIXTURE_EPOCH, &sample_records(records, readings_per_record))
}

/// A buffer pre-filled with [`sample_records`].
pub fn filled_buffer(records: usize, readings_per_record: usize) -> RecordBuffer {
    let buffer = RecordBuffer::new();
    for record in sample_records(records, readings_per_record) {
        buffer.insert(record);
    }
    buffer
}
