//! Wire frame encoding.
//!
//! A frame is the exact byte sequence of one stream write: the Protocol Buffers
//! encoding of a [`Batch`], compressed with the Snappy raw block format. No
//! length prefix is added, so the collector relies on one write arriving as one
//! read.
//!
//! ```rust
//! use suction::codec::{decode_frame, encode_frame};
//! use suction::model::Batch;
//!
//! let batch = Batch { timestamp: 42, message: "hello".into(), readings: vec![1.5, 2.5] };
//! let frame = encode_frame(&batch)?;
//!
//! let (decoded, stats) = decode_frame(&frame.bytes)?;
//! assert_eq!(decoded, batch);
//! assert_eq!(stats.compressed_len, frame.bytes.len());
//! # Ok::<(), suction::TelemetryError>(())
//! ```

use bytes::Bytes;
use prost::Message;

use crate::model::Batch;
use crate::{Result, TelemetryError};

/// Size statistics for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    /// Serialized (uncompressed) size in bytes
    pub original_len: usize,

    /// Size on the wire in bytes
    pub compressed_len: usize,
}

impl FrameStats {
    /// Compressed size as a percentage of the original size
    pub fn ratio_percent(&self) -> f64 {
        if self.original_len == 0 {
            return 0.0;
        }
        self.compressed_len as f64 / self.original_len as f64 * 100.0
    }

    /// Bytes saved by compression (negative when compression inflated the frame)
    pub fn bytes_saved(&self) -> i64 {
        self.original_len as i64 - self.compressed_len as i64
    }
}

/// A compressed frame ready for a single stream write
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// Compressed bytes
    pub bytes: Bytes,

    /// Size statistics
    pub stats: FrameStats,
}

/// Serialize and compress a batch.
pub fn encode_frame(batch: &Batch) -> Result<EncodedFrame> {
    let serialized = batch.encode_to_vec();
    let compressed = snap::raw::Encoder::new()
        .compress_vec(&serialized)
        .map_err(|e| TelemetryError::Encode { details: e.to_string() })?;

    let stats = FrameStats { original_len: serialized.len(), compressed_len: compressed.len() };
    Ok(EncodedFrame { bytes: compressed.into(), stats })
}

/// Decompress, deserialize and validate one frame.
pub fn decode_frame(data: &[u8]) -> Result<(Batch, FrameStats)> {
    let decompressed = snap::raw::Decoder::new()
        .decompress_vec(data)
        .map_err(|source| TelemetryError::Decompress { len: data.len(), source })?;

    let batch =
        Batch::decode(decompressed.as_slice()).map_err(|source| TelemetryError::Decode { source })?;
    batch.validate()?;

    let stats = FrameStats { original_len: decompressed.len(), compressed_len: data.len() };
    Ok((batch, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn decode_recovers_encoded_batch(
            timestamp in 0i64..i64::MAX,
            message in ".{0,64}",
            readings in prop::collection::vec(any::<f32>(), 0..512),
        ) {
            let batch = Batch { timestamp, message, readings };
            let frame = encode_frame(&batch).unwrap();
            let (decoded, stats) = decode_frame(&frame.bytes).unwrap();

            // NaN != NaN, so readings are compared bit for bit.
            prop_assert_eq!(decoded.timestamp, batch.timestamp);
            prop_assert_eq!(&decoded.message, &batch.message);
            prop_assert_eq!(bits(&decoded.readings), bits(&batch.readings));
            prop_assert_eq!(stats, frame.stats);
        }

        #[test]
        fn arbitrary_bytes_never_panic(data in prop::collection::vec(any::<u8>(), 0..256)) {
            let _ = decode_frame(&data);
        }
    }

    #[test]
    fn corrupt_frame_is_a_decompress_error() {
        let garbage = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff];
        let err = decode_frame(&garbage).unwrap_err();
        assert!(matches!(err, TelemetryError::Decompress { len: 7, .. }));
    }

    #[test]
    fn non_protobuf_payload_is_a_decode_error() {
        let compressed = snap::raw::Encoder::new().compress_vec(&[0xff, 0xff, 0xff]).unwrap();
        let err = decode_frame(&compressed).unwrap_err();
        assert!(matches!(err, TelemetryError::Decode { .. }));
    }

    fn bits(readings: &[f32]) -> Vec<u32> {
        readings.iter().map(|r| r.to_bits()).collect()
    }

    #[test]
    fn invalid_batch_is_rejected_after_decoding() {
        let batch = Batch { timestamp: -1, message: "bad".into(), readings: vec![1.0] };
        let frame = encode_frame(&batch).unwrap();
        assert!(matches!(decode_frame(&frame.bytes), Err(TelemetryError::InvalidBatch { .. })));
    }

    #[test]
    fn non_finite_readings_survive_the_round_trip() {
        let readings = vec![1.0, f32::NAN, f32::INFINITY, f32::NEG_INFINITY, -0.0];
        let batch = Batch { timestamp: 1, message: "edge".into(), readings };
        let frame = encode_frame(&batch).unwrap();

        let (decoded, _) = decode_frame(&frame.bytes).unwrap();
        assert_eq!(bits(&decoded.readings), bits(&batch.readings));
    }

    #[test]
    fn ratio_reflects_sizes() {
        let stats = FrameStats { original_len: 200, compressed_len: 50 };
        assert!((stats.ratio_percent() - 25.0).abs() < f64::EPSILON);
        assert_eq!(stats.bytes_saved(), 150);

        let empty = FrameStats { original_len: 0, compressed_len: 0 };
        assert_eq!(empty.ratio_percent(), 0.0);
    }

    #[test]
    fn full_size_batch_survives_the_wire() {
        // One second of synthetic producer output.
        let batch = crate::test_utils::sample_batch(10, 300);
        let frame = encode_frame(&batch).unwrap();
        let (decoded, _) = decode_frame(&frame.bytes).unwrap();
        assert_eq!(decoded.readings.len(), 3000);
        assert_eq!(decoded, batch);
    }

    #[test]
    fn repetitive_readings_compress() {
        let batch = Batch { timestamp: 1, message: "flat".into(), readings: vec![20.0; 1024] };
        let frame = encode_frame(&batch).unwrap();
        assert!(frame.stats.compressed_len < frame.stats.original_len);
    }
}
