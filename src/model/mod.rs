//! Core telemetry data types.
//!
//! - [`SensorRecord`] is one timestamped sample set handed to the client by a producer.
//! - [`Batch`] is the Protocol Buffers message placed on the wire: every buffered
//!   record's readings concatenated in insertion order under one summary message.
//!
//! ```rust
//! use suction::model::{Batch, SensorRecord};
//!
//! let records = vec![
//!     SensorRecord::new(1_700_000_000, "a", vec![1.0, 2.0]),
//!     SensorRecord::new(1_700_000_001, "b", vec![3.0]),
//! ];
//!
//! let batch = Batch::assemble(1_700_000_002, &records);
//! assert_eq!(batch.readings, vec![1.0, 2.0, 3.0]);
//! assert_eq!(batch.message, "Batch transmission - 2 items");
//! ```

mod batch;
mod record;

pub use batch::Batch;
pub use record::SensorRecord;
