//! Producer-side sample type

/// One timestamped sample set.
///
/// Immutable once created. The buffer takes ownership on insert and hands it
/// back, unchanged, exactly once on drain.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorRecord {
    timestamp: i64,
    message: String,
    readings: Vec<f32>,
}

impl SensorRecord {
    /// Create a new record
    pub fn new(timestamp: i64, message: impl Into<String>, readings: Vec<f32>) -> Self {
        Self { timestamp, message: message.into(), readings }
    }

    /// Create a record stamped with the current wall clock (epoch seconds)
    pub fn now(message: impl Into<String>, readings: Vec<f32>) -> Self {
        Self::new(chrono::Utc::now().timestamp(), message, readings)
    }

    /// Epoch seconds at which the samples were taken
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Short free-form description
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Ordered sensor readings
    pub fn readings(&self) -> &[f32] {
        &self.readings
    }
}
