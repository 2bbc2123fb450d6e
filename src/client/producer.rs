//! Synthetic record producer.
//!
//! Stands in for real sensor hardware: every tick it inserts one record with
//! 100 to 299 random readings in `[0, 100)`.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::buffer::RecordBuffer;
use crate::model::SensorRecord;

const MIN_READINGS: usize = 100;
const MAX_READINGS: usize = 300;

/// Generates random records into a buffer on a fixed interval.
#[derive(Debug, Clone)]
pub struct SyntheticProducer {
    buffer: Arc<RecordBuffer>,
    interval: Duration,
}

impl SyntheticProducer {
    pub fn new(buffer: Arc<RecordBuffer>, interval: Duration) -> Self {
        Self { buffer, interval }
    }

    /// Build one random record.
    pub fn generate() -> SensorRecord {
        let mut rng = rand::rng();
        let count = rng.random_range(MIN_READINGS..MAX_READINGS);
        let readings = (0..count).map(|_| rng.random::<f32>() * 100.0).collect();
        let label = rng.random_range(0..1000);
        SensorRecord::now(format!("Test data {label}"), readings)
    }

    /// Insert records until cancelled. Returns how many were produced.
    pub async fn run(self, cancel: CancellationToken) -> u64 {
        let mut ticker = tokio::time::interval(self.interval);
        let mut produced = 0u64;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let record = Self::generate();
            let message = record.message().to_string();
            self.buffer.insert(record);
            produced += 1;

            debug!(pool_size = self.buffer.len(), message = %message, "External data added to pool");
        }

        info!(produced, "Synthetic producer stopped");
        produced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_records_stay_in_range() {
        for _ in 0..50 {
            let record = SyntheticProducer::generate();
            assert!((MIN_READINGS..MAX_READINGS).contains(&record.readings().len()));
            assert!(record.readings().iter().all(|r| (0.0..100.0).contains(r)));
            assert!(record.message().starts_with("Test data "));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fills_buffer_until_cancelled() {
        let buffer = Arc::new(RecordBuffer::new());
        let cancel = CancellationToken::new();
        let producer = SyntheticProducer::new(Arc::clone(&buffer), Duration::from_millis(100));
        let handle = tokio::spawn(producer.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(450)).await;
        cancel.cancel();
        let produced = handle.await.unwrap();

        // First tick fires immediately, then every 100ms.
        assert_eq!(produced, 5);
        assert_eq!(buffer.len(), 5);
    }
}
