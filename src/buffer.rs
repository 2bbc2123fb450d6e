//! Pending-record buffer shared by producers and the batch assembler.
//!
//! Producers call [`RecordBuffer::insert`] from any thread; the assembler is
//! the sole caller of [`RecordBuffer::drain_all`]. Both operations hold one
//! mutex only long enough to push or swap the backing vector, never across an
//! await point or a network call.
//!
//! The buffer is unbounded. A producer that outpaces the assembler grows
//! memory without limit; callers can watch [`RecordBuffer::len`] to detect it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::model::SensorRecord;

/// Thread-safe, append-only collection of records awaiting assembly.
#[derive(Debug, Default)]
pub struct RecordBuffer {
    records: Mutex<Vec<SensorRecord>>,
    inserted: AtomicU64,
    drained: AtomicU64,
}

impl RecordBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record. Amortized O(1).
    pub fn insert(&self, record: SensorRecord) {
        let mut records = self.lock();
        records.push(record);
        self.inserted.fetch_add(1, Ordering::Relaxed);
    }

    /// Remove and return every record inserted since the previous drain, in
    /// insertion order.
    ///
    /// Returns an empty vector when nothing is pending.
    pub fn drain_all(&self) -> Vec<SensorRecord> {
        let drained = std::mem::take(&mut *self.lock());
        self.drained.fetch_add(drained.len() as u64, Ordering::Relaxed);
        drained
    }

    /// Number of records currently pending
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no records are pending
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Lifetime count of inserted records
    pub fn total_inserted(&self) -> u64 {
        self.inserted.load(Ordering::Relaxed)
    }

    /// Lifetime count of drained records
    pub fn total_drained(&self) -> u64 {
        self.drained.load(Ordering::Relaxed)
    }

    // A panic while holding the lock cannot leave the Vec half-written, so a
    // poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Vec<SensorRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn record(id: usize) -> SensorRecord {
        SensorRecord::new(id as i64, format!("record {id}"), vec![id as f32])
    }

    #[test]
    fn drain_on_empty_returns_empty() {
        let buffer = RecordBuffer::new();
        assert!(buffer.drain_all().is_empty());
        assert!(buffer.is_empty());
    }

    #[test]
    fn drain_preserves_insertion_order_and_empties() {
        let buffer = RecordBuffer::new();
        for id in 0..5 {
            buffer.insert(record(id));
        }
        assert_eq!(buffer.len(), 5);

        let drained = buffer.drain_all();
        let ids: Vec<i64> = drained.iter().map(SensorRecord::timestamp).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);

        assert!(buffer.is_empty());
        assert!(buffer.drain_all().is_empty());
        assert_eq!(buffer.total_inserted(), 5);
        assert_eq!(buffer.total_drained(), 5);
    }

    #[test]
    fn concurrent_inserts_are_drained_exactly_once() {
        const PRODUCERS: usize = 8;
        const PER_PRODUCER: usize = 500;

        let buffer = Arc::new(RecordBuffer::new());
        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let buffer = Arc::clone(&buffer);
                std::thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        buffer.insert(record(p * PER_PRODUCER + i));
                    }
                })
            })
            .collect();

        let mut drains = Vec::new();
        while producers.iter().any(|h| !h.is_finished()) {
            drains.push(buffer.drain_all());
            std::thread::yield_now();
        }
        for handle in producers {
            handle.join().unwrap();
        }
        drains.push(buffer.drain_all());

        let mut seen = HashSet::new();
        for drain in &drains {
            // Within one drain, each producer's records keep their relative order.
            let mut last_per_producer = vec![None; PRODUCERS];
            for r in drain {
                let id = r.timestamp() as usize;
                assert!(seen.insert(id), "record {id} drained twice");
                let producer = id / PER_PRODUCER;
                if let Some(prev) = last_per_producer[producer] {
                    assert!(id > prev);
                }
                last_per_producer[producer] = Some(id);
            }
        }
        assert_eq!(seen.len(), PRODUCERS * PER_PRODUCER);
    }

    proptest! {
        #[test]
        fn interleaved_drains_partition_inserts(
            ops in prop::collection::vec(prop::bool::weighted(0.8), 0..200)
        ) {
            // true = insert next id, false = drain
            let buffer = RecordBuffer::new();
            let mut next = 0usize;
            let mut collected = Vec::new();

            for op in ops {
                if op {
                    buffer.insert(record(next));
                    next += 1;
                } else {
                    collected.extend(buffer.drain_all());
                }
            }
            collected.extend(buffer.drain_all());

            let ids: Vec<usize> = collected.iter().map(|r| r.timestamp() as usize).collect();
            prop_assert_eq!(ids, (0..next).collect::<Vec<_>>());
        }
    }
}
