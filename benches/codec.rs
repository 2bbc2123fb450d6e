//! Benchmarks for the wire codec and batch assembly
//!
//! One tick at the default producer rate is 10 records of 100-300 readings;
//! the larger sizes cover a client that fell behind while disconnected.
//!
//! Platform: Cross-platform, CI-safe

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use suction::codec::{decode_frame, encode_frame};
use suction::model::Batch;
use suction::test_utils::{filled_buffer, sample_batch, sample_records};

const RECORD_COUNTS: [usize; 3] = [10, 100, 1000];
const READINGS_PER_RECORD: usize = 200;

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_frame");

    for records in RECORD_COUNTS {
        let batch = sample_batch(records, READINGS_PER_RECORD);
        group.throughput(Throughput::Elements((records * READINGS_PER_RECORD) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(records), &batch, |b, batch| {
            b.iter(|| black_box(encode_frame(black_box(batch)).unwrap()))
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_frame");

    for records in RECORD_COUNTS {
        let frame = encode_frame(&sample_batch(records, READINGS_PER_RECORD)).unwrap();
        group.throughput(Throughput::Bytes(frame.bytes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(records), &frame.bytes, |b, bytes| {
            b.iter(|| black_box(decode_frame(black_box(bytes)).unwrap()))
        });
    }

    group.finish();
}

fn bench_assemble(c: &mut Criterion) {
    let records = sample_records(100, READINGS_PER_RECORD);

    c.bench_function("assemble_100_records", |b| {
        b.iter(|| black_box(Batch::assemble(black_box(0), black_box(&records))))
    });

    c.bench_function("drain_and_assemble_100_records", |b| {
        b.iter_batched(
            || filled_buffer(100, READINGS_PER_RECORD),
            |buffer| {
                let drained = buffer.drain_all();
                black_box(Batch::assemble(0, &drained))
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_assemble);
criterion_main!(benches);
