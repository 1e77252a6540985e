//! Criterion benchmarks for the frame codec and the inbound reassembly path.
//!
//! Run with:
//! ```bash
//! cargo bench --package ipc-core --bench frame_bench
//! ```

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ipc_core::connection::ReadAssembler;
use ipc_core::{encode_frame, extract, DEFAULT_MAX_FRAME_SIZE};

const PAYLOAD_SIZES: &[usize] = &[0, 64, 4 * 1024, 256 * 1024];

/// Benchmarks `encode_frame` across payload sizes.
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_frame");
    for &size in PAYLOAD_SIZES {
        let payload = vec![0xA5u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("payload", size), &payload, |b, payload| {
            b.iter(|| encode_frame(black_box("Settings"), black_box(payload)))
        });
    }
    group.finish();
}

/// Benchmarks `extract` on a buffer holding exactly one frame.
fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract");
    for &size in PAYLOAD_SIZES {
        let encoded = encode_frame("Settings", &vec![0x5Au8; size]);
        group.throughput(Throughput::Bytes(encoded.len() as u64));
        group.bench_with_input(BenchmarkId::new("payload", size), &encoded, |b, encoded| {
            b.iter(|| {
                let mut buffer = BytesMut::from(&encoded[..]);
                extract(black_box(&mut buffer))
            })
        });
    }
    group.finish();
}

/// Benchmarks the assembler on the two delivery shapes a socket produces.
fn bench_assembler(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_assembler");

    // 64 small frames coalesced into one read
    let coalesced: Vec<u8> = (0..64u8)
        .flat_map(|i| encode_frame("Ping", &[i; 8]))
        .collect();
    group.throughput(Throughput::Bytes(coalesced.len() as u64));
    group.bench_function("coalesced_64", |b| {
        b.iter(|| {
            let mut reads = ReadAssembler::new(DEFAULT_MAX_FRAME_SIZE);
            reads.push_and_drain(black_box(&coalesced)).expect("valid frames")
        })
    });

    // One 64 KiB frame delivered in 1 KiB fragments
    let large = encode_frame("Blob", &vec![0u8; 64 * 1024]);
    group.throughput(Throughput::Bytes(large.len() as u64));
    group.bench_function("fragmented_64k", |b| {
        b.iter(|| {
            let mut reads = ReadAssembler::new(DEFAULT_MAX_FRAME_SIZE);
            let mut frames = Vec::new();
            for chunk in large.chunks(1024) {
                frames.extend(reads.push_and_drain(black_box(chunk)).expect("valid frame"));
            }
            frames
        })
    });

    group.finish();
}

criterion_group!(benches, bench_encode, bench_extract, bench_assembler);
criterion_main!(benches);
