//! Framing and decode throughput/latency benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use market_feed::{decode_record, decode_tick, LineFramer, Tick};

const SYMBOLS: [&str; 8] = ["AAPL", "GOOGL", "MSFT", "TSLA", "AMZN", "META", "NVDA", "NFLX"];

fn create_feed_buffer(msg_count: usize) -> Vec<u8> {
    let mut buffer = Vec::new();

    for seq in 0..msg_count {
        let tick = Tick::new(
            SYMBOLS[seq % SYMBOLS.len()],
            100.0 + (seq % 200) as f64 * 0.05,
            (100 + seq % 4900) as i64,
            format!("2024-01-02T09:30:00.{:06}Z,{}", seq % 1_000_000, seq),
        );
        buffer.extend_from_slice(tick.to_wire().as_bytes());
    }

    buffer
}

fn bench_frame_and_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_and_decode");

    for msg_count in [1000, 10000, 100000].iter() {
        let buffer = black_box(create_feed_buffer(*msg_count));

        group.bench_with_input(BenchmarkId::from_parameter(msg_count), msg_count, |b, _| {
            b.iter(|| {
                let mut framer = LineFramer::new();
                let mut count = 0;
                // Socket-sized reads
                for chunk in buffer.chunks(4096) {
                    framer.push(chunk, |record| {
                        if decode_record(record).is_ok() {
                            count += 1;
                        }
                    });
                }
                count
            });
        });
    }
    group.finish();
}

fn bench_decode_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_latency");

    let valid = "AAPL,150.25,1200,2024-01-02T09:30:00.000123Z,42";
    let bad_price = "AAPL,15o.25,1200,2024-01-02T09:30:00.000123Z";
    let truncated = "AAPL,150.25";

    group.bench_function("valid", |b| b.iter(|| decode_tick(black_box(valid))));
    group.bench_function("bad_price", |b| b.iter(|| decode_tick(black_box(bad_price))));
    group.bench_function("truncated", |b| b.iter(|| decode_tick(black_box(truncated))));

    group.finish();
}

criterion_group!(benches, bench_frame_and_decode, bench_decode_latency);
criterion_main!(benches);
