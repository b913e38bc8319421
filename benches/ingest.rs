//! Benchmarks for the ingestion hot path
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use firewatch_rs::protocol::{parse_record, LineFramer};

const FULL_RECORD: &str =
    "Gas:412.00,ZScore:0.53,Trend:1.20,Risk:12.5,Flame:0,FlamePersist:0,State:SAFE";
const BASE_RECORD: &str = "Gas:412.00,ZScore:0.53,Risk:12.5,Flame:0,State:SAFE";
const NOISE_LINE: &str = "Learning Baseline... 412.33";

fn bench_parse_record(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_record");
    group.throughput(Throughput::Elements(1));

    group.bench_function("full_layout", |b| {
        b.iter(|| parse_record(black_box(FULL_RECORD)))
    });

    // The narrowest layout costs two failed layout attempts first.
    group.bench_function("base_layout", |b| {
        b.iter(|| parse_record(black_box(BASE_RECORD)))
    });

    group.bench_function("reject_noise", |b| {
        b.iter(|| parse_record(black_box(NOISE_LINE)))
    });

    group.finish();
}

fn bench_framer(c: &mut Criterion) {
    let mut group = c.benchmark_group("line_framer");

    let mut bulk = String::new();
    for _ in 0..100 {
        bulk.push_str(FULL_RECORD);
        bulk.push('\n');
    }

    group.throughput(Throughput::Elements(100));
    group.bench_function("feed_100_lines", |b| {
        b.iter(|| {
            let mut framer = LineFramer::new();
            black_box(framer.feed(black_box(&bulk)))
        })
    });

    // Worst case: every read delivers a fragment of a line.
    let fragments: Vec<&str> = FULL_RECORD.split_inclusive(',').collect();
    group.throughput(Throughput::Elements(1));
    group.bench_function("feed_fragmented_line", |b| {
        b.iter(|| {
            let mut framer = LineFramer::new();
            for fragment in &fragments {
                black_box(framer.feed(black_box(fragment)));
            }
            black_box(framer.feed("\n"))
        })
    });

    group.finish();
}

criterion_group!(benches, bench_parse_record, bench_framer);
criterion_main!(benches);
