//! Criterion benchmarks for the WebSocket frame codec and log serialization.
//!
//! Every emitted log event is serialized once and framed once, then copied to
//! every browser, so these two steps bound how fast the broadcast pipeline can
//! drain a burst of events.
//!
//! Run with:
//! ```bash
//! cargo bench --package rtlog-core --bench frame_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rtlog_core::protocol::frame::{decode_header, encode_text_frame};
use rtlog_core::{LogEvent, LogLevel};

// ── Fixtures ──────────────────────────────────────────────────────────────────

/// One payload per length encoding: 7-bit, 16-bit and 64-bit.
fn payloads() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("short(64)", vec![b'a'; 64]),
        ("medium(4096)", vec![b'a'; 4096]),
        ("long(70000)", vec![b'a'; 70_000]),
    ]
}

// ── Benchmark groups ──────────────────────────────────────────────────────────

/// Benchmarks `encode_text_frame` for each length class.
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_text_frame");
    for (name, payload) in payloads() {
        group.bench_with_input(BenchmarkId::new("payload", name), &payload, |b, p| {
            b.iter(|| encode_text_frame(black_box(p)))
        });
    }
    group.finish();
}

/// Benchmarks header decoding of masked client frames.
fn bench_decode_header(c: &mut Criterion) {
    let ping = [0x89u8, 0x80, 0x11, 0x22, 0x33, 0x44];
    let mut text = vec![0x81u8, 0xFE, 0x10, 0x00, 1, 2, 3, 4];
    text.extend(std::iter::repeat(0u8).take(4096));

    let mut group = c.benchmark_group("decode_header");
    group.bench_function("masked_ping", |b| {
        b.iter(|| decode_header(black_box(&ping)).expect("valid header"))
    });
    group.bench_function("masked_text(4096)", |b| {
        b.iter(|| decode_header(black_box(&text)).expect("valid header"))
    });
    group.finish();
}

/// Benchmarks the full per-event work done by the broadcast pipeline.
fn bench_log_event_to_frame(c: &mut Criterion) {
    let event = LogEvent::now(LogLevel::Warning, "memory usage above 80% on worker pool");
    c.bench_function("log_event_to_frame", |b| {
        b.iter(|| black_box(&event).to_frame().expect("serialize"))
    });
}

criterion_group!(
    benches,
    bench_encode,
    bench_decode_header,
    bench_log_event_to_frame
);
criterion_main!(benches);
