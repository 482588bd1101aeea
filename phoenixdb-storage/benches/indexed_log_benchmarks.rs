//! Benchmarks for the indexed-log primitive
//!
//! Run with: cargo bench --bench indexed_log_benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use phoenixdb_core::LogStructure;
use phoenixdb_storage::indexed_log::{IndexedLog, OpenMode};
use tempfile::TempDir;

fn bench_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("indexed_log_put");

    for structure in [LogStructure::Btree, LogStructure::Hash] {
        group.bench_function(format!("{:?}", structure), |b| {
            let dir = TempDir::new().unwrap();
            let log =
                IndexedLog::open(dir.path().join("bench.db"), OpenMode::Write, structure)
                    .unwrap();
            let mut i = 0u64;
            b.iter(|| {
                let key = format!("key{}", i % 10_000);
                log.put(key.as_bytes(), b"*3\n$3\nSET\n$5\nkey00\n$5\nvalue\n")
                    .unwrap();
                i += 1;
            });
        });
    }
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("indexed_log_lookup");

    for structure in [LogStructure::Btree, LogStructure::Hash] {
        group.bench_function(format!("{:?}", structure), |b| {
            let dir = TempDir::new().unwrap();
            let log =
                IndexedLog::open(dir.path().join("bench.db"), OpenMode::Write, structure)
                    .unwrap();
            for i in 0..10_000u64 {
                let key = format!("key{}", i);
                log.put(key.as_bytes(), b"value").unwrap();
            }

            let mut i = 0u64;
            b.iter(|| {
                let key = format!("key{}", i % 10_000);
                black_box(log.lookup(key.as_bytes()).unwrap());
                i += 1;
            });
        });
    }
    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    c.bench_function("indexed_log_scan_10k", |b| {
        let dir = TempDir::new().unwrap();
        let log = IndexedLog::open(
            dir.path().join("bench.db"),
            OpenMode::Write,
            LogStructure::Btree,
        )
        .unwrap();
        for i in 0..10_000u64 {
            log.put(format!("key{}", i).as_bytes(), b"value").unwrap();
        }

        b.iter(|| {
            let mut cursor = log.scan();
            let mut count = 0u64;
            while let Some(pair) = cursor.next().unwrap() {
                black_box(pair);
                count += 1;
            }
            assert_eq!(count, 10_000);
        });
    });
}

criterion_group!(benches, bench_put, bench_lookup, bench_scan);
criterion_main!(benches);
