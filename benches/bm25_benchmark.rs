//! Benchmarks for the BM25 inverted index (C2): ingest and query throughput
//! as corpus size grows.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use washi_search::index::bm25::{Bm25Index, Bm25Params};

fn generate_docs(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            format!(
                "ラーメン屋の{i}番目のレビューです。{}についての感想を書きます。",
                match i % 5 {
                    0 => "味噌ラーメン",
                    1 => "豚骨スープ",
                    2 => "醤油ラーメン",
                    3 => "つけ麺",
                    _ => "塩ラーメン",
                }
            )
        })
        .collect()
}

fn bench_bm25_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("bm25_add");

    for size in [100, 1_000, 10_000] {
        let docs = generate_docs(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &docs, |b, docs| {
            b.iter(|| {
                let index = Bm25Index::open_in_memory(Bm25Params::default()).unwrap();
                index.add(black_box(docs)).unwrap();
                black_box(index)
            });
        });
    }

    group.finish();
}

fn bench_bm25_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("bm25_search");

    for size in [1_000, 10_000, 100_000] {
        let docs = generate_docs(size);
        let index = Bm25Index::open_in_memory(Bm25Params::default()).unwrap();
        index.add(&docs).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(size), &index, |b, index| {
            b.iter(|| black_box(index.search("味噌ラーメン", 10).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_bm25_add, bench_bm25_search);
criterion_main!(benches);
