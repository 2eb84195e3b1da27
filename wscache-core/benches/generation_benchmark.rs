use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use std::sync::Arc;
use std::thread;
use wscache_core::{Generation, MAX_SUBVALUE_LEN};

const MAX_BYTES: usize = 64 * 1024 * 1024;

fn bench_set_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_sequential");

    for size in [16usize, 256, 4096].iter() {
        let generation = Generation::new(MAX_BYTES);
        let value = vec![7u8; *size];
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            let mut i = 0u64;
            b.iter(|| {
                generation.set(&i.to_le_bytes(), black_box(&value));
                i += 1;
            });
        });
    }

    group.finish();
}

fn bench_get_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_sequential");

    for entries in [1_000u64, 100_000].iter() {
        let generation = Generation::new(MAX_BYTES);
        for i in 0..*entries {
            generation.set(&i.to_le_bytes(), &i.to_be_bytes());
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(entries),
            entries,
            |b, &entries| {
                let mut dst = Vec::with_capacity(8);
                let mut i = 0u64;
                b.iter(|| {
                    dst.clear();
                    black_box(generation.get(&mut dst, &(i % entries).to_le_bytes()));
                    i += 1;
                });
            },
        );
    }

    group.finish();
}

fn bench_concurrent_mixed(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_mixed");

    for num_threads in [2, 4, 8].iter() {
        let generation = Arc::new(Generation::new(MAX_BYTES));
        group.bench_with_input(
            BenchmarkId::from_parameter(num_threads),
            num_threads,
            |b, &num_threads| {
                b.iter(|| {
                    let handles: Vec<_> = (0..num_threads)
                        .map(|t| {
                            let generation = Arc::clone(&generation);
                            thread::spawn(move || {
                                let mut dst = Vec::new();
                                for i in 0..1000u64 {
                                    let key = (t as u64 * 1000 + i).to_le_bytes();
                                    if i % 4 == 0 {
                                        generation.set(&key, &i.to_le_bytes());
                                    } else {
                                        dst.clear();
                                        black_box(generation.get(&mut dst, &key));
                                    }
                                }
                            })
                        })
                        .collect();

                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_big_values(c: &mut Criterion) {
    let mut group = c.benchmark_group("big_values");
    let generation = Generation::new(MAX_BYTES);
    let value = vec![3u8; 4 * MAX_SUBVALUE_LEN];
    generation.set_big(b"blob", &value);

    group.bench_function("set_big", |b| {
        b.iter(|| generation.set_big(b"blob", black_box(&value)));
    });
    group.bench_function("get_big", |b| {
        let mut dst = Vec::with_capacity(value.len());
        b.iter(|| {
            dst.clear();
            black_box(generation.get_big(&mut dst, b"blob"));
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_set_sequential,
    bench_get_sequential,
    bench_concurrent_mixed,
    bench_big_values
);
criterion_main!(benches);
