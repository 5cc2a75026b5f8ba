use std::hint::black_box;
use std::time::{Duration, Instant};

use criterion::measurement::Measurement;
use criterion::{BenchmarkGroup, BenchmarkId, Criterion, criterion_group, criterion_main};

use rc_forest::{ForkJoinDriver, LoopDriver, RootedForest, SeqDriver};

mod common;

fn bench_apply<M, D, S>(
    group: &mut BenchmarkGroup<'_, M>,
    name: &str,
    size: usize,
    driver: D,
    schedule: S,
) where
    M: Measurement<Value = Duration>,
    D: LoopDriver,
    S: Fn(&mut common::BenchForest<D>),
{
    group.bench_function(BenchmarkId::new(name, size), |bencher| {
        bencher.iter_custom(|iters| {
            let mut total = Duration::ZERO;
            for _ in 0..iters {
                let mut forest = common::fresh_forest(driver.clone(), size);
                schedule(&mut forest);
                let start = Instant::now();
                forest.scheduled_apply();
                total += start.elapsed();
                black_box(forest.n_edges());
            }
            total
        })
    });
}

fn bench_long_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("rc_forest/long_chain_apply");
    for &size in &common::SIZES {
        common::apply_runtime_config(&mut group);
        bench_apply(&mut group, "seq", size, SeqDriver, |forest| {
            common::schedule_chain(forest, 0, size);
        });
        bench_apply(&mut group, "fork_join", size, ForkJoinDriver::default(), |forest| {
            common::schedule_chain(forest, 0, size);
        });
    }
    group.finish();

    // One checked build per size, outside the measured loops.
    for &size in &common::SIZES {
        let mut forest = common::fresh_forest(SeqDriver, size);
        common::schedule_chain(&mut forest, 0, size);
        forest.scheduled_apply();
        common::verify_chain(&forest, size);
    }
}

fn bench_large_star(c: &mut Criterion) {
    let mut group = c.benchmark_group("rc_forest/large_star_apply");
    for &size in &common::SIZES {
        common::apply_runtime_config(&mut group);
        bench_apply(&mut group, "seq", size, SeqDriver, |forest| {
            common::schedule_star(forest, 0, 1, size);
        });
        bench_apply(&mut group, "fork_join", size, ForkJoinDriver::default(), |forest| {
            common::schedule_star(forest, 0, 1, size);
        });
    }
    group.finish();
}

fn bench_two_stars_joined(c: &mut Criterion) {
    let mut group = c.benchmark_group("rc_forest/two_stars_join_apply");
    for &size in &common::SIZES {
        common::apply_runtime_config(&mut group);
        let half = size / 2;
        group.bench_function(BenchmarkId::new("seq", size), |bencher| {
            bencher.iter_custom(|iters| {
                let mut total = Duration::ZERO;
                for _ in 0..iters {
                    let mut forest = common::fresh_forest(SeqDriver, size);
                    common::schedule_star(&mut forest, 0, 1, half);
                    common::schedule_star(&mut forest, half, half + 1, size);
                    forest.scheduled_apply();
                    // Measured part: join the two hubs and re-contract.
                    forest.scheduled_attach(0, half, 1, 1).unwrap();
                    let start = Instant::now();
                    forest.scheduled_apply();
                    total += start.elapsed();
                    black_box(forest.get_path(1, half + 1).unwrap());
                }
                total
            })
        });
    }
    group.finish();
}

fn bench_incremental_growth(c: &mut Criterion) {
    let mut group = c.benchmark_group("rc_forest/incremental_chain_growth");
    let rounds = 10;
    for &size in &common::SIZES {
        common::apply_runtime_config(&mut group);
        let per_round = size / rounds;
        group.bench_function(BenchmarkId::new("seq", size), |bencher| {
            bencher.iter_custom(|iters| {
                let mut total = Duration::ZERO;
                for _ in 0..iters {
                    let mut forest = common::fresh_forest(SeqDriver, 0);
                    for round in 0..rounds {
                        let base = round * per_round;
                        for _ in 0..per_round {
                            forest.create_vertex(1);
                        }
                        common::schedule_chain(&mut forest, base, base + per_round);
                        let start = Instant::now();
                        forest.scheduled_apply();
                        total += start.elapsed();
                    }
                    black_box(forest.n_edges());
                }
                total
            })
        });
    }
    group.finish();
}

fn bench_path_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("rc_forest/chain_path_queries");
    for &size in &common::SIZES {
        common::apply_runtime_config(&mut group);
        let mut forest = common::fresh_forest(SeqDriver, size);
        common::schedule_chain(&mut forest, 0, size);
        forest.scheduled_apply();
        group.bench_function(BenchmarkId::new("seq", size), |bencher| {
            bencher.iter(|| {
                let mut acc = 0;
                for i in 0..64 {
                    let source = (i * 3_214 + 9_132) % size;
                    let target = (i * 26_466 + 913_532) % size;
                    acc += forest.get_path(source, target).unwrap();
                }
                black_box(acc)
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_long_chain,
    bench_large_star,
    bench_two_stars_joined,
    bench_incremental_growth,
    bench_path_queries,
);
criterion_main!(benches);
