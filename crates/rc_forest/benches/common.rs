use std::time::Duration;

use criterion::BenchmarkGroup;
use criterion::measurement::Measurement;

use rc_forest::policy::I64Sum;
use rc_forest::{LoopDriver, NoLoopOracle, RcForest, RootedForest};

pub const SIZES: [usize; 3] = [4_096, 16_384, 65_536];
pub const BENCH_SEED: u64 = 0x5EED_2026;

const SAMPLE_SIZE: usize = 10;
const WARM_UP_MS: u64 = 300;
const MEASURE_MS: u64 = 1_000;

pub fn apply_runtime_config<M: Measurement>(group: &mut BenchmarkGroup<'_, M>) {
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(Duration::from_millis(WARM_UP_MS));
    group.measurement_time(Duration::from_millis(MEASURE_MS));
}

pub type BenchForest<D> = RcForest<I64Sum, I64Sum, NoLoopOracle, D>;

/// Unit-labelled forest with `size` fresh vertices and no edges.
pub fn fresh_forest<D: LoopDriver>(driver: D, size: usize) -> BenchForest<D> {
    let mut forest = BenchForest::with_driver_and_seed(driver, BENCH_SEED);
    for _ in 0..size {
        forest.create_vertex(1);
    }
    forest
}

/// Schedules a chain `0 -> 1 -> ... -> size-1` without applying.
pub fn schedule_chain<D: LoopDriver>(forest: &mut BenchForest<D>, from: usize, until: usize) {
    for i in from..until {
        if i > 0 {
            forest.scheduled_attach(i - 1, i, 1, 1).unwrap();
        }
    }
}

/// Schedules a star centered at `center` without applying.
pub fn schedule_star<D: LoopDriver>(
    forest: &mut BenchForest<D>,
    center: usize,
    from: usize,
    until: usize,
) {
    for i in from..until {
        if i != center {
            forest.scheduled_attach(center, i, 1, 1).unwrap();
        }
    }
}

/// Closed-form self-check for unit chains; catches a miscontraction
/// before it pollutes a measurement.
pub fn verify_chain<D: LoopDriver>(forest: &BenchForest<D>, size: usize) {
    for i in 0..8 {
        let source = ((i * 3_214 + 9_132) % size + size) % size;
        let target = ((i * 26_466 + 913_532) % size + size) % size;
        let expected = (source as i64 - target as i64).abs();
        assert_eq!(forest.get_path(source, target).unwrap(), expected);
        assert_eq!(forest.get_subtree(source).unwrap(), (size - source) as i64);
    }
}
