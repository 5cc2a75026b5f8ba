//! Looping drivers: the execution model of `scheduled_apply`.
//!
//! The contraction engine is written against [`LoopDriver`] and never
//! spawns threads itself. A driver must run every body exactly once and
//! synchronize fully before returning; within one `for_each` the engine
//! only reads state that the previous driver call stabilized, so a
//! conforming driver may execute bodies in any order and concurrently.

use std::thread;

pub trait LoopDriver: Clone {
    /// Invokes `body(i)` once for every `i` in `from..until`.
    fn for_each<F>(&self, from: usize, until: usize, body: F)
    where
        F: Fn(usize) + Sync;

    /// Computes inclusive prefix sums of `read(i)` over `from..until` and
    /// stores the sum through `read(from..=i)` via `write(i, sum)`.
    fn prefix_sum<R, W>(&self, from: usize, until: usize, read: R, write: W)
    where
        R: Fn(usize) -> usize + Sync,
        W: Fn(usize, usize) + Sync;
}

/// Runs everything in order on the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct SeqDriver;

impl LoopDriver for SeqDriver {
    fn for_each<F>(&self, from: usize, until: usize, body: F)
    where
        F: Fn(usize) + Sync,
    {
        for i in from..until {
            body(i);
        }
    }

    fn prefix_sum<R, W>(&self, from: usize, until: usize, read: R, write: W)
    where
        R: Fn(usize) -> usize + Sync,
        W: Fn(usize, usize) + Sync,
    {
        let mut acc = 0;
        for i in from..until {
            acc += read(i);
            write(i, acc);
        }
    }
}

/// Fork-join driver over scoped threads.
///
/// Ranges are split into contiguous chunks, one per worker. Prefix sums
/// run in three phases: parallel per-chunk partials, a sequential combine
/// of chunk offsets, and a parallel write-back.
#[derive(Clone, Copy, Debug)]
pub struct ForkJoinDriver {
    threads: usize,
}

impl ForkJoinDriver {
    /// At least one worker; extra workers beyond the range length idle.
    pub fn new(threads: usize) -> Self {
        Self { threads: threads.max(1) }
    }

    fn chunks(&self, from: usize, until: usize) -> Vec<(usize, usize)> {
        let len = until - from;
        let workers = self.threads.min(len).max(1);
        let chunk = len.div_ceil(workers);
        let mut ranges = Vec::with_capacity(workers);
        let mut lo = from;
        while lo < until {
            let hi = (lo + chunk).min(until);
            ranges.push((lo, hi));
            lo = hi;
        }
        ranges
    }
}

impl Default for ForkJoinDriver {
    fn default() -> Self {
        let threads = thread::available_parallelism().map_or(1, |n| n.get());
        Self::new(threads)
    }
}

impl LoopDriver for ForkJoinDriver {
    fn for_each<F>(&self, from: usize, until: usize, body: F)
    where
        F: Fn(usize) + Sync,
    {
        if until <= from {
            return;
        }
        let ranges = self.chunks(from, until);
        if ranges.len() == 1 {
            for i in from..until {
                body(i);
            }
            return;
        }
        let body = &body;
        thread::scope(|scope| {
            for &(lo, hi) in &ranges[1..] {
                scope.spawn(move || {
                    for i in lo..hi {
                        body(i);
                    }
                });
            }
            let (lo, hi) = ranges[0];
            for i in lo..hi {
                body(i);
            }
        });
    }

    fn prefix_sum<R, W>(&self, from: usize, until: usize, read: R, write: W)
    where
        R: Fn(usize) -> usize + Sync,
        W: Fn(usize, usize) + Sync,
    {
        if until <= from {
            return;
        }
        let ranges = self.chunks(from, until);
        if ranges.len() == 1 {
            SeqDriver.prefix_sum(from, until, read, write);
            return;
        }

        let read = &read;
        let mut partials = vec![0_usize; ranges.len()];
        thread::scope(|scope| {
            for ((lo, hi), slot) in ranges.iter().copied().zip(partials.iter_mut()) {
                scope.spawn(move || {
                    let mut acc = 0;
                    for i in lo..hi {
                        acc += read(i);
                    }
                    *slot = acc;
                });
            }
        });

        let mut offsets = vec![0_usize; ranges.len()];
        let mut acc = 0;
        for (offset, partial) in offsets.iter_mut().zip(partials.iter()) {
            *offset = acc;
            acc += partial;
        }

        let write = &write;
        thread::scope(|scope| {
            for ((lo, hi), base) in ranges.iter().copied().zip(offsets.iter().copied()) {
                scope.spawn(move || {
                    let mut acc = base;
                    for i in lo..hi {
                        acc += read(i);
                        write(i, acc);
                    }
                });
            }
        });
    }
}
