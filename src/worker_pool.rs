//! Bounded adaptive worker pool (§4.5, §9).
//!
//! The Python source spun up a fresh `ThreadPoolExecutor` per batch with
//! sleep-based heat management scattered through the loop body. This
//! port keeps the adaptive logic in one place: a size setter, a
//! submit-and-collect batch interface built on `rayon`, and a
//! post-batch hook that implements the backpressure policy.

use std::time::Duration;

use rayon::ThreadPoolBuilder;

use crate::host_load::HostLoad;

const MAX_COOLDOWN_SECS: f64 = 5.0;
const COOLDOWN_SCALE: f64 = 0.1;

/// Outcome of a post-batch backpressure check, for operator visibility
/// (§4.5: "record the number of reductions and recoveries").
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BackpressureStats {
    pub reductions: u32,
    pub recoveries: u32,
}

/// A bounded pool of workers with adaptive sizing driven by host load.
pub struct WorkerPool {
    current_size: usize,
    max_size: usize,
    cpu_high_water: f64,
    cpu_low_water: f64,
    stats: BackpressureStats,
}

impl WorkerPool {
    pub fn new(initial_size: usize, max_size: usize, cpu_high_water: f64, cpu_low_water: f64) -> Self {
        let initial_size = initial_size.clamp(1, max_size.max(1));
        WorkerPool {
            current_size: initial_size,
            max_size: max_size.max(1),
            cpu_high_water,
            cpu_low_water,
            stats: BackpressureStats::default(),
        }
    }

    pub fn size(&self) -> usize {
        self.current_size
    }

    pub fn stats(&self) -> BackpressureStats {
        self.stats
    }

    /// Run `f` over every item in `items`, using up to [`Self::size`]
    /// concurrent workers, and return results in input order. A single
    /// scoped thread pool is built per batch since the pool size can
    /// change between batches (§4.5 "processes chunks in batches of size
    /// B·W").
    pub fn submit_batch<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync,
    {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.current_size)
            .build()
            .expect("building a bounded rayon thread pool");

        pool.install(|| {
            use rayon::prelude::*;
            items.into_par_iter().map(f).collect()
        })
    }

    /// Apply the §4.5 adaptive backpressure policy after a batch
    /// completes: shrink by one (floor 1) and return a cooldown delay if
    /// the host is over the high-water mark; grow by one (cap
    /// `max_size`) if both CPU and memory are comfortably under the
    /// low-water mark; otherwise hold steady.
    pub fn post_batch_adjust(&mut self, load: &dyn HostLoad) -> Option<Duration> {
        let sample = load.sample();

        if sample.cpu_percent > self.cpu_high_water {
            if self.current_size > 1 {
                self.current_size -= 1;
                self.stats.reductions += 1;
            }
            let overshoot = sample.cpu_percent - self.cpu_high_water;
            let cooldown = (overshoot * COOLDOWN_SCALE).min(MAX_COOLDOWN_SECS).max(0.0);
            return Some(Duration::from_secs_f64(cooldown));
        }

        if sample.cpu_percent < self.cpu_low_water && sample.memory_percent < self.cpu_low_water && self.current_size < self.max_size {
            self.current_size += 1;
            self.stats.recoveries += 1;
        }

        None
    }

    /// The sequential-mode equivalent cool-down: a small delay
    /// proportional to CPU overshoot, clamped to the same maximum (§4.5
    /// "in sequential mode, apply the same cool-down policy between
    /// chunks").
    pub fn sequential_cooldown(&self, load: &dyn HostLoad) -> Option<Duration> {
        let sample = load.sample();
        if sample.cpu_percent <= self.cpu_high_water {
            return None;
        }
        let overshoot = sample.cpu_percent - self.cpu_high_water;
        Some(Duration::from_secs_f64((overshoot * COOLDOWN_SCALE).min(MAX_COOLDOWN_SECS)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host_load::{FixedHostLoad, LoadSample};

    #[test]
    fn submit_batch_preserves_order() {
        let pool = WorkerPool::new(2, 4, 75.0, 70.0);
        let items: Vec<u32> = (0..20).collect();
        let results = pool.submit_batch(items.clone(), |i| i * 2);
        let expected: Vec<u32> = items.iter().map(|i| i * 2).collect();
        assert_eq!(results, expected);
    }

    #[test]
    fn high_cpu_shrinks_pool_and_returns_cooldown() {
        let mut pool = WorkerPool::new(4, 8, 75.0, 70.0);
        let load = FixedHostLoad(LoadSample { cpu_percent: 90.0, memory_percent: 50.0 });
        let cooldown = pool.post_batch_adjust(&load);
        assert_eq!(pool.size(), 3);
        assert!(cooldown.is_some());
        assert_eq!(pool.stats().reductions, 1);
    }

    #[test]
    fn pool_never_shrinks_below_one() {
        let mut pool = WorkerPool::new(1, 8, 75.0, 70.0);
        let load = FixedHostLoad(LoadSample { cpu_percent: 99.0, memory_percent: 50.0 });
        pool.post_batch_adjust(&load);
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn low_load_grows_pool_up_to_cap() {
        let mut pool = WorkerPool::new(1, 2, 75.0, 70.0);
        let load = FixedHostLoad(LoadSample { cpu_percent: 10.0, memory_percent: 10.0 });
        pool.post_batch_adjust(&load);
        assert_eq!(pool.size(), 2);
        pool.post_batch_adjust(&load);
        assert_eq!(pool.size(), 2);
        assert_eq!(pool.stats().recoveries, 1);
    }

    #[test]
    fn moderate_load_holds_steady() {
        let mut pool = WorkerPool::new(3, 8, 75.0, 70.0);
        let load = FixedHostLoad(LoadSample { cpu_percent: 72.0, memory_percent: 72.0 });
        let cooldown = pool.post_batch_adjust(&load);
        assert_eq!(pool.size(), 3);
        assert!(cooldown.is_none());
    }
}
