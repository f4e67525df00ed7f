//! Thread Dispatchers
//!
//! The sleeper expresses its parallel phases as "run this worker function
//! once per worker, each with a stable index, and give me every worker's
//! result in index order". A dispatcher is anything that can do that.
//!
//! Two implementations:
//!
//! - [`SequentialDispatcher`]: any worker count, runs the workers one after
//!   another on the calling thread. Worker-indexed semantics without
//!   threads, and fully deterministic — the configuration the determinism
//!   guarantees are stated for.
//! - [`RayonDispatcher`] (`parallel` feature): fans the worker function out
//!   across a rayon thread pool.

#[cfg(feature = "parallel")]
use crate::error::PhysicsError;

/// Fan-out of a worker function to a fixed number of workers.
///
/// `dispatch_workers` is blocking: it returns once every worker has
/// finished, with the results ordered by worker index.
pub trait ThreadDispatcher {
    /// Number of workers `dispatch_workers` will invoke.
    fn thread_count(&self) -> usize;

    /// Run `worker` once per worker index in `[0, thread_count)` and
    /// collect the results in index order.
    fn dispatch_workers<R, F>(&self, worker: F) -> Vec<R>
    where
        R: Send,
        F: Fn(usize) -> R + Sync;
}

/// Runs every worker on the calling thread, in index order.
#[derive(Clone, Copy, Debug)]
pub struct SequentialDispatcher {
    worker_count: usize,
}

impl SequentialDispatcher {
    /// Create a dispatcher simulating `worker_count` workers.
    ///
    /// # Panics
    ///
    /// Panics if `worker_count` is zero.
    #[must_use]
    pub fn new(worker_count: usize) -> Self {
        assert!(worker_count > 0, "worker count must be positive");
        Self { worker_count }
    }
}

impl Default for SequentialDispatcher {
    fn default() -> Self {
        Self::new(1)
    }
}

impl ThreadDispatcher for SequentialDispatcher {
    fn thread_count(&self) -> usize {
        self.worker_count
    }

    fn dispatch_workers<R, F>(&self, worker: F) -> Vec<R>
    where
        R: Send,
        F: Fn(usize) -> R + Sync,
    {
        (0..self.worker_count).map(worker).collect()
    }
}

/// Fans workers out across a dedicated rayon thread pool.
#[cfg(feature = "parallel")]
pub struct RayonDispatcher {
    pool: rayon::ThreadPool,
}

#[cfg(feature = "parallel")]
impl RayonDispatcher {
    /// Create a dispatcher backed by a pool of `thread_count` threads.
    pub fn new(thread_count: usize) -> Result<Self, PhysicsError> {
        if thread_count == 0 {
            return Err(PhysicsError::InvalidConfiguration {
                reason: "thread count must be > 0",
            });
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(thread_count)
            .build()
            .map_err(|_| PhysicsError::InvalidConfiguration {
                reason: "failed to build rayon thread pool",
            })?;
        Ok(Self { pool })
    }
}

#[cfg(feature = "parallel")]
impl ThreadDispatcher for RayonDispatcher {
    fn thread_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn dispatch_workers<R, F>(&self, worker: F) -> Vec<R>
    where
        R: Send,
        F: Fn(usize) -> R + Sync,
    {
        self.pool.broadcast(|context| worker(context.index()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_sequential_runs_in_index_order() {
        let dispatcher = SequentialDispatcher::new(4);
        let counter = AtomicUsize::new(0);
        let results = dispatcher.dispatch_workers(|index| {
            let order = counter.fetch_add(1, Ordering::Relaxed);
            (index, order)
        });
        assert_eq!(results.len(), 4);
        for (index, (worker, order)) in results.iter().enumerate() {
            assert_eq!(*worker, index);
            assert_eq!(*order, index);
        }
    }

    #[test]
    #[should_panic(expected = "worker count must be positive")]
    fn test_sequential_rejects_zero_workers() {
        let _ = SequentialDispatcher::new(0);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_rayon_dispatch_covers_all_workers() {
        let dispatcher = RayonDispatcher::new(3).expect("pool should build");
        assert_eq!(dispatcher.thread_count(), 3);
        let results = dispatcher.dispatch_workers(|index| index * 10);
        assert_eq!(results, vec![0, 10, 20]);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_rayon_rejects_zero_threads() {
        assert!(RayonDispatcher::new(0).is_err());
    }
}
