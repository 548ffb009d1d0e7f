//! Explicit execution context for the overlay fan-out.
//!
//! Owns the worker pool and the progress sink for one run. The lifecycle
//! is create → submit work → join → drop; nothing is process-global, so
//! two runs (or two tests) never share a pool or a progress bar.

use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::WeightError;
use crate::progress::{ProgressSink, silent};

/// A fixed-size worker pool plus progress reporting.
pub struct ExecutionContext {
    pool: ThreadPool,
    workers: usize,
    progress: Arc<dyn ProgressSink>,
}

impl ExecutionContext {
    /// Builds a pool with exactly `workers` threads (at least one).
    ///
    /// # Errors
    ///
    /// Returns [`WeightError::Pool`] if the worker threads cannot be spawned.
    pub fn new(workers: usize, progress: Arc<dyn ProgressSink>) -> Result<Self, WeightError> {
        let workers = workers.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("overlay-{i}"))
            .build()?;

        log::debug!("Started overlay pool with {workers} worker(s)");

        Ok(Self {
            pool,
            workers,
            progress,
        })
    }

    /// A single-worker context that reports nothing.
    ///
    /// # Errors
    ///
    /// Returns [`WeightError::Pool`] if the worker thread cannot be spawned.
    pub fn sequential() -> Result<Self, WeightError> {
        Self::new(1, silent())
    }

    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    #[must_use]
    pub fn progress(&self) -> &Arc<dyn ProgressSink> {
        &self.progress
    }

    /// Runs `work` over every item on the pool and joins.
    ///
    /// Results come back in input order regardless of which worker ran
    /// which item, so output is identical across runs and pool sizes.
    /// Progress advances by one per finished item.
    pub fn map_units<T, R, F>(&self, items: &[T], work: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        let progress = &self.progress;
        progress.start(items.len() as u64);

        self.pool.install(|| {
            items
                .par_iter()
                .map(|item| {
                    let result = work(item);
                    progress.tick();
                    result
                })
                .collect()
        })
    }

    /// Finishes the progress indicator and tears the pool down.
    pub fn finish(self, summary: &str) {
        self.progress.finish(summary);
    }
}

/// Available processing units minus one, leaving headroom for the main
/// thread and the progress renderer. Never less than one.
#[must_use]
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map_or(1, |n| n.get().saturating_sub(1))
        .max(1)
}
