// src/core/pool.rs

use rayon::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Could not start a worker pool of {size} threads: {source}")]
    Build {
        size: usize,
        #[source]
        source: rayon::ThreadPoolBuildError,
    },
}

/// A bounded pool for commands that fan out independent work.
///
/// Calls block until every item is done; results come back in input order.
#[derive(Debug)]
pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    /// # Errors
    /// Returns [`PoolError::Build`] if the threads cannot be spawned.
    pub fn new(size: usize) -> Result<Self, PoolError> {
        let size = size.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(|i| format!("dag-worker-{}", i))
            .build()
            .map_err(|source| PoolError::Build { size, source })?;
        Ok(Self { pool })
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Applies `f` to every item on the pool. Output order matches input order.
    pub fn map<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync,
    {
        log::debug!("Fanning out {} items over {} workers.", items.len(), self.size());
        self.pool.install(|| items.into_par_iter().map(f).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_map_preserves_input_order() {
        let pool = WorkerPool::new(4).unwrap();
        let items: Vec<u64> = (0..32).collect();
        // Earlier items sleep longer, so they finish last.
        let out = pool.map(items.clone(), |i| {
            std::thread::sleep(Duration::from_millis(32 - i));
            i * 2
        });
        assert_eq!(out, items.iter().map(|i| i * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_size_is_at_least_one() {
        assert_eq!(WorkerPool::new(0).unwrap().size(), 1);
        assert_eq!(WorkerPool::new(3).unwrap().size(), 3);
    }
}
