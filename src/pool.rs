//! Bounded worker pool shared by every parallel phase.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::error::{Error, Result};

/// A fixed-size rayon thread pool.
///
/// Tasks are keyed; results come back paired with their key in submission
/// order regardless of completion order.
#[derive(Debug)]
pub struct TaskPool {
    pool: rayon::ThreadPool,
}

impl TaskPool {
    /// Pool with `workers` threads; `0` uses the available parallelism.
    pub fn new(workers: usize) -> Result<Self> {
        let workers = if workers == 0 {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        } else {
            workers
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("rd-eval-worker-{i}"))
            .build()
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
        Ok(Self { pool })
    }

    /// Number of worker threads.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `task` for every key and return `(key, result)` pairs in key order.
    ///
    /// Failures do not cancel the remaining tasks.
    pub fn run<K, T, F>(&self, phase: &str, keys: Vec<K>, task: F) -> Vec<(K, Result<T>)>
    where
        K: Send,
        T: Send,
        F: Fn(&K) -> Result<T> + Sync,
    {
        let total = keys.len();
        let done = AtomicUsize::new(0);
        log::info!("{phase}: {total} tasks on {} workers", self.workers());

        let results: Vec<(K, Result<T>)> = self.pool.install(|| {
            keys.into_par_iter()
                .map(|key| {
                    let result = task(&key);
                    let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                    log::debug!("{phase}: {n}/{total}");
                    (key, result)
                })
                .collect()
        });

        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        if failed > 0 {
            log::warn!("{phase}: {failed}/{total} tasks failed");
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_results_keep_key_order() {
        let pool = TaskPool::new(4).unwrap();
        assert_eq!(pool.workers(), 4);

        let keys: Vec<u64> = (0..16).collect();
        let results = pool.run("square", keys, |&k| {
            // Later keys finish first.
            std::thread::sleep(Duration::from_millis(16 - k));
            Ok(k * k)
        });

        for (i, (key, result)) in results.into_iter().enumerate() {
            assert_eq!(key, i as u64);
            assert_eq!(result.unwrap(), key * key);
        }
    }

    #[test]
    fn test_failures_do_not_cancel_others() {
        let pool = TaskPool::new(2).unwrap();
        let results = pool.run("odd-fails", vec![1, 2, 3, 4], |&k| {
            if k % 2 == 1 {
                Err(Error::Search(format!("task {k}")))
            } else {
                Ok(k)
            }
        });
        let ok: Vec<i32> = results.into_iter().filter_map(|(_, r)| r.ok()).collect();
        assert_eq!(ok, vec![2, 4]);
    }

    #[test]
    fn test_zero_workers_uses_available() {
        let pool = TaskPool::new(0).unwrap();
        assert!(pool.workers() >= 1);
    }
}
