//! How per-individual work of a generation is executed.
//!
//! The search driver is written once against [`Dispatch`]; the sequential and
//! the perfectly parallel strategies differ only in the dispatcher they plug
//! in. Jobs receive a slot index and return a value; results come back in slot
//! order, so the driver's barrier merge is identical for both.

use super::linkage::MiMatrix;
use super::population::Population;
use crate::error::Result;

/// Executes independent per-slot jobs of one generation.
pub trait Dispatch: Send + Sync {
    /// Runs `job(0) .. job(n-1)` and returns their results in slot order.
    ///
    /// The first error aborts the call; jobs already running may finish.
    fn map_slots<T, J>(&self, n: usize, job: J) -> Result<Vec<T>>
    where
        T: Send,
        J: Fn(usize) -> Result<T> + Sync;

    /// Builds the mutual-information matrix for the linkage tree.
    fn mutual_information(&self, population: &Population, order: &[usize]) -> MiMatrix {
        MiMatrix::compute(population, order)
    }

    /// Number of workers (1 for sequential execution).
    fn workers(&self) -> usize;
}

/// Runs every job on the calling thread, in slot order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialDispatch;

impl Dispatch for SequentialDispatch {
    fn map_slots<T, J>(&self, n: usize, job: J) -> Result<Vec<T>>
    where
        T: Send,
        J: Fn(usize) -> Result<T> + Sync,
    {
        (0..n).map(job).collect()
    }

    fn workers(&self) -> usize {
        1
    }
}

/// Runs jobs on a dedicated rayon pool of fixed size.
///
/// `map_slots` returns only after every job has finished, which is the
/// generation barrier.
#[cfg(feature = "parallel")]
pub struct PoolDispatch {
    pool: rayon::ThreadPool,
}

#[cfg(feature = "parallel")]
impl PoolDispatch {
    /// Builds a pool with `threads` workers.
    pub fn new(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("ltga-worker-{i}"))
            .build()
            .map_err(|e| crate::error::LtgaError::ThreadPool(e.to_string()))?;
        Ok(Self { pool })
    }
}

#[cfg(feature = "parallel")]
impl std::fmt::Debug for PoolDispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolDispatch")
            .field("workers", &self.pool.current_num_threads())
            .finish()
    }
}

#[cfg(feature = "parallel")]
impl Dispatch for PoolDispatch {
    fn map_slots<T, J>(&self, n: usize, job: J) -> Result<Vec<T>>
    where
        T: Send,
        J: Fn(usize) -> Result<T> + Sync,
    {
        use rayon::prelude::*;
        self.pool
            .install(|| (0..n).into_par_iter().map(&job).collect())
    }

    fn mutual_information(&self, population: &Population, order: &[usize]) -> MiMatrix {
        self.pool
            .install(|| MiMatrix::compute_par(population, order))
    }

    fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LtgaError;

    #[test]
    fn test_sequential_preserves_order() {
        let out = SequentialDispatch.map_slots(5, |i| Ok(i * i)).unwrap();
        assert_eq!(out, vec![0, 1, 4, 9, 16]);
        assert_eq!(SequentialDispatch.workers(), 1);
    }

    #[test]
    fn test_sequential_stops_at_first_error() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let calls = AtomicUsize::new(0);
        let result: Result<Vec<usize>> = SequentialDispatch.map_slots(10, |i| {
            calls.fetch_add(1, Ordering::Relaxed);
            if i == 3 {
                Err(LtgaError::Evaluation("boom".into()))
            } else {
                Ok(i)
            }
        });
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::Relaxed), 4);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_pool_preserves_order() {
        let pool = PoolDispatch::new(3).unwrap();
        assert_eq!(pool.workers(), 3);
        let out = pool.map_slots(100, |i| Ok(i + 1)).unwrap();
        assert_eq!(out, (1..=100).collect::<Vec<_>>());
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_pool_propagates_error() {
        let pool = PoolDispatch::new(2).unwrap();
        let result: Result<Vec<usize>> = pool.map_slots(20, |i| {
            if i == 7 {
                Err(LtgaError::Evaluation("slot 7".into()))
            } else {
                Ok(i)
            }
        });
        assert_eq!(result, Err(LtgaError::Evaluation("slot 7".into())));
    }
}
